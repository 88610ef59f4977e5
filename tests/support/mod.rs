use kryten::api::MediaItem;

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Items with the given video ids and generated titles
#[allow(dead_code)]
pub fn media_items(ids: &[&str]) -> Vec<MediaItem> {
    ids.iter()
        .map(|id| MediaItem::new(*id, format!("Title {}", id), 120))
        .collect()
}
