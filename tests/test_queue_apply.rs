#![cfg(feature = "test-utils")]

mod support;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::support::{media_items, tracing_init};
use kryten::api::QueuePosition;
use kryten::queue::{
    ApplicationRequest, ItemResolver, PacingConfig, PlaylistReference, ProgressStore,
    QueueController, QueueError, QueueMode, QueueOptions, RateLimitedDispatcher, RunProgress,
    RunStatus,
};
use kryten::test_support::{MockPlaylistFetcher, MockQueueBackend};

fn controller(
    progress: &ProgressStore,
    backend: &Arc<MockQueueBackend>,
    fetcher: MockPlaylistFetcher,
) -> QueueController {
    tracing_init();

    QueueController::new(
        ItemResolver::new(Arc::new(fetcher)),
        RateLimitedDispatcher::new(backend.clone(), PacingConfig::immediate()),
        progress.clone(),
    )
}

fn playlist(ids: &[&str]) -> ApplicationRequest {
    ApplicationRequest::Playlist {
        items: media_items(ids),
    }
}

fn options(mode: QueueMode, shuffle: bool) -> QueueOptions {
    QueueOptions { mode, shuffle }
}

#[tokio::test]
async fn test_all_items_added() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new());
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());

    let summary = controller
        .apply(playlist(&["v1", "v2"]), options(QueueMode::Append, false))
        .await
        .unwrap();

    let expected = RunProgress {
        total: 2,
        completed: 2,
        failed: vec![],
        status: RunStatus::Completed,
    };
    assert_eq!(progress.snapshot(), expected);
    assert_eq!(summary.progress, expected);
    assert!(!summary.cancelled);
}

#[tokio::test]
async fn test_failed_item_recorded_and_run_continues() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new().fail_on("v2"));
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());

    controller
        .apply(playlist(&["v1", "v2"]), options(QueueMode::Append, false))
        .await
        .unwrap();

    assert_eq!(
        progress.snapshot(),
        RunProgress {
            total: 2,
            completed: 2,
            failed: vec!["v2".to_string()],
            status: RunStatus::Error,
        }
    );
}

#[tokio::test]
async fn test_cancel_after_first_item() {
    let progress = ProgressStore::new();
    let cancel_store = progress.clone();
    let backend = Arc::new(MockQueueBackend::new().on_add(move |attempt| {
        if attempt == 1 {
            cancel_store.cancel_queue();
        }
    }));
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());

    let summary = controller
        .apply(
            playlist(&["v1", "v2", "v3", "v4", "v5"]),
            options(QueueMode::Append, false),
        )
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(backend.attempted_ids(), vec!["v1".to_string()]);
    assert_eq!(
        progress.snapshot(),
        RunProgress {
            total: 5,
            completed: 1,
            failed: vec![],
            status: RunStatus::Paused,
        }
    );
}

#[tokio::test]
async fn test_marathon_with_unloadable_playlist() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new());
    let fetcher = MockPlaylistFetcher::new().with_playlist("first", &["a1", "a2", "a3"]);
    let controller = controller(&progress, &backend, fetcher);

    let summary = controller
        .apply(
            ApplicationRequest::Marathon {
                playlist_refs: vec![
                    PlaylistReference::new("first", "First"),
                    PlaylistReference::new("broken", "Broken"),
                ],
            },
            options(QueueMode::Append, false),
        )
        .await
        .unwrap();

    assert_eq!(summary.progress.total, 3);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].name, "Broken");
    assert_eq!(
        backend.added_ids(),
        vec!["a1".to_string(), "a2".to_string(), "a3".to_string()]
    );
    assert_eq!(progress.snapshot().status, RunStatus::Completed);
}

#[tokio::test]
async fn test_marathon_items_flattened_in_order() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new());
    let fetcher = MockPlaylistFetcher::new()
        .with_playlist("p1", &["a1", "a2"])
        .with_playlist("p2", &["b1"])
        .with_playlist("p3", &["c1", "c2"]);
    let controller = controller(&progress, &backend, fetcher);

    controller
        .apply(
            ApplicationRequest::Marathon {
                playlist_refs: vec![
                    PlaylistReference::new("p1", "One"),
                    PlaylistReference::new("p2", "Two"),
                    PlaylistReference::new("p3", "Three"),
                ],
            },
            options(QueueMode::Append, false),
        )
        .await
        .unwrap();

    assert_eq!(
        backend.attempted_ids(),
        vec!["a1", "a2", "b1", "c1", "c2"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_dispatch_order_matches_resolved_order() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new());
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());
    let ids = ["f", "c", "a", "e", "b", "d"];

    controller
        .apply(playlist(&ids), options(QueueMode::Append, false))
        .await
        .unwrap();

    let expected: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
    assert_eq!(backend.attempted_ids(), expected);
    assert!(backend
        .added()
        .iter()
        .all(|(_, position)| *position == QueuePosition::End));
}

#[tokio::test]
async fn test_shuffle_dispatches_a_permutation() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new());
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());

    let ids: Vec<String> = (0..20).map(|i| format!("v{}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    controller
        .apply(playlist(&id_refs), options(QueueMode::Append, true))
        .await
        .unwrap();

    let mut dispatched = backend.attempted_ids();
    assert_eq!(dispatched.len(), ids.len());
    assert_eq!(progress.snapshot().total, ids.len());

    let mut expected = ids.clone();
    dispatched.sort();
    expected.sort();
    assert_eq!(dispatched, expected);
}

#[tokio::test]
async fn test_progress_is_monotonic() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new().fail_on("v2").fail_on("v4"));
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());
    let mut updates = progress.subscribe();

    controller
        .apply(
            playlist(&["v1", "v2", "v3", "v4", "v5"]),
            options(QueueMode::Append, false),
        )
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(update) = updates.try_recv() {
        seen.push(update);
    }

    let completed: Vec<usize> = seen.iter().map(|p| p.completed).collect();
    assert!(completed.windows(2).all(|w| w[0] <= w[1]));
    assert!(seen.iter().all(|p| p.completed <= p.total));
    // Idle, started, five attempts, finished
    assert_eq!(seen.len(), 8);

    let last = seen.last().unwrap();
    assert_eq!(last.completed, 5);
    assert_eq!(last.failed, vec!["v2".to_string(), "v4".to_string()]);
    assert_eq!(last.status, RunStatus::Error);
}

#[tokio::test]
async fn test_completed_counts_attempts_and_failures_by_id() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new().fail_on("v1").fail_on("v3"));
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());

    controller
        .apply(playlist(&["v1", "v2", "v3"]), options(QueueMode::Append, false))
        .await
        .unwrap();

    let snapshot = progress.snapshot();
    assert_eq!(snapshot.completed, backend.add_attempts());
    assert_eq!(snapshot.failed.len(), 2);
    assert_eq!(snapshot.status, RunStatus::Error);
}

#[tokio::test]
async fn test_replace_clear_failure_aborts_before_any_add() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new().fail_clear());
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());

    let result = controller
        .apply(playlist(&["v1", "v2"]), options(QueueMode::Replace, false))
        .await;

    assert!(matches!(result, Err(QueueError::ClearFailed(_))));
    assert_eq!(backend.clear_calls(), 1);
    assert_eq!(backend.add_attempts(), 0);
    assert_eq!(progress.snapshot(), RunProgress::default());
}

#[tokio::test]
async fn test_replace_clear_failure_keeps_previous_result() {
    let progress = ProgressStore::new();

    let ok_backend = Arc::new(MockQueueBackend::new());
    controller(&progress, &ok_backend, MockPlaylistFetcher::new())
        .apply(playlist(&["v1"]), options(QueueMode::Append, false))
        .await
        .unwrap();
    let before = progress.snapshot();

    let failing_backend = Arc::new(MockQueueBackend::new().fail_clear());
    let result = controller(&progress, &failing_backend, MockPlaylistFetcher::new())
        .apply(playlist(&["v2", "v3"]), options(QueueMode::Replace, false))
        .await;

    assert!(result.is_err());
    assert_eq!(progress.snapshot(), before);
}

#[tokio::test]
async fn test_replace_clears_once_then_appends() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new());
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());

    controller
        .apply(playlist(&["v1", "v2"]), options(QueueMode::Replace, false))
        .await
        .unwrap();

    assert_eq!(backend.clear_calls(), 1);
    assert_eq!(backend.upcoming(), vec!["v1".to_string(), "v2".to_string()]);
}

#[tokio::test]
async fn test_insert_mode_requests_play_next() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new());
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());

    controller
        .apply(playlist(&["v1", "v2"]), options(QueueMode::Insert, false))
        .await
        .unwrap();

    let positions: HashMap<String, QueuePosition> = backend.added().into_iter().collect();
    assert_eq!(positions.get("v1"), Some(&QueuePosition::Next));
    assert_eq!(positions.get("v2"), Some(&QueuePosition::Next));
    assert_eq!(backend.clear_calls(), 0);
}

#[tokio::test]
async fn test_nothing_to_enqueue_leaves_queue_untouched() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new());
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());

    let result = controller
        .apply(
            ApplicationRequest::Marathon {
                playlist_refs: vec![PlaylistReference::new("gone", "Gone")],
            },
            options(QueueMode::Replace, false),
        )
        .await;

    assert!(matches!(result, Err(QueueError::NothingToEnqueue)));
    assert_eq!(backend.clear_calls(), 0);
    assert_eq!(progress.snapshot(), RunProgress::default());
}

#[tokio::test]
async fn test_apply_refused_while_run_active() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new());
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());

    let _active = progress.start_queue(10).unwrap();
    let result = controller
        .apply(playlist(&["v1"]), options(QueueMode::Replace, false))
        .await;

    assert!(matches!(result, Err(QueueError::AlreadyRunning)));
    assert_eq!(backend.clear_calls(), 0);
    assert_eq!(backend.add_attempts(), 0);
}

#[tokio::test]
async fn test_new_run_after_finished_run() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new().fail_on("v1"));
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());

    controller
        .apply(playlist(&["v1"]), options(QueueMode::Append, false))
        .await
        .unwrap();
    assert_eq!(progress.snapshot().status, RunStatus::Error);

    controller
        .apply(playlist(&["v2", "v3"]), options(QueueMode::Append, false))
        .await
        .unwrap();

    assert_eq!(
        progress.snapshot(),
        RunProgress {
            total: 2,
            completed: 2,
            failed: vec![],
            status: RunStatus::Completed,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_apply_refused_while_first_resolves() {
    tracing_init();
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new());
    let fetcher = Arc::new(
        MockPlaylistFetcher::new()
            .with_playlist("p1", &["a1", "a2"])
            .with_delay(Duration::from_millis(300)),
    );
    let controller = QueueController::new(
        ItemResolver::new(fetcher.clone()),
        RateLimitedDispatcher::new(backend.clone(), PacingConfig::immediate()),
        progress.clone(),
    );

    let replace = controller.apply(
        ApplicationRequest::Marathon {
            playlist_refs: vec![PlaylistReference::new("p1", "One")],
        },
        options(QueueMode::Replace, false),
    );
    let append = async {
        // Start once the replace run is waiting on its playlist
        while fetcher.requested().is_empty() {
            tokio::task::yield_now().await;
        }
        controller
            .apply(
                playlist(&["b1", "b2", "b3", "b4", "b5", "b6"]),
                options(QueueMode::Append, false),
            )
            .await
    };
    let (first, second) = tokio::join!(replace, append);

    assert!(matches!(second, Err(QueueError::AlreadyRunning)));
    let first = first.unwrap();
    assert_eq!(first.progress.status, RunStatus::Completed);
    assert_eq!(backend.clear_calls(), 1);
    assert_eq!(backend.attempted_ids(), vec!["a1".to_string(), "a2".to_string()]);
    assert_eq!(backend.upcoming(), vec!["a1".to_string(), "a2".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_apply_refused_until_cancelled_run_returns() {
    let progress = ProgressStore::new();
    let backend = Arc::new(MockQueueBackend::new().with_add_delay(Duration::from_millis(100)));
    let controller = controller(&progress, &backend, MockPlaylistFetcher::new());

    let first = controller.apply(
        playlist(&["v1", "v2", "v3"]),
        options(QueueMode::Append, false),
    );
    let second = async {
        // Cancel while the first add is still in flight
        while backend.add_attempts() == 0 {
            tokio::task::yield_now().await;
        }
        progress.cancel_queue();
        assert_eq!(progress.snapshot().status, RunStatus::Paused);
        controller
            .apply(playlist(&["w1"]), options(QueueMode::Append, false))
            .await
    };
    let (first, second) = tokio::join!(first, second);

    assert!(matches!(second, Err(QueueError::AlreadyRunning)));
    let first = first.unwrap();
    assert!(first.cancelled);
    assert_eq!(first.progress.completed, 1);
    assert_eq!(first.progress.status, RunStatus::Paused);
    assert_eq!(backend.attempted_ids(), vec!["v1".to_string()]);

    // Released once the cancelled call returned
    let summary = controller
        .apply(playlist(&["w1"]), options(QueueMode::Append, false))
        .await
        .unwrap();
    assert_eq!(summary.progress.status, RunStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_apply_paces_items_with_burst_cooldown() {
    tracing_init();
    let delay = Duration::from_millis(3000);
    let sent_at = Arc::new(Mutex::new(Vec::new()));
    let recorder = sent_at.clone();
    let backend = Arc::new(MockQueueBackend::new().on_add(move |_| {
        recorder.lock().unwrap().push(tokio::time::Instant::now());
    }));
    let progress = ProgressStore::new();
    let controller = QueueController::new(
        ItemResolver::new(Arc::new(MockPlaylistFetcher::new())),
        RateLimitedDispatcher::new(
            backend.clone(),
            PacingConfig {
                item_delay: delay,
                burst_every: 5,
                burst_multiplier: 2,
            },
        ),
        progress.clone(),
    );

    let started = tokio::time::Instant::now();
    controller
        .apply(
            playlist(&["v1", "v2", "v3", "v4", "v5", "v6"]),
            options(QueueMode::Append, false),
        )
        .await
        .unwrap();
    let elapsed = started.elapsed();

    let sent_at = sent_at.lock().unwrap().clone();
    let gaps: Vec<Duration> = sent_at.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(gaps.len(), 5);
    for (i, gap) in gaps.iter().enumerate() {
        let expected = if i == 4 { delay * 2 } else { delay };
        assert!(
            *gap >= expected && *gap < expected + Duration::from_millis(50),
            "gap after item {} was {:?}",
            i + 1,
            gap
        );
    }

    // Five regular waits plus one burst cooldown, the last wait included
    let total = delay * 7;
    assert!(elapsed >= total && elapsed < total + Duration::from_millis(100));
}

