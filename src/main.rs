use std::env;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kryten::api::{ApiClient, PlaylistFetcher, QueueBackend};
use kryten::config::Config;
use kryten::marathon::{Marathon, MarathonLibrary};
use kryten::queue::{
    ApplicationRequest, ItemResolver, ProgressStore, QueueController, QueueMode, QueueOptions,
    QueueSender, RateLimitedDispatcher, RunStatus, SendAction, SendOutcome, SendProgress,
};

enum Command {
    ApplyPlaylist { playlist_id: String, options: QueueOptions },
    ApplyMarathon { marathon: String, options: QueueOptions },
    Send { playlist_id: String, action: SendAction },
    SendVideo { video_id: String, action: SendAction },
    ShowQueue,
    CreateMarathon { name: String, playlist_ids: Vec<String> },
    ListMarathons,
    DeleteMarathon { marathon: String },
}

#[tokio::main]
async fn main() {
    // Use RUST_LOG env var if set, otherwise default to info level
    let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let args: Vec<String> = env::args().collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            error!("{}", e);
            print_usage(&args[0]);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(command).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {} apply-playlist <playlist_id> [--mode append|replace|insert] [--shuffle]", program);
    eprintln!("  {} apply-marathon <name|id> [--mode append|replace|insert] [--shuffle]", program);
    eprintln!("  {} send <playlist_id> [--action append|next|replace]", program);
    eprintln!("  {} send-video <video_id> [--action append|next]", program);
    eprintln!("  {} queue", program);
    eprintln!("  {} marathon-create <name> <playlist_id>...", program);
    eprintln!("  {} marathon-list", program);
    eprintln!("  {} marathon-delete <name|id>", program);
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let command = args.get(1).ok_or("missing command")?;
    let target = || {
        args.get(2)
            .filter(|a| !a.starts_with("--"))
            .cloned()
            .ok_or_else(|| format!("{} requires an argument", command))
    };

    if command == "marathon-create" {
        let name = target()?;
        let playlist_ids = args[3..].to_vec();
        if playlist_ids.is_empty() {
            return Err("marathon-create requires at least one playlist id".to_string());
        }
        return Ok(Command::CreateMarathon { name, playlist_ids });
    }

    let mut options = QueueOptions::default();
    let mut action = SendAction::Append;

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--shuffle" => {
                options.shuffle = true;
                i += 1;
            }
            "--mode" => {
                let value = args.get(i + 1).ok_or("--mode requires a value")?;
                options.mode = value.parse::<QueueMode>().map_err(|e| e.to_string())?;
                i += 2;
            }
            "--action" => {
                let value = args.get(i + 1).ok_or("--action requires a value")?;
                action = value.parse::<SendAction>().map_err(|e| e.to_string())?;
                i += 2;
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }

    match command.as_str() {
        "apply-playlist" => Ok(Command::ApplyPlaylist {
            playlist_id: target()?,
            options,
        }),
        "apply-marathon" => Ok(Command::ApplyMarathon {
            marathon: target()?,
            options,
        }),
        "send" => Ok(Command::Send {
            playlist_id: target()?,
            action,
        }),
        "send-video" => Ok(Command::SendVideo {
            video_id: target()?,
            action,
        }),
        "queue" => Ok(Command::ShowQueue),
        "marathon-list" => Ok(Command::ListMarathons),
        "marathon-delete" => Ok(Command::DeleteMarathon {
            marathon: target()?,
        }),
        other => Err(format!("Unknown command: {}", other)),
    }
}

async fn run(command: Command) -> Result<(), String> {
    let config = Config::load().map_err(|e| e.to_string())?;
    let client = Arc::new(ApiClient::new(&config.api).map_err(|e| e.to_string())?);

    match command {
        Command::ApplyPlaylist {
            playlist_id,
            options,
        } => {
            let playlist = client
                .get_playlist(&playlist_id)
                .await
                .map_err(|e| format!("Failed to load playlist: {}", e))?;
            info!("Applying playlist '{}'", playlist.name);
            apply(
                &config,
                client,
                ApplicationRequest::Playlist {
                    items: playlist.items,
                },
                options,
            )
            .await
        }
        Command::ApplyMarathon { marathon, options } => {
            let library =
                MarathonLibrary::load(&config.marathons_path).map_err(|e| e.to_string())?;
            let marathon = library
                .get(&marathon)
                .or_else(|| library.find_by_name(&marathon))
                .ok_or_else(|| format!("No saved marathon named '{}'", marathon))?;
            info!(
                "Applying marathon '{}' ({} playlists)",
                marathon.name,
                marathon.playlists.len()
            );
            apply(&config, client, marathon.to_request(), options).await
        }
        Command::Send {
            playlist_id,
            action,
        } => send_playlist(&config, client, &playlist_id, action).await,
        Command::SendVideo { video_id, action } => {
            let backend: Arc<dyn QueueBackend> = client;
            QueueSender::new(backend, config.send_pacing)
                .send_video(&video_id, action)
                .await
                .map_err(|e| format!("Failed to send to queue: {}", e))?;
            println!("Successfully added to queue");
            Ok(())
        }
        Command::ShowQueue => {
            let queue = client.get_queue().await.map_err(|e| e.to_string())?;
            if let Some(current) = &queue.current {
                println!(
                    "Now playing: {}",
                    current.title.as_deref().unwrap_or("(unknown)")
                );
            }
            for (i, entry) in queue.items.iter().enumerate() {
                println!(
                    "{:>3}. {} [{}s] ({})",
                    i + 1,
                    entry.media.title,
                    entry.media.seconds,
                    entry.uid
                );
            }
            println!("Total: {}s", queue.total_seconds);
            Ok(())
        }
        Command::CreateMarathon { name, playlist_ids } => {
            let mut marathon = Marathon::new(name);
            for playlist_id in &playlist_ids {
                let playlist = client
                    .get_playlist(playlist_id)
                    .await
                    .map_err(|e| format!("Failed to load playlist {}: {}", playlist_id, e))?;
                if !marathon.add_playlist(playlist.summary()) {
                    warn!("Skipping duplicate playlist '{}'", playlist.name);
                }
            }

            let mut library =
                MarathonLibrary::load(&config.marathons_path).map_err(|e| e.to_string())?;
            library.save(&marathon);
            library
                .persist(&config.marathons_path)
                .map_err(|e| e.to_string())?;
            println!(
                "Saved marathon '{}' ({} playlists, {} items, {}s)",
                marathon.name,
                marathon.playlists.len(),
                marathon.total_items,
                marathon.total_duration_seconds
            );
            Ok(())
        }
        Command::ListMarathons => {
            let library =
                MarathonLibrary::load(&config.marathons_path).map_err(|e| e.to_string())?;
            for marathon in library.marathons() {
                println!(
                    "{} {} ({} playlists, {} items)",
                    marathon.id,
                    marathon.name,
                    marathon.playlists.len(),
                    marathon.total_items
                );
            }
            Ok(())
        }
        Command::DeleteMarathon { marathon } => {
            let mut library =
                MarathonLibrary::load(&config.marathons_path).map_err(|e| e.to_string())?;
            let id = library
                .get(&marathon)
                .or_else(|| library.find_by_name(&marathon))
                .map(|m| m.id.clone())
                .ok_or_else(|| format!("No saved marathon named '{}'", marathon))?;
            library.delete(&id);
            library
                .persist(&config.marathons_path)
                .map_err(|e| e.to_string())?;
            println!("Deleted marathon {}", id);
            Ok(())
        }
    }
}

async fn apply(
    config: &Config,
    client: Arc<ApiClient>,
    request: ApplicationRequest,
    options: QueueOptions,
) -> Result<(), String> {
    let fetcher: Arc<dyn PlaylistFetcher> = client.clone();
    let backend: Arc<dyn QueueBackend> = client;

    let progress = ProgressStore::new();
    let controller = QueueController::new(
        ItemResolver::new(fetcher),
        RateLimitedDispatcher::new(backend, config.pacing),
        progress.clone(),
    );

    // Ctrl-C cancels the run before its next item
    let cancel_store = progress.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_store.cancel_queue();
        }
    });

    let mut updates = progress.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            if update.status == RunStatus::Running {
                println!(
                    "[{:>3}%] {}/{} items ({} failed)",
                    update.percent(),
                    update.completed,
                    update.total,
                    update.failed.len()
                );
            }
        }
    });

    let result = controller.apply(request, options).await;
    // The printer ends once every store handle (and its subscriptions) is gone
    ctrl_c.abort();
    let _ = ctrl_c.await;
    drop(controller);
    drop(progress);
    let _ = printer.await;

    let summary = result.map_err(|e| e.to_string())?;
    for skipped in &summary.skipped {
        if skipped.missing {
            warn!("Skipped deleted playlist: {}", skipped.name);
        } else {
            warn!("Could not load playlist {}: {}", skipped.name, skipped.error);
        }
    }

    let progress = summary.progress;
    match progress.status {
        RunStatus::Completed => println!("Added {} items to the queue.", progress.completed),
        RunStatus::Error => {
            println!(
                "{} of {} items could not be added:",
                progress.failed.len(),
                progress.total
            );
            for id in &progress.failed {
                println!("  - {}", id);
            }
        }
        RunStatus::Paused => println!(
            "Queue update cancelled after {} of {} items.",
            progress.completed, progress.total
        ),
        RunStatus::Idle | RunStatus::Running => {}
    }
    Ok(())
}

async fn send_playlist(
    config: &Config,
    client: Arc<ApiClient>,
    playlist_id: &str,
    action: SendAction,
) -> Result<(), String> {
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<SendProgress>();
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            println!(
                "{}/{} Adding: {} (est. {}s remaining)",
                update.processed,
                update.total,
                update.current_title,
                update.eta.as_secs()
            );
        }
    });

    let backend: Arc<dyn QueueBackend> = client.clone();
    let sender = QueueSender::new(backend, config.send_pacing).with_progress(tx);
    let result = sender
        .send_playlist(&*client, playlist_id, action, &cancel)
        .await;
    drop(sender);
    let _ = printer.await;

    let report = result.map_err(|e| format!("Failed to process queue: {}", e))?;
    match report.outcome() {
        SendOutcome::Success => println!("Successfully added {} items to queue", report.total),
        SendOutcome::PartialFailure { failed } => {
            println!("Processed with {} errors", failed);
            for failure in &report.failures {
                println!("  - {}: {}", failure.title, failure.error);
            }
        }
        SendOutcome::Cancelled => println!("Queue addition cancelled"),
    }
    Ok(())
}
