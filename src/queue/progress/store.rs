use crate::queue::types::{QueueError, RunProgress, RunStatus};
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tokio::sync::mpsc as tokio_mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type SubscriptionId = u64;

struct Subscription {
    tx: tokio_mpsc::UnboundedSender<RunProgress>,
}

struct StoreState {
    progress: RunProgress,
    run_id: u64,
    token: Option<CancellationToken>,
    /// Held by an apply call from its first step until it returns
    claimed: bool,
}

/// Write access to one run, handed out by [`ProgressStore::start_queue`].
///
/// A ticket stops being able to write once its run is reset or replaced.
#[derive(Debug, Clone)]
pub struct RunTicket {
    run_id: u64,
    token: CancellationToken,
}

impl RunTicket {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Exclusive right to start the next run, from [`ProgressStore::claim_run`].
///
/// Taking a claim leaves the visible record untouched. Dropping it releases
/// the store, so an apply that aborts before starting keeps the previous record.
pub struct RunClaim {
    store: ProgressStore,
}

impl RunClaim {
    /// Begin the claimed run of `total` items
    pub fn start(&self, total: usize) -> RunTicket {
        let mut state = self.store.state.lock().unwrap();
        self.store.begin_locked(&mut state, total)
    }
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        if let Ok(mut state) = self.store.state.lock() {
            state.claimed = false;
            debug!("Run claim released");
        }
    }
}

/// Observable record of the current queue run.
///
/// The apply controller is the only writer; any number of readers can take
/// snapshots or subscribe. Every mutation is pushed to subscribers while the
/// state lock is held, so each subscriber sees updates in mutation order.
#[derive(Clone)]
pub struct ProgressStore {
    state: Arc<Mutex<StoreState>>,
    subscriptions: Arc<Mutex<HashMap<SubscriptionId, Subscription>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                progress: RunProgress::default(),
                run_id: 0,
                token: None,
                claimed: false,
            })),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn snapshot(&self) -> RunProgress {
        self.state.lock().unwrap().progress.clone()
    }

    /// Subscribe to progress updates.
    /// The receiver first yields the current record, then one record per mutation.
    /// Subscription is automatically removed when receiver is dropped.
    pub fn subscribe(&self) -> tokio_mpsc::UnboundedReceiver<RunProgress> {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let state = self.state.lock().unwrap();
        let _ = tx.send(state.progress.clone());
        self.subscriptions
            .lock()
            .unwrap()
            .insert(id, Subscription { tx });
        rx
    }

    /// Begin a new run of `total` items.
    ///
    /// Refused while another run is Running or claimed. A paused or finished record is overwritten.
    pub fn start_queue(&self, total: usize) -> Result<RunTicket, QueueError> {
        let mut state = self.state.lock().unwrap();
        if state.claimed || state.progress.status == RunStatus::Running {
            return Err(QueueError::AlreadyRunning);
        }

        Ok(self.begin_locked(&mut state, total))
    }

    /// Reserve the store for one apply call.
    ///
    /// Refused while another claim is held or a run is Running.
    pub fn claim_run(&self) -> Result<RunClaim, QueueError> {
        let mut state = self.state.lock().unwrap();
        if state.claimed || state.progress.status == RunStatus::Running {
            return Err(QueueError::AlreadyRunning);
        }

        state.claimed = true;
        Ok(RunClaim {
            store: self.clone(),
        })
    }

    fn begin_locked(&self, state: &mut StoreState, total: usize) -> RunTicket {
        state.run_id += 1;
        let token = CancellationToken::new();
        state.token = Some(token.clone());
        state.progress = RunProgress {
            total,
            completed: 0,
            failed: Vec::new(),
            status: RunStatus::Running,
        };

        info!("Queue run {} started with {} items", state.run_id, total);
        self.broadcast(&state.progress);

        RunTicket {
            run_id: state.run_id,
            token,
        }
    }

    /// Record the attempts made so far.
    ///
    /// `completed` never moves backwards and is capped at `total`; `newly_failed`
    /// is appended. Ignored for stale tickets and finished runs.
    pub fn update_progress(&self, ticket: &RunTicket, completed: usize, newly_failed: &[String]) {
        let mut state = self.state.lock().unwrap();
        if !accepts_writes(&state, ticket) {
            return;
        }

        let progress = &mut state.progress;
        progress.completed = completed.max(progress.completed).min(progress.total);
        progress.failed.extend(newly_failed.iter().cloned());

        debug!(
            "Queue progress {}/{} ({} failed)",
            progress.completed,
            progress.total,
            progress.failed.len()
        );
        self.broadcast(&state.progress);
    }

    /// Finish the run: Error if anything failed, Completed otherwise.
    /// Only a Running record changes; a cancelled run stays Paused.
    pub fn complete_queue(&self, ticket: &RunTicket) {
        let mut state = self.state.lock().unwrap();
        if state.run_id != ticket.run_id || state.progress.status != RunStatus::Running {
            return;
        }

        state.progress.status = if state.progress.failed.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::Error
        };
        state.token = None;

        info!(
            "Queue run {} finished: {:?} ({}/{}, {} failed)",
            state.run_id,
            state.progress.status,
            state.progress.completed,
            state.progress.total,
            state.progress.failed.len()
        );
        self.broadcast(&state.progress);
    }

    /// Signal the active run to stop before its next item and mark it Paused.
    /// Recorded progress is kept.
    pub fn cancel_queue(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(token) = state.token.take() {
            token.cancel();
        }
        if state.progress.status != RunStatus::Running {
            return;
        }

        state.progress.status = RunStatus::Paused;
        info!(
            "Queue run {} cancelled at {}/{}",
            state.run_id, state.progress.completed, state.progress.total
        );
        self.broadcast(&state.progress);
    }

    /// Return to the Idle default, discarding the previous run
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(token) = state.token.take() {
            token.cancel();
        }
        // Bump the run id so tickets from the discarded run can no longer write
        state.run_id += 1;
        state.progress = RunProgress::default();
        self.broadcast(&state.progress);
    }

    fn broadcast(&self, progress: &RunProgress) {
        let mut subs = self.subscriptions.lock().unwrap();
        subs.retain(|_, subscription| subscription.tx.send(progress.clone()).is_ok());
    }
}

fn accepts_writes(state: &StoreState, ticket: &RunTicket) -> bool {
    if state.run_id != ticket.run_id {
        warn!("Ignoring progress update from stale run {}", ticket.run_id);
        return false;
    }
    !state.progress.status.is_terminal() && state.progress.status != RunStatus::Idle
}
