use std::sync::{Arc, Mutex, MutexGuard};

use taskdesk_core::attachment::normalize_link;
use taskdesk_core::task::{toggled, ChecklistItem, Task};
use taskdesk_service::{ServiceError, TaskService};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, warn};

use crate::open::LinkOpener;
use crate::{ViewError, ViewScope};

/// What the renderer sees of a detail view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailSnapshot {
    pub task: Option<Task>,
    pub loading: bool,
    /// Checklist toggles submitted but not yet settled.
    pub pending_writes: usize,
    /// Last failure worth a transient notice.
    pub notice: Option<String>,
}

impl DetailSnapshot {
    pub fn checklist(&self) -> &[ChecklistItem] {
        self.task.as_ref().map(|t| t.checklist.as_slice()).unwrap_or(&[])
    }
}

/// How a checklist toggle settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The store accepted the write; the view now shows the store's task.
    Applied,
    /// The write failed and the optimistic flip was undone.
    RolledBack(ServiceError),
    /// The view was closed before the write settled.
    Discarded,
}

impl ToggleOutcome {
    pub fn into_result(self) -> Result<(), ViewError> {
        match self {
            ToggleOutcome::Applied => Ok(()),
            ToggleOutcome::RolledBack(e) => Err(ViewError::Write(e)),
            ToggleOutcome::Discarded => Err(ViewError::Cancelled),
        }
    }
}

/// Resolves when the toggle's write settles. Dropping it does not cancel
/// the write.
#[derive(Debug)]
pub struct ToggleHandle {
    rx: oneshot::Receiver<ToggleOutcome>,
}

impl ToggleHandle {
    pub async fn settled(self) -> ToggleOutcome {
        self.rx.await.unwrap_or(ToggleOutcome::Discarded)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingToggle {
    seq: u64,
    index: usize,
    intended: bool,
}

#[derive(Debug, Default)]
struct DetailState {
    task: Option<Task>,
    loading: bool,
    pending: Vec<PendingToggle>,
    next_seq: u64,
    notice: Option<String>,
    /// Last checklist the store is known to hold. Rollbacks restore from it.
    confirmed: Vec<ChecklistItem>,
}

impl DetailState {
    fn snapshot(&self) -> DetailSnapshot {
        DetailSnapshot {
            task: self.task.clone(),
            loading: self.loading,
            pending_writes: self.pending.len(),
            notice: self.notice.clone(),
        }
    }

    /// Adopt a task fetched from the store, keeping the flips of toggles
    /// with `seq >= from_seq` that are still unsettled on top of it.
    fn adopt(&mut self, mut fresh: Task, from_seq: u64) {
        self.confirmed = fresh.checklist.clone();
        for p in self.pending.iter().filter(|p| p.seq >= from_seq) {
            if let Some(item) = fresh.checklist.get_mut(p.index) {
                item.completed = p.intended;
            }
        }
        self.task = Some(fresh);
    }
}

struct Shared {
    state: Mutex<DetailState>,
    snapshots: watch::Sender<DetailSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, DetailState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn publish(&self, state: &DetailState) {
        self.snapshots.send_replace(state.snapshot());
    }
}

struct WriteJob {
    seq: u64,
    index: usize,
    intended: bool,
    done: oneshot::Sender<ToggleOutcome>,
}

/// A single task with an editable checklist.
///
/// Toggles are applied locally first and written to the store in the
/// background, one write at a time in submission order. Each write sends
/// the whole checklist as it stands when the write starts.
pub struct TaskDetailView {
    task_id: String,
    service: Arc<dyn TaskService>,
    shared: Arc<Shared>,
    scope: ViewScope,
    writes: mpsc::UnboundedSender<WriteJob>,
}

impl TaskDetailView {
    /// Must be called from within a tokio runtime: the checklist writer is
    /// spawned here.
    pub fn new(service: Arc<dyn TaskService>, task_id: &str) -> Self {
        let (snapshots, _) = watch::channel(DetailSnapshot::default());
        let shared = Arc::new(Shared {
            state: Mutex::new(DetailState::default()),
            snapshots,
        });
        let scope = ViewScope::new();
        let (writes, rx) = mpsc::unbounded_channel();

        tokio::spawn(run_writer(
            service.clone(),
            task_id.to_string(),
            shared.clone(),
            scope.clone(),
            rx,
        ));

        Self {
            task_id: task_id.to_string(),
            service,
            shared,
            scope,
            writes,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn snapshot(&self) -> DetailSnapshot {
        self.shared.lock().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Fetch the task. On failure the previous state (possibly empty) stays.
    pub async fn load(&self) -> Result<(), ViewError> {
        {
            let mut state = self.shared.lock();
            state.loading = true;
            self.shared.publish(&state);
        }

        let result = self.scope.run(self.service.get_task(&self.task_id)).await;

        let Some(result) = result else {
            debug!("task {} load discarded, view closed", self.task_id);
            return Err(ViewError::Cancelled);
        };
        let mut state = self.shared.lock();
        state.loading = false;
        let outcome = match result {
            Ok(task) => {
                state.adopt(task, 0);
                Ok(())
            }
            Err(e) => {
                error!("error occurred while fetching task {}: {e}", self.task_id);
                state.notice = Some(format!("Could not load task: {e}"));
                Err(ViewError::Fetch(e))
            }
        };
        self.shared.publish(&state);
        outcome
    }

    /// Flip `completed` at `index` right away and queue the write.
    ///
    /// Returns `None` without touching state or the network when no task is
    /// loaded, `index` is past the end of the checklist, or the view is
    /// closed.
    pub fn toggle_checklist_item(&self, index: usize) -> Option<ToggleHandle> {
        if self.scope.is_cancelled() {
            debug!("toggle {index} ignored, view closed");
            return None;
        }
        let mut state = self.shared.lock();
        let Some(task) = state.task.as_mut() else {
            debug!("toggle {index} ignored, no task loaded");
            return None;
        };
        let Some(next) = toggled(&task.checklist, index) else {
            debug!(
                "toggle {index} ignored, checklist has {} items",
                task.checklist.len()
            );
            return None;
        };
        let intended = next[index].completed;
        task.checklist = next;

        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push(PendingToggle {
            seq,
            index,
            intended,
        });

        let (done, rx) = oneshot::channel();
        let job = WriteJob {
            seq,
            index,
            intended,
            done,
        };
        if let Err(mpsc::error::SendError(job)) = self.writes.send(job) {
            // writer is gone; nothing will persist this flip
            state.pending.retain(|p| p.seq != job.seq);
            if let Some(item) = state.task.as_mut().and_then(|t| t.checklist.get_mut(index)) {
                item.completed = !intended;
            }
            return None;
        }
        self.shared.publish(&state);
        Some(ToggleHandle { rx })
    }

    /// Normalize an attachment link and hand it to `opener`. Returns the
    /// URL that was opened.
    pub fn open_attachment(&self, link: &str, opener: &dyn LinkOpener) -> Result<String, ViewError> {
        let url = normalize_link(link);
        opener
            .open(&url)
            .map_err(|e| ViewError::Open(format!("{url}: {e}")))?;
        Ok(url)
    }

    /// Cancel in-flight work. Later resolutions are discarded.
    pub fn close(&self) {
        self.scope.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.scope.is_cancelled()
    }
}

impl Drop for TaskDetailView {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

async fn run_writer(
    service: Arc<dyn TaskService>,
    task_id: String,
    shared: Arc<Shared>,
    scope: ViewScope,
    mut rx: mpsc::UnboundedReceiver<WriteJob>,
) {
    while let Some(Some(job)) = scope.run(rx.recv()).await {
        let (payload, sent_below) = {
            let state = shared.lock();
            let payload = state
                .task
                .as_ref()
                .map(|t| t.checklist.clone())
                .unwrap_or_default();
            (payload, state.next_seq)
        };

        let Some(result) = scope
            .run(service.update_checklist(&task_id, &payload))
            .await
        else {
            let _ = job.done.send(ToggleOutcome::Discarded);
            break;
        };

        let outcome = match result {
            Ok(echo) => settle_applied(&shared, &task_id, &job, echo, &payload, sent_below),
            Err(e) => settle_failed(&shared, &task_id, &job, e),
        };
        let _ = job.done.send(outcome);
    }
    debug!("checklist writer for task {task_id} stopped");
}

fn settle_applied(
    shared: &Shared,
    task_id: &str,
    job: &WriteJob,
    echo: Option<Task>,
    payload: &[ChecklistItem],
    sent_below: u64,
) -> ToggleOutcome {
    let mut state = shared.lock();
    state.pending.retain(|p| p.seq != job.seq);
    if let Some(fresh) = echo {
        let sent = payload.get(job.index).map(|c| c.completed);
        let stored = fresh.checklist.get(job.index).map(|c| c.completed);
        if sent != stored {
            warn!(
                "store returned item {} of task {task_id} as {stored:?}, sent {sent:?}",
                job.index
            );
        }
        state.adopt(fresh, sent_below);
    } else {
        state.confirmed = payload.to_vec();
    }
    shared.publish(&state);
    ToggleOutcome::Applied
}

fn settle_failed(shared: &Shared, task_id: &str, job: &WriteJob, e: ServiceError) -> ToggleOutcome {
    error!("error occurred while updating checklist of task {task_id}: {e}");
    let mut state = shared.lock();
    state.pending.retain(|p| p.seq != job.seq);
    // a later toggle of the same item owns its value now
    let superseded = state
        .pending
        .iter()
        .any(|p| p.index == job.index && p.seq > job.seq);
    if !superseded {
        // an earlier accepted write may already have carried this flip
        let stored = state
            .confirmed
            .get(job.index)
            .map(|c| c.completed)
            .unwrap_or(!job.intended);
        if let Some(item) = state
            .task
            .as_mut()
            .and_then(|t| t.checklist.get_mut(job.index))
        {
            item.completed = stored;
        }
    }
    state.notice = Some(format!("Could not update checklist: {e}"));
    shared.publish(&state);
    ToggleOutcome::RolledBack(e)
}
