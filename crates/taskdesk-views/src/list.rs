use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use taskdesk_core::task::{Priority, Status, StatusFilter, Task};
use taskdesk_core::StatusTab;
use taskdesk_service::TaskService;
use tokio::sync::watch;
use tracing::{debug, error};

use crate::{ViewError, ViewScope};

/// The fields a task card shows.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCard {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: Status,
    pub progress: f64,
    pub created_at: Option<DateTime<Utc>>,
    pub due_date: String,
    pub assignee_images: Vec<String>,
    pub attachment_count: usize,
    pub completed_todo_count: u32,
    pub checklist_len: usize,
}

impl From<&Task> for TaskCard {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            status: task.status,
            progress: task.progress,
            created_at: task.created_at,
            due_date: task.due_date_label(),
            assignee_images: task
                .assignee_images()
                .into_iter()
                .map(String::from)
                .collect(),
            attachment_count: task.attachments.len(),
            completed_todo_count: task.completed_todo_count(),
            checklist_len: task.checklist.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListSnapshot {
    pub filter: StatusFilter,
    pub tasks: Vec<Task>,
    /// Empty until the first successful load.
    pub tabs: Vec<StatusTab>,
    pub loading: bool,
    pub notice: Option<String>,
}

impl ListSnapshot {
    pub fn cards(&self) -> Vec<TaskCard> {
        self.tasks.iter().map(TaskCard::from).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load started before this one resolved; its result was dropped.
    Stale,
    /// The filter was already active.
    Unchanged,
}

#[derive(Debug, Default)]
struct ListState {
    filter: StatusFilter,
    tasks: Vec<Task>,
    tabs: Vec<StatusTab>,
    loading: bool,
    generation: u64,
    notice: Option<String>,
}

impl ListState {
    fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            filter: self.filter,
            tasks: self.tasks.clone(),
            tabs: self.tabs.clone(),
            loading: self.loading,
            notice: self.notice.clone(),
        }
    }
}

/// Tasks filtered by status, with per-status tab counts.
///
/// The counts come from the store's summary and are shown as given, even
/// when they disagree with the fetched page.
pub struct TaskListView {
    service: Arc<dyn TaskService>,
    state: Mutex<ListState>,
    snapshots: watch::Sender<ListSnapshot>,
    scope: ViewScope,
}

impl TaskListView {
    pub fn new(service: Arc<dyn TaskService>) -> Self {
        let (snapshots, _) = watch::channel(ListSnapshot::default());
        Self {
            service,
            state: Mutex::new(ListState::default()),
            snapshots,
            scope: ViewScope::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn publish(&self, state: &ListState) {
        self.snapshots.send_replace(state.snapshot());
    }

    pub fn snapshot(&self) -> ListSnapshot {
        self.lock().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn filter(&self) -> StatusFilter {
        self.lock().filter
    }

    /// Switch the active filter and reload. Re-selecting the current
    /// filter does nothing.
    pub async fn set_filter(&self, filter: StatusFilter) -> Result<LoadOutcome, ViewError> {
        if self.lock().filter == filter {
            return Ok(LoadOutcome::Unchanged);
        }
        self.load(filter).await
    }

    /// Fetch tasks for `filter`. Only the most recently started load may
    /// change state; on failure the previous tasks and tabs stay.
    pub async fn load(&self, filter: StatusFilter) -> Result<LoadOutcome, ViewError> {
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            state.filter = filter;
            state.loading = true;
            self.publish(&state);
            state.generation
        };

        let result = self.scope.run(self.service.list_tasks(filter)).await;

        let Some(result) = result else {
            debug!("task list load ({filter}) discarded, view closed");
            return Err(ViewError::Cancelled);
        };
        let mut state = self.lock();
        if state.generation != generation {
            debug!("discarding stale task list for filter {filter}");
            return Ok(LoadOutcome::Stale);
        }
        state.loading = false;
        let outcome = match result {
            Ok(listing) => {
                state.tasks = listing.tasks;
                state.tabs = listing.status_summary.tabs();
                state.notice = None;
                Ok(LoadOutcome::Applied)
            }
            Err(e) => {
                error!("error occurred while fetching tasks ({filter}): {e}");
                state.notice = Some(format!("Could not load tasks: {e}"));
                Err(ViewError::Fetch(e))
            }
        };
        self.publish(&state);
        outcome
    }

    pub fn close(&self) {
        self.scope.cancel();
    }
}

impl Drop for TaskListView {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}
