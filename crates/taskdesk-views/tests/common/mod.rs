//! Scripted in-memory task store for view tests.
//!
//! Writes can be held at a gate so tests observe the optimistic state
//! before the store answers, and each write's answer can be scripted.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use taskdesk_core::task::{ChecklistItem, Status, StatusFilter, Task};
use taskdesk_core::StatusSummary;
use taskdesk_service::test_helpers::make_task;
use taskdesk_service::{ServiceError, TaskListing, TaskService};
use tokio::sync::Semaphore;

pub enum WriteScript {
    /// Store the payload and return the updated task.
    Echo,
    /// Store the payload but return this task instead.
    Return(Task),
    /// Store the payload, acknowledge without a task.
    Ack,
    Fail(ServiceError),
}

#[derive(Default)]
struct Scripted {
    task: Option<Task>,
    listing: TaskListing,
    fail_reads: Option<ServiceError>,
    list_delays: VecDeque<Duration>,
    write_scripts: VecDeque<WriteScript>,
    list_calls: Vec<StatusFilter>,
    get_calls: usize,
    write_calls: Vec<Vec<ChecklistItem>>,
}

pub struct ScriptedService {
    state: Mutex<Scripted>,
    gate: Option<Semaphore>,
}

impl ScriptedService {
    pub fn new(task: Task) -> Self {
        let listing = TaskListing {
            tasks: vec![task.clone()],
            status_summary: StatusSummary {
                all: 1,
                pending_tasks: 1,
                ..Default::default()
            },
        };
        Self {
            state: Mutex::new(Scripted {
                task: Some(task),
                listing,
                ..Default::default()
            }),
            gate: None,
        }
    }

    /// Writes block until [`ScriptedService::release`] hands out permits.
    pub fn gated(task: Task) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(task)
        }
    }

    fn lock(&self) -> MutexGuard<'_, Scripted> {
        self.state.lock().unwrap()
    }

    pub fn release(&self, writes: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(writes);
        }
    }

    pub fn script_write(&self, script: WriteScript) {
        self.lock().write_scripts.push_back(script);
    }

    pub fn fail_reads(&self, err: ServiceError) {
        self.lock().fail_reads = Some(err);
    }

    pub fn set_listing(&self, listing: TaskListing) {
        self.lock().listing = listing;
    }

    pub fn delay_next_list(&self, delay: Duration) {
        self.lock().list_delays.push_back(delay);
    }

    pub fn write_calls(&self) -> Vec<Vec<ChecklistItem>> {
        self.lock().write_calls.clone()
    }

    pub fn list_calls(&self) -> Vec<StatusFilter> {
        self.lock().list_calls.clone()
    }

    pub fn get_calls(&self) -> usize {
        self.lock().get_calls
    }

    pub fn stored_task(&self) -> Option<Task> {
        self.lock().task.clone()
    }
}

#[async_trait]
impl TaskService for ScriptedService {
    async fn list_tasks(&self, filter: StatusFilter) -> Result<TaskListing, ServiceError> {
        let delay = {
            let mut state = self.lock();
            state.list_calls.push(filter);
            state.list_delays.pop_front()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.lock();
        if let Some(err) = &state.fail_reads {
            return Err(err.clone());
        }
        let mut listing = state.listing.clone();
        if let StatusFilter::Only(status) = filter {
            listing.tasks.retain(|t| t.status == status);
        }
        Ok(listing)
    }

    async fn get_task(&self, id: &str) -> Result<Task, ServiceError> {
        let mut state = self.lock();
        state.get_calls += 1;
        if let Some(err) = &state.fail_reads {
            return Err(err.clone());
        }
        state
            .task
            .clone()
            .filter(|t| t.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("task {id}")))
    }

    async fn update_checklist(
        &self,
        _id: &str,
        checklist: &[ChecklistItem],
    ) -> Result<Option<Task>, ServiceError> {
        self.lock().write_calls.push(checklist.to_vec());
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        let mut state = self.lock();
        let script = state.write_scripts.pop_front().unwrap_or(WriteScript::Echo);
        let stored = match (&script, state.task.as_mut()) {
            (WriteScript::Fail(err), _) => return Err(err.clone()),
            (_, Some(stored)) => stored,
            (_, None) => return Err(ServiceError::NotFound("no task".into())),
        };
        stored.checklist = checklist.to_vec();
        stored.completed_todo_count =
            Some(checklist.iter().filter(|c| c.completed).count() as u32);
        match script {
            WriteScript::Echo => Ok(Some(stored.clone())),
            WriteScript::Return(task) => Ok(Some(task)),
            WriteScript::Ack => Ok(None),
            WriteScript::Fail(_) => unreachable!(),
        }
    }
}

/// `[{A, false}, {B, true}]`
pub fn task_ab() -> Task {
    make_task(
        "t1",
        Status::Pending,
        vec![ChecklistItem::new("A", false), ChecklistItem::new("B", true)],
    )
}

pub fn flags(items: &[ChecklistItem]) -> Vec<bool> {
    items.iter().map(|c| c.completed).collect()
}

/// Yield until `cond` holds, giving spawned tasks a chance to run.
pub async fn until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
