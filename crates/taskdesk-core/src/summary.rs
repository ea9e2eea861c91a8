use serde::{Deserialize, Serialize};

use crate::task::{Status, StatusFilter};

/// Per-status counters computed by the store. They describe the store's
/// view of the user's tasks and are never derived from a fetched page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    #[serde(default)]
    pub all: u64,
    #[serde(default)]
    pub pending_tasks: u64,
    #[serde(default)]
    pub in_progress_tasks: u64,
    #[serde(default)]
    pub completed_tasks: u64,
}

impl StatusSummary {
    pub fn count_for(&self, filter: StatusFilter) -> u64 {
        match filter {
            StatusFilter::All => self.all,
            StatusFilter::Only(Status::Pending) => self.pending_tasks,
            StatusFilter::Only(Status::InProgress) => self.in_progress_tasks,
            StatusFilter::Only(Status::Completed) => self.completed_tasks,
        }
    }

    /// Tabs in display order: All, Pending, In Progress, Completed.
    pub fn tabs(&self) -> Vec<StatusTab> {
        StatusFilter::TABS
            .iter()
            .map(|f| StatusTab {
                filter: *f,
                count: self.count_for(*f),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTab {
    pub filter: StatusFilter,
    pub count: u64,
}

impl StatusTab {
    pub fn label(&self) -> &'static str {
        self.filter.label()
    }
}
