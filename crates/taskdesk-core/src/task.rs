use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::TaskdeskError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl Status {
    pub const ALL: &[Status] = &[Status::Pending, Status::InProgress, Status::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Status::Pending),
            "In Progress" => Some(Status::InProgress),
            "Completed" => Some(Status::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Priority::High => "!!",
            Priority::Medium => "!",
            Priority::Low => "-",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "Low" => Some(Priority::Low),
            "Medium" => Some(Priority::Medium),
            "High" => Some(Priority::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The status facet of the task list. `All` carries no constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(Status),
}

impl StatusFilter {
    /// Tab order as shown by the list view.
    pub const TABS: &[StatusFilter] = &[
        StatusFilter::All,
        StatusFilter::Only(Status::Pending),
        StatusFilter::Only(Status::InProgress),
        StatusFilter::Only(Status::Completed),
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StatusFilter::All => "All",
            StatusFilter::Only(status) => status.as_str(),
        }
    }

    /// Value of the `status` query parameter. The store reads an empty
    /// string as "every status".
    pub fn query_value(&self) -> &'static str {
        match self {
            StatusFilter::All => "",
            StatusFilter::Only(status) => status.as_str(),
        }
    }

    pub fn parse_str(s: &str) -> Result<Self, TaskdeskError> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        Status::ALL
            .iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(trimmed))
            .map(|st| StatusFilter::Only(*st))
            .ok_or_else(|| TaskdeskError::Unknown(format!("status filter `{s}`")))
    }

    pub fn next(&self) -> StatusFilter {
        let pos = self.position();
        Self::TABS[(pos + 1) % Self::TABS.len()]
    }

    pub fn prev(&self) -> StatusFilter {
        let pos = self.position();
        Self::TABS[(pos + Self::TABS.len() - 1) % Self::TABS.len()]
    }

    fn position(&self) -> usize {
        Self::TABS.iter().position(|f| f == self).unwrap_or(0)
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
}

impl ChecklistItem {
    pub fn new(text: &str, completed: bool) -> Self {
        Self {
            text: text.to_string(),
            completed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignee {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub profile_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Priority,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Status,
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub assigned_to: Vec<Assignee>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<String>,
    #[serde(rename = "todoCheckList", default, deserialize_with = "null_as_default")]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_todo_count: Option<u32>,
}

impl Task {
    /// Count reported by the store, falling back to zero like the task card.
    pub fn completed_todo_count(&self) -> u32 {
        self.completed_todo_count.unwrap_or(0)
    }

    pub fn assignee_images(&self) -> Vec<&str> {
        self.assigned_to
            .iter()
            .map(|a| a.profile_image_url.as_str())
            .collect()
    }

    pub fn due_date_label(&self) -> String {
        format_due_date(self.due_date)
    }
}

/// Reads `null` as the type's default; the store leaves some fields null.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Status, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Status::parse_str).unwrap_or_default())
}

fn lenient_priority<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Priority, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Priority::parse_str).unwrap_or_default())
}

/// Copy of `checklist` with `completed` flipped at `index`.
/// `None` when `index` is out of bounds.
pub fn toggled(checklist: &[ChecklistItem], index: usize) -> Option<Vec<ChecklistItem>> {
    if index >= checklist.len() {
        return None;
    }
    let mut next = checklist.to_vec();
    next[index].completed = !next[index].completed;
    Some(next)
}

/// "5th Mar 2025" style date, or "N/A".
pub fn format_due_date(due: Option<DateTime<Utc>>) -> String {
    match due {
        Some(d) => format!("{}{} {}", d.day(), ordinal_suffix(d.day()), d.format("%b %Y")),
        None => "N/A".to_string(),
    }
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}
