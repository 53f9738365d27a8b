//! Scheduled class model.

use serde::{Deserialize, Serialize};

/// A scheduled teaching event with an openable Q&A.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClassSession {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub description: String,
    pub location: String,
    /// RFC 3339 UTC start time
    pub class_date: String,
    pub duration_minutes: i64,
    pub qa_open: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for scheduling a class.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassRequest {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub class_date: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
    #[serde(default)]
    pub qa_open: bool,
}

fn default_duration() -> i64 {
    60
}

/// Request body for editing a class. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClassRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub class_date: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
}

/// Request body for any toggle action: the state the viewer currently sees.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub current_state: bool,
}
