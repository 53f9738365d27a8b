//! Attendance, speaker suggestions and slides.

use serde::{Deserialize, Serialize};

/// A member's check-in for a class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: String,
    pub class_id: String,
    pub user_id: String,
    pub attendee_name: String,
    pub checked_in_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub attendee_name: String,
}

/// A guest speaker suggested for a class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerSuggestion {
    pub id: String,
    pub class_id: String,
    pub name: String,
    pub topic: String,
    pub votes: i64,
    pub created_at: String,
    /// Whether the requesting member already voted for this speaker
    #[serde(default)]
    pub user_has_voted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSuggestionRequest {
    pub name: String,
    pub topic: String,
}

/// A published slide deck link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    pub title: String,
    pub url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSlideRequest {
    pub title: String,
    pub url: String,
}
