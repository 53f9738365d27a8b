//! Question, upvote and reply models.

use serde::{Deserialize, Serialize};

/// A question asked during a class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub class_id: String,
    pub body: String,
    pub is_answered: bool,
    pub created_at: String,
}

/// An admin reply threaded under a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub question_id: String,
    pub body: String,
    pub created_at: String,
}

/// Request body for submitting a question or posting a reply.
#[derive(Debug, Clone, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

/// Request body for toggling an upvote.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteToggleRequest {
    pub currently_voted: bool,
}
