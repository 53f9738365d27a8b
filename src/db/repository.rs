//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity. Every write
//! bumps the revision counter; every question write is published on the
//! change bus.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    Attendance, ClassSession, CreateClassRequest, CreateSlideRequest, CreateSuggestionRequest,
    Question, Reply, RevisionInfo, Slide, SpeakerSuggestion, UpdateClassRequest, VoterIdentity,
};
use crate::qa::QaStore;
use crate::realtime::{ChangeBus, ChangeKind, QuestionChange};

const CLASS_COLUMNS: &str = "id, title, subtitle, description, location, class_date, duration_minutes, qa_open, created_at, updated_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    changes: ChangeBus,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            changes: ChangeBus::new(),
        }
    }

    /// The bus on which question changes are published.
    pub fn changes(&self) -> &ChangeBus {
        &self.changes
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Increment the revision ID and return the new value.
    pub async fn increment_revision(&self) -> Result<i64, AppError> {
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(timestamp_now())
            .execute(&self.pool)
            .await?;
        self.get_revision_id().await
    }

    fn publish(&self, class_id: String, question_id: &str, kind: ChangeKind) {
        self.changes.publish(QuestionChange {
            class_id,
            question_id: question_id.to_string(),
            kind,
        });
    }

    // ==================== CLASS OPERATIONS ====================

    /// List classes by start time, optionally only those starting on `day` (UTC).
    pub async fn list_classes(&self, day: Option<NaiveDate>) -> Result<Vec<ClassSession>, AppError> {
        let rows = match day {
            Some(day) => {
                let (start, end) = day_bounds(day)?;
                let sql = format!(
                    "SELECT {} FROM classes WHERE class_date >= ? AND class_date < ? ORDER BY class_date",
                    CLASS_COLUMNS
                );
                let rows = sqlx::query(&sql)
                    .bind(start)
                    .bind(end)
                    .fetch_all(&self.pool)
                    .await?;
                rows
            }
            None => {
                let sql = format!("SELECT {} FROM classes ORDER BY class_date", CLASS_COLUMNS);
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
                rows
            }
        };

        Ok(rows.iter().map(class_from_row).collect())
    }

    /// Get a class by ID.
    pub async fn get_class(&self, id: &str) -> Result<Option<ClassSession>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM classes WHERE id = ?", CLASS_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(class_from_row))
    }

    /// Get a class by ID, failing with `NotFound` when it does not exist.
    pub async fn require_class(&self, id: &str) -> Result<ClassSession, AppError> {
        self.get_class(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Class {} not found", id)))
    }

    /// Schedule a new class.
    pub async fn create_class(&self, request: &CreateClassRequest) -> Result<ClassSession, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp_now();
        let class_date = normalize_timestamp(&request.class_date)?;

        sqlx::query(
            "INSERT INTO classes (id, title, subtitle, description, location, class_date, duration_minutes, qa_open, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(request.title.trim())
        .bind(&request.subtitle)
        .bind(&request.description)
        .bind(&request.location)
        .bind(&class_date)
        .bind(request.duration_minutes)
        .bind(request.qa_open as i32)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(ClassSession {
            id,
            title: request.title.trim().to_string(),
            subtitle: request.subtitle.clone(),
            description: request.description.clone(),
            location: request.location.clone(),
            class_date,
            duration_minutes: request.duration_minutes,
            qa_open: request.qa_open,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Edit a class. Fields absent from the request keep their value.
    pub async fn update_class(
        &self,
        id: &str,
        request: &UpdateClassRequest,
    ) -> Result<ClassSession, AppError> {
        let existing = self.require_class(id).await?;

        let class_date = match &request.class_date {
            Some(date) => normalize_timestamp(date)?,
            None => existing.class_date.clone(),
        };
        let updated = ClassSession {
            title: request
                .title
                .as_ref()
                .map(|t| t.trim().to_string())
                .unwrap_or(existing.title),
            subtitle: request.subtitle.clone().or(existing.subtitle),
            description: request.description.clone().unwrap_or(existing.description),
            location: request.location.clone().unwrap_or(existing.location),
            class_date,
            duration_minutes: request.duration_minutes.unwrap_or(existing.duration_minutes),
            updated_at: timestamp_now(),
            ..existing
        };

        sqlx::query(
            "UPDATE classes SET title = ?, subtitle = ?, description = ?, location = ?, class_date = ?, duration_minutes = ?, updated_at = ? WHERE id = ?"
        )
        .bind(&updated.title)
        .bind(&updated.subtitle)
        .bind(&updated.description)
        .bind(&updated.location)
        .bind(&updated.class_date)
        .bind(updated.duration_minutes)
        .bind(&updated.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;
        Ok(updated)
    }

    /// Delete a class together with its questions, check-ins and suggestions.
    ///
    /// Each cascaded question is published as a delete once the transaction
    /// commits.
    pub async fn delete_class(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let question_ids: Vec<String> = sqlx::query("SELECT id FROM questions WHERE class_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(|row| row.get("id"))
            .collect();

        let result = sqlx::query("DELETE FROM classes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Class {} not found", id)));
        }

        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(timestamp_now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        for question_id in &question_ids {
            self.publish(id.to_string(), question_id, ChangeKind::Delete);
        }
        Ok(())
    }

    /// Open or close the Q&A of a class.
    pub async fn set_qa_open(&self, id: &str, open: bool) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE classes SET qa_open = ?, updated_at = ? WHERE id = ?")
            .bind(open as i32)
            .bind(timestamp_now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Class {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }

    // ==================== QUESTION OPERATIONS ====================

    /// List the questions of a class, newest first.
    pub async fn list_questions(&self, class_id: &str) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query(
            "SELECT id, class_id, body, is_answered, created_at FROM questions WHERE class_id = ? ORDER BY created_at DESC, rowid DESC"
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(question_from_row).collect())
    }

    /// Get a question by ID.
    pub async fn get_question(&self, id: &str) -> Result<Option<Question>, AppError> {
        let row = sqlx::query(
            "SELECT id, class_id, body, is_answered, created_at FROM questions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(question_from_row))
    }

    /// Store a new question.
    pub async fn insert_question(&self, class_id: &str, body: &str) -> Result<Question, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp_now();

        sqlx::query(
            "INSERT INTO questions (id, class_id, body, is_answered, created_at) VALUES (?, ?, ?, 0, ?)",
        )
        .bind(&id)
        .bind(class_id)
        .bind(body)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;
        self.publish(class_id.to_string(), &id, ChangeKind::Insert);

        Ok(Question {
            id,
            class_id: class_id.to_string(),
            body: body.to_string(),
            is_answered: false,
            created_at: now,
        })
    }

    /// Set the answered flag of a question.
    pub async fn set_answered(&self, id: &str, answered: bool) -> Result<(), AppError> {
        let row = sqlx::query("UPDATE questions SET is_answered = ? WHERE id = ? RETURNING class_id")
            .bind(answered as i32)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", id)))?;

        self.increment_revision().await?;
        self.publish(row.get("class_id"), id, ChangeKind::Update);
        Ok(())
    }

    /// Delete a question along with its upvotes and replies.
    pub async fn delete_question(&self, id: &str) -> Result<(), AppError> {
        let row = sqlx::query("DELETE FROM questions WHERE id = ? RETURNING class_id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", id)))?;

        self.increment_revision().await?;
        self.publish(row.get("class_id"), id, ChangeKind::Delete);
        Ok(())
    }

    // ==================== UPVOTE OPERATIONS ====================

    /// Count the upvotes of a question.
    pub async fn count_upvotes(&self, question_id: &str) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM question_upvotes WHERE question_id = ?")
            .bind(question_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("total"))
    }

    /// Whether `voter` has upvoted the question.
    pub async fn has_upvoted(
        &self,
        question_id: &str,
        voter: &VoterIdentity,
    ) -> Result<bool, AppError> {
        let row = sqlx::query(
            "SELECT id FROM question_upvotes WHERE question_id = ? AND voter_kind = ? AND voter_id = ?",
        )
        .bind(question_id)
        .bind(voter.kind())
        .bind(voter.id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Record an upvote. A repeated vote fails with `Conflict`.
    pub async fn insert_upvote(
        &self,
        question_id: &str,
        voter: &VoterIdentity,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO question_upvotes (id, question_id, voter_kind, voter_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(question_id)
        .bind(voter.kind())
        .bind(voter.id())
        .bind(timestamp_now())
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;
        Ok(())
    }

    /// Remove an upvote. Returns `false` if there was none.
    pub async fn delete_upvote(
        &self,
        question_id: &str,
        voter: &VoterIdentity,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM question_upvotes WHERE question_id = ? AND voter_kind = ? AND voter_id = ?",
        )
        .bind(question_id)
        .bind(voter.kind())
        .bind(voter.id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        self.increment_revision().await?;
        Ok(true)
    }

    // ==================== REPLY OPERATIONS ====================

    /// List the replies to a question, oldest first.
    pub async fn list_replies(&self, question_id: &str) -> Result<Vec<Reply>, AppError> {
        let rows = sqlx::query(
            "SELECT id, question_id, body, created_at FROM question_replies WHERE question_id = ? ORDER BY created_at ASC, rowid ASC"
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(reply_from_row).collect())
    }

    /// Store a reply to a question.
    pub async fn insert_reply(&self, question_id: &str, body: &str) -> Result<Reply, AppError> {
        if self.get_question(question_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Question {} not found",
                question_id
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp_now();

        sqlx::query(
            "INSERT INTO question_replies (id, question_id, body, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(question_id)
        .bind(body)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Reply {
            id,
            question_id: question_id.to_string(),
            body: body.to_string(),
            created_at: now,
        })
    }

    /// Delete a reply.
    pub async fn delete_reply(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM question_replies WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Reply {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }

    // ==================== ATTENDANCE OPERATIONS ====================

    /// List check-ins for a class, most recent first.
    pub async fn list_attendance(&self, class_id: &str) -> Result<Vec<Attendance>, AppError> {
        let rows = sqlx::query(
            "SELECT id, class_id, user_id, attendee_name, checked_in_at FROM attendance WHERE class_id = ? ORDER BY checked_in_at DESC, rowid DESC"
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(attendance_from_row).collect())
    }

    /// Check a member in. A second check-in fails with `Conflict`.
    pub async fn check_in(
        &self,
        class_id: &str,
        user_id: &str,
        attendee_name: &str,
    ) -> Result<Attendance, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp_now();

        sqlx::query(
            "INSERT INTO attendance (id, class_id, user_id, attendee_name, checked_in_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(class_id)
        .bind(user_id)
        .bind(attendee_name)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Attendance {
            id,
            class_id: class_id.to_string(),
            user_id: user_id.to_string(),
            attendee_name: attendee_name.to_string(),
            checked_in_at: now,
        })
    }

    /// Remove a member's check-in.
    pub async fn check_out(&self, class_id: &str, user_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM attendance WHERE class_id = ? AND user_id = ?")
            .bind(class_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "No check-in for class {}",
                class_id
            )));
        }

        self.increment_revision().await?;
        Ok(())
    }

    // ==================== SPEAKER SUGGESTION OPERATIONS ====================

    /// List speaker suggestions for a class, most voted first.
    pub async fn list_suggestions(
        &self,
        class_id: &str,
        user_id: Option<&str>,
    ) -> Result<Vec<SpeakerSuggestion>, AppError> {
        let rows = sqlx::query(
            r#"SELECT s.id, s.class_id, s.name, s.topic, s.votes, s.created_at,
                      EXISTS (SELECT 1 FROM speaker_votes v WHERE v.suggestion_id = s.id AND v.user_id = ?) AS user_has_voted
               FROM speaker_suggestions s
               WHERE s.class_id = ?
               ORDER BY s.votes DESC, s.created_at ASC"#,
        )
        .bind(user_id)
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(suggestion_from_row).collect())
    }

    /// Suggest a guest speaker.
    pub async fn create_suggestion(
        &self,
        class_id: &str,
        request: &CreateSuggestionRequest,
    ) -> Result<SpeakerSuggestion, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp_now();
        let name = request.name.trim();
        let topic = request.topic.trim();

        sqlx::query(
            "INSERT INTO speaker_suggestions (id, class_id, name, topic, votes, created_at) VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(&id)
        .bind(class_id)
        .bind(name)
        .bind(topic)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(SpeakerSuggestion {
            id,
            class_id: class_id.to_string(),
            name: name.to_string(),
            topic: topic.to_string(),
            votes: 0,
            created_at: now,
            user_has_voted: false,
        })
    }

    /// Vote for a speaker. The vote row and the tally change in one transaction;
    /// a repeated vote fails with `Conflict` and leaves the tally untouched.
    pub async fn vote_suggestion(
        &self,
        suggestion_id: &str,
        user_id: &str,
    ) -> Result<SpeakerSuggestion, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO speaker_votes (id, suggestion_id, user_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(suggestion_id)
        .bind(user_id)
        .bind(timestamp_now())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            "UPDATE speaker_suggestions SET votes = votes + 1 WHERE id = ? RETURNING id, class_id, name, topic, votes, created_at, 1 AS user_has_voted",
        )
        .bind(suggestion_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Suggestion {} not found", suggestion_id)))?;

        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(timestamp_now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(suggestion_from_row(&row))
    }

    // ==================== SLIDE OPERATIONS ====================

    /// List the slides published for a class, newest first.
    pub async fn list_slides(&self, class_id: &str) -> Result<Vec<Slide>, AppError> {
        let rows = sqlx::query(
            "SELECT id, class_id, title, url, created_at FROM slides WHERE class_id = ? ORDER BY created_at DESC, rowid DESC"
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(slide_from_row).collect())
    }

    /// Publish a slide link for a class.
    pub async fn create_slide(
        &self,
        class_id: &str,
        request: &CreateSlideRequest,
    ) -> Result<Slide, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp_now();

        sqlx::query("INSERT INTO slides (id, class_id, title, url, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&id)
            .bind(class_id)
            .bind(request.title.trim())
            .bind(request.url.trim())
            .bind(&now)
            .execute(&self.pool)
            .await?;

        self.increment_revision().await?;

        Ok(Slide {
            id,
            class_id: Some(class_id.to_string()),
            title: request.title.trim().to_string(),
            url: request.url.trim().to_string(),
            created_at: now,
        })
    }

    /// Delete a slide.
    pub async fn delete_slide(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM slides WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Slide {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }
}

impl QaStore for Repository {
    async fn get_class(&self, class_id: &str) -> Result<Option<ClassSession>, AppError> {
        Repository::get_class(self, class_id).await
    }

    async fn list_questions(&self, class_id: &str) -> Result<Vec<Question>, AppError> {
        Repository::list_questions(self, class_id).await
    }

    async fn count_upvotes(&self, question_id: &str) -> Result<i64, AppError> {
        Repository::count_upvotes(self, question_id).await
    }

    async fn has_upvoted(&self, question_id: &str, voter: &VoterIdentity) -> Result<bool, AppError> {
        Repository::has_upvoted(self, question_id, voter).await
    }

    async fn list_replies(&self, question_id: &str) -> Result<Vec<Reply>, AppError> {
        Repository::list_replies(self, question_id).await
    }

    async fn insert_question(&self, class_id: &str, body: &str) -> Result<Question, AppError> {
        Repository::insert_question(self, class_id, body).await
    }

    async fn insert_upvote(&self, question_id: &str, voter: &VoterIdentity) -> Result<(), AppError> {
        Repository::insert_upvote(self, question_id, voter).await
    }

    async fn delete_upvote(&self, question_id: &str, voter: &VoterIdentity) -> Result<bool, AppError> {
        Repository::delete_upvote(self, question_id, voter).await
    }

    async fn insert_reply(&self, question_id: &str, body: &str) -> Result<Reply, AppError> {
        Repository::insert_reply(self, question_id, body).await
    }

    async fn set_answered(&self, question_id: &str, answered: bool) -> Result<(), AppError> {
        Repository::set_answered(self, question_id, answered).await
    }

    async fn set_qa_open(&self, class_id: &str, open: bool) -> Result<(), AppError> {
        Repository::set_qa_open(self, class_id, open).await
    }

    async fn delete_question(&self, question_id: &str) -> Result<(), AppError> {
        Repository::delete_question(self, question_id).await
    }

    async fn delete_reply(&self, reply_id: &str) -> Result<(), AppError> {
        Repository::delete_reply(self, reply_id).await
    }
}

// Helper functions for timestamps and row conversion

/// Current time in the fixed-width form stored in every timestamp column.
fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 timestamp in any offset and store it as UTC.
pub fn normalize_timestamp(value: &str) -> Result<String, AppError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| {
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Micros, true)
        })
        .map_err(|e| AppError::Validation(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Half-open `[start, end)` range covering one UTC day.
fn day_bounds(day: NaiveDate) -> Result<(String, String), AppError> {
    let next = day
        .succ_opt()
        .ok_or_else(|| AppError::Validation(format!("Day {} is out of range", day)))?;
    let bound = |d: NaiveDate| {
        d.and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc().to_rfc3339_opts(SecondsFormat::Micros, true))
            .ok_or_else(|| AppError::Internal(format!("Cannot build midnight for {}", d)))
    };
    Ok((bound(day)?, bound(next)?))
}

fn class_from_row(row: &sqlx::sqlite::SqliteRow) -> ClassSession {
    let qa_open: i32 = row.get("qa_open");
    ClassSession {
        id: row.get("id"),
        title: row.get("title"),
        subtitle: row.get("subtitle"),
        description: row.get("description"),
        location: row.get("location"),
        class_date: row.get("class_date"),
        duration_minutes: row.get("duration_minutes"),
        qa_open: qa_open != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn question_from_row(row: &sqlx::sqlite::SqliteRow) -> Question {
    let is_answered: i32 = row.get("is_answered");
    Question {
        id: row.get("id"),
        class_id: row.get("class_id"),
        body: row.get("body"),
        is_answered: is_answered != 0,
        created_at: row.get("created_at"),
    }
}

fn reply_from_row(row: &sqlx::sqlite::SqliteRow) -> Reply {
    Reply {
        id: row.get("id"),
        question_id: row.get("question_id"),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}

fn attendance_from_row(row: &sqlx::sqlite::SqliteRow) -> Attendance {
    Attendance {
        id: row.get("id"),
        class_id: row.get("class_id"),
        user_id: row.get("user_id"),
        attendee_name: row.get("attendee_name"),
        checked_in_at: row.get("checked_in_at"),
    }
}

fn suggestion_from_row(row: &sqlx::sqlite::SqliteRow) -> SpeakerSuggestion {
    let user_has_voted: i32 = row.get("user_has_voted");
    SpeakerSuggestion {
        id: row.get("id"),
        class_id: row.get("class_id"),
        name: row.get("name"),
        topic: row.get("topic"),
        votes: row.get("votes"),
        created_at: row.get("created_at"),
        user_has_voted: user_has_voted != 0,
    }
}

fn slide_from_row(row: &sqlx::sqlite::SqliteRow) -> Slide {
    Slide {
        id: row.get("id"),
        class_id: row.get("class_id"),
        title: row.get("title"),
        url: row.get("url"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        (Repository::new(pool), temp_dir)
    }

    fn class_request(title: &str, class_date: &str) -> CreateClassRequest {
        CreateClassRequest {
            title: title.to_string(),
            subtitle: None,
            description: String::new(),
            location: "Main hall".to_string(),
            class_date: class_date.to_string(),
            duration_minutes: 60,
            qa_open: true,
        }
    }

    #[test]
    fn test_normalize_timestamp_converts_to_utc() {
        assert_eq!(
            normalize_timestamp("2026-03-01T19:30:00+02:00").unwrap(),
            "2026-03-01T17:30:00.000000Z"
        );
        assert!(matches!(
            normalize_timestamp("tomorrow evening"),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_classes_for_day() {
        let (repo, _dir) = repo().await;
        repo.create_class(&class_request("Late", "2026-03-01T20:00:00Z"))
            .await
            .unwrap();
        repo.create_class(&class_request("Early", "2026-03-01T08:00:00Z"))
            .await
            .unwrap();
        repo.create_class(&class_request("Next day", "2026-03-02T00:00:00Z"))
            .await
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let titles: Vec<String> = repo
            .list_classes(Some(day))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["Early", "Late"]);

        assert_eq!(repo.list_classes(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_upvote_is_conflict() {
        let (repo, _dir) = repo().await;
        let class = repo
            .create_class(&class_request("Tafsir", "2026-03-01T18:00:00Z"))
            .await
            .unwrap();
        let question = repo.insert_question(&class.id, "What is sabr?").await.unwrap();
        let voter = VoterIdentity::Anonymous("token-1".into());

        repo.insert_upvote(&question.id, &voter).await.unwrap();
        let second = repo.insert_upvote(&question.id, &voter).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
        assert_eq!(repo.count_upvotes(&question.id).await.unwrap(), 1);

        // Same id string under the other identity kind is a different voter.
        repo.insert_upvote(&question.id, &VoterIdentity::Authenticated("token-1".into()))
            .await
            .unwrap();
        assert_eq!(repo.count_upvotes(&question.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_question_writes_are_published() {
        let (repo, _dir) = repo().await;
        let class = repo
            .create_class(&class_request("Fiqh", "2026-03-01T18:00:00Z"))
            .await
            .unwrap();
        let mut channel = repo.changes().subscribe(class.id.clone());

        let question = repo.insert_question(&class.id, "Q").await.unwrap();
        repo.set_answered(&question.id, true).await.unwrap();
        repo.delete_question(&question.id).await.unwrap();

        let mut kinds = Vec::new();
        for _ in 0..3 {
            match channel.next().await {
                Some(crate::realtime::ChannelEvent::Changed(change)) => kinds.push(change.kind),
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert_eq!(
            kinds,
            vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]
        );
    }

    #[tokio::test]
    async fn test_class_delete_publishes_question_deletes() {
        let (repo, _dir) = repo().await;
        let class = repo
            .create_class(&class_request("Usul", "2026-03-01T18:00:00Z"))
            .await
            .unwrap();
        let first = repo.insert_question(&class.id, "Q1").await.unwrap();
        let second = repo.insert_question(&class.id, "Q2").await.unwrap();
        let mut channel = repo.changes().subscribe(class.id.clone());

        repo.delete_class(&class.id).await.unwrap();

        let mut deleted = Vec::new();
        for _ in 0..2 {
            let event = tokio::time::timeout(std::time::Duration::from_secs(1), channel.next())
                .await
                .expect("no change published for class delete");
            match event {
                Some(crate::realtime::ChannelEvent::Changed(change)) => {
                    assert_eq!(change.kind, ChangeKind::Delete);
                    assert_eq!(change.class_id, class.id);
                    deleted.push(change.question_id);
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        deleted.sort();
        let mut expected = vec![first.id, second.id];
        expected.sort();
        assert_eq!(deleted, expected);

        assert!(repo.list_questions(&class.id).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_class(&class.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_question_cascades() {
        let (repo, _dir) = repo().await;
        let class = repo
            .create_class(&class_request("Seerah", "2026-03-01T18:00:00Z"))
            .await
            .unwrap();
        let question = repo.insert_question(&class.id, "Q").await.unwrap();
        repo.insert_reply(&question.id, "A").await.unwrap();
        repo.insert_upvote(&question.id, &VoterIdentity::Anonymous("t".into()))
            .await
            .unwrap();

        repo.delete_question(&question.id).await.unwrap();

        assert_eq!(repo.count_upvotes(&question.id).await.unwrap(), 0);
        assert!(repo.list_replies(&question.id).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_question(&question.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_speaker_vote_once_per_member() {
        let (repo, _dir) = repo().await;
        let class = repo
            .create_class(&class_request("Aqeedah", "2026-03-01T18:00:00Z"))
            .await
            .unwrap();
        let suggestion = repo
            .create_suggestion(
                &class.id,
                &CreateSuggestionRequest {
                    name: " Shaykh Ahmad ".into(),
                    topic: "Patience".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(suggestion.name, "Shaykh Ahmad");

        let voted = repo.vote_suggestion(&suggestion.id, "user-1").await.unwrap();
        assert_eq!(voted.votes, 1);
        assert!(voted.user_has_voted);

        let again = repo.vote_suggestion(&suggestion.id, "user-1").await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let listed = repo.list_suggestions(&class.id, Some("user-1")).await.unwrap();
        assert_eq!(listed[0].votes, 1);
        assert!(listed[0].user_has_voted);

        let anonymous_view = repo.list_suggestions(&class.id, None).await.unwrap();
        assert!(!anonymous_view[0].user_has_voted);
    }

    #[tokio::test]
    async fn test_check_in_once_per_member() {
        let (repo, _dir) = repo().await;
        let class = repo
            .create_class(&class_request("Hadith", "2026-03-01T18:00:00Z"))
            .await
            .unwrap();

        repo.check_in(&class.id, "user-1", "Yusuf").await.unwrap();
        assert!(matches!(
            repo.check_in(&class.id, "user-1", "Yusuf").await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(repo.list_attendance(&class.id).await.unwrap().len(), 1);

        repo.check_out(&class.id, "user-1").await.unwrap();
        assert!(repo.list_attendance(&class.id).await.unwrap().is_empty());
        assert!(matches!(
            repo.check_out(&class.id, "user-1").await,
            Err(AppError::NotFound(_))
        ));
    }
}
