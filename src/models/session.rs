use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::task::Task;
use super::validation::{Fields, ValidationError};

/// A completed focus interval.
///
/// Sessions are **append-only**: once logged they are never updated or
/// deleted. `task_id` is a weak reference; it is not checked on insert and
/// may point at a task that no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub task_id: Option<Uuid>,
    /// Length of the interval in minutes.
    pub duration: f64,
    pub completed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A session as listed, with its task reference resolved at read time.
///
/// `task` is `None` when the session was logged without a task or when the
/// referenced task has since been deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionWithTask {
    pub id: Uuid,
    #[serde(rename = "taskId")]
    pub task: Option<Task>,
    pub duration: f64,
    pub completed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A validated session ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub task_id: Option<Uuid>,
    pub duration: f64,
    /// Defaults to the insert time when not supplied.
    pub completed_at: Option<DateTime<Utc>>,
}

impl NewSession {
    pub fn from_document(document: &Value) -> Result<Self, ValidationError> {
        let mut fields = Fields::of(document)?;

        let task_id = fields.nullable_uuid("taskId");
        let duration = fields.required_duration("duration");
        let completed_at = fields.nullable_timestamp("completedAt");

        fields.finish()?;
        Ok(Self {
            task_id,
            duration,
            completed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_requires_duration() {
        let err = NewSession::from_document(&json!({ "taskId": null })).unwrap_err();
        assert_eq!(err.fields(), vec!["duration"]);
    }

    #[test]
    fn session_accepts_bare_duration() {
        let session = NewSession::from_document(&json!({ "duration": 25 })).unwrap();
        assert_eq!(session.duration, 25.0);
        assert!(session.task_id.is_none());
        assert!(session.completed_at.is_none());
    }

    #[test]
    fn session_parses_reference_and_timestamp() {
        let task_id = Uuid::new_v4();
        let session = NewSession::from_document(&json!({
            "taskId": task_id.to_string(),
            "duration": 12.5,
            "completedAt": "2024-03-01T09:30:00Z"
        }))
        .unwrap();

        assert_eq!(session.task_id, Some(task_id));
        assert_eq!(
            session.completed_at.unwrap().to_rfc3339(),
            "2024-03-01T09:30:00+00:00"
        );
    }

    #[test]
    fn session_rejects_malformed_reference() {
        let err =
            NewSession::from_document(&json!({ "taskId": "abc", "duration": 5 })).unwrap_err();
        assert_eq!(err.to_string(), "taskId: must be a valid identifier");
    }

    #[test]
    fn logged_session_always_carries_task_field() {
        let session = Session {
            id: Uuid::new_v4(),
            task_id: None,
            duration: 25.0,
            completed_at: Utc::now(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["taskId"], Value::Null);
    }

    #[test]
    fn listed_session_always_carries_task_field() {
        let session = SessionWithTask {
            id: Uuid::new_v4(),
            task: None,
            duration: 25.0,
            completed_at: Utc::now(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["taskId"], Value::Null);
    }
}
