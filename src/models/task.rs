use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::validation::{FieldError, Fields, ValidationError};

/// A to-do item.
///
/// `id` and `created_at` are assigned by the database on insert and never
/// change afterwards. Everything else may be replaced through an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    pub created_at: DateTime<Utc>,
}

/// How urgent a task is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const LABELS: &'static str = "low, medium, high";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// A validated task ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Option<Priority>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            completed: false,
            priority: None,
        }
    }

    /// Validate a client document against the task schema.
    ///
    /// `title` is required; `completed` defaults to `false`. Unknown fields
    /// are ignored.
    pub fn from_document(document: &Value) -> Result<Self, ValidationError> {
        let mut fields = Fields::of(document)?;

        let title = fields.required_string("title");
        let description = fields.nullable_string("description").flatten();
        let completed = fields.boolean("completed").unwrap_or(false);
        let priority = fields
            .nullable_label("priority", Priority::from_str, Priority::LABELS)
            .flatten();

        fields.finish()?;
        Ok(Self {
            title,
            description,
            completed,
            priority,
        })
    }
}

/// A validated partial update.
///
/// Outer `None` leaves a field untouched. For the optional fields an inner
/// `None` clears the stored value.
///
/// `id` and `created_at` hold values a client echoed back, typically from a
/// previous read. They never change the record; [`TaskPatch::apply`] rejects
/// them when they differ from the stored values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    pub priority: Option<Option<Priority>>,
    pub id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TaskPatch {
    pub fn from_document(document: &Value) -> Result<Self, ValidationError> {
        let mut fields = Fields::of(document)?;

        let title = if fields.contains("title") {
            Some(fields.required_string("title"))
        } else {
            None
        };
        let description = fields.nullable_string("description");
        let completed = fields.boolean("completed");
        let priority =
            fields.nullable_label("priority", Priority::from_str, Priority::LABELS);
        let id = fields.nullable_uuid("id");
        let legacy_id = fields.nullable_uuid("_id");
        let created_at = fields.nullable_timestamp("createdAt");

        fields.finish()?;
        Ok(Self {
            title,
            description,
            completed,
            priority,
            id: id.or(legacy_id),
            created_at,
        })
    }

    /// True when no stored field would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
    }

    /// Produce the record that results from applying this patch.
    pub fn apply(self, task: Task) -> Result<Task, ValidationError> {
        let mut conflicts = Vec::new();
        if self.id.is_some_and(|id| id != task.id) {
            conflicts.push("id");
        }
        if self.created_at.is_some_and(|ts| ts != task.created_at) {
            conflicts.push("createdAt");
        }
        if !conflicts.is_empty() {
            return Err(ValidationError {
                errors: conflicts
                    .into_iter()
                    .map(|field| FieldError {
                        field: field.to_string(),
                        message: "cannot be modified".to_string(),
                    })
                    .collect(),
            });
        }

        Ok(Task {
            id: task.id,
            title: self.title.unwrap_or(task.title),
            description: self.description.unwrap_or(task.description),
            completed: self.completed.unwrap_or(task.completed),
            priority: self.priority.unwrap_or(task.priority),
            created_at: task.created_at,
        })
    }
}

/// Body returned when a task is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDeletion {
    pub message: String,
    pub task: Task,
}

impl TaskDeletion {
    pub fn new(task: Task) -> Self {
        Self {
            message: "Task deleted successfully".to_string(),
            task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_task() -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "Write report".to_string(),
            description: Some("Quarterly numbers".to_string()),
            completed: false,
            priority: Some(Priority::High),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn new_task_applies_defaults() {
        let task = NewTask::from_document(&json!({ "title": "Write report" })).unwrap();
        assert_eq!(task, NewTask::titled("Write report"));
    }

    #[test]
    fn new_task_keeps_every_supplied_field() {
        let task = NewTask::from_document(&json!({
            "title": "Write report",
            "description": "Quarterly numbers",
            "completed": true,
            "priority": "medium",
            "color": "blue"
        }))
        .unwrap();

        assert_eq!(task.description.as_deref(), Some("Quarterly numbers"));
        assert!(task.completed);
        assert_eq!(task.priority, Some(Priority::Medium));
    }

    #[test]
    fn new_task_requires_title() {
        let err = NewTask::from_document(&json!({ "description": "no title" })).unwrap_err();
        assert_eq!(err.fields(), vec!["title"]);
    }

    #[test]
    fn new_task_rejects_unknown_priority() {
        let err =
            NewTask::from_document(&json!({ "title": "x", "priority": "urgent" })).unwrap_err();
        assert_eq!(err.to_string(), "priority: must be one of low, medium, high");
    }

    #[test]
    fn patch_accepts_echoed_identity() {
        let task = sample_task();
        let document = serde_json::to_value(Task {
            completed: true,
            ..task.clone()
        })
        .unwrap();

        let updated = TaskPatch::from_document(&document)
            .unwrap()
            .apply(task.clone())
            .unwrap();

        assert!(updated.completed);
        assert_eq!(updated.id, task.id);
        assert_eq!(updated.created_at, task.created_at);
    }

    #[test]
    fn patch_rejects_changed_identity() {
        let patch = TaskPatch::from_document(&json!({
            "_id": Uuid::new_v4(),
            "createdAt": "2020-01-01T00:00:00Z",
            "completed": true
        }))
        .unwrap();

        let err = patch.apply(sample_task()).unwrap_err();
        assert_eq!(err.fields(), vec!["id", "createdAt"]);
        assert_eq!(
            err.to_string(),
            "id: cannot be modified; createdAt: cannot be modified"
        );
    }

    #[test]
    fn patch_rejects_malformed_identity() {
        let err = TaskPatch::from_document(&json!({ "id": "abc" })).unwrap_err();
        assert_eq!(err.fields(), vec!["id"]);
    }

    #[test]
    fn patch_rejects_null_title() {
        let err = TaskPatch::from_document(&json!({ "title": null })).unwrap_err();
        assert_eq!(err.fields(), vec!["title"]);
    }

    #[test]
    fn patch_only_touches_supplied_fields() {
        let task = sample_task();
        let patch = TaskPatch::from_document(&json!({ "completed": true })).unwrap();
        let updated = patch.apply(task.clone()).unwrap();

        assert!(updated.completed);
        assert_eq!(updated.title, task.title);
        assert_eq!(updated.description, task.description);
        assert_eq!(updated.priority, task.priority);
        assert_eq!(updated.created_at, task.created_at);
    }

    #[test]
    fn patch_null_clears_optional_fields() {
        let patch =
            TaskPatch::from_document(&json!({ "description": null, "priority": null })).unwrap();
        let updated = patch.apply(sample_task()).unwrap();

        assert!(updated.description.is_none());
        assert!(updated.priority.is_none());
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(TaskPatch::from_document(&json!({})).unwrap().is_empty());

        let echoed = json!({ "id": Uuid::new_v4(), "createdAt": "2020-01-01T00:00:00Z" });
        assert!(TaskPatch::from_document(&echoed).unwrap().is_empty());
    }

    #[test]
    fn task_serializes_with_camel_case_and_omits_absent_fields() {
        let mut task = sample_task();
        task.description = None;
        task.priority = None;
        let value = serde_json::to_value(&task).unwrap();

        assert!(value.get("createdAt").is_some());
        assert!(value.get("description").is_none());
        assert!(value.get("priority").is_none());
        assert_eq!(value["completed"], json!(false));
    }
}
