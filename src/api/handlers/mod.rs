use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::{ApiError, ApiJson};
use crate::db::{Database, StoreResult};
use crate::models::*;

/// Run one gateway call on the blocking pool so a slow statement never
/// stalls the request loop.
async fn with_store<T, F>(db: Database, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&db))
        .await
        .map_err(|e| ApiError::Internal(format!("Database task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Path ids are taken as raw strings; anything that is not a UUID cannot
/// name a stored record.
fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

// ============================================================
// Root
// ============================================================

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "FocusTools API",
        "status": "Running",
        "endpoints": {
            "tasks": "/api/tasks",
            "sessions": "/api/sessions",
        },
    }))
}

// ============================================================
// Tasks
// ============================================================

pub async fn create_task(
    State(db): State<Database>,
    ApiJson(body): ApiJson,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let input = NewTask::from_document(&body)?;
    let task = with_store(db, move |db| db.create_task(input)).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list_tasks(State(db): State<Database>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(with_store(db, |db| db.get_all_tasks()).await?))
}

pub async fn get_task(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let id = parse_id(&id).ok_or_else(ApiError::task_not_found)?;
    with_store(db, move |db| db.get_task(id))
        .await?
        .map(Json)
        .ok_or_else(ApiError::task_not_found)
}

pub async fn update_task(
    State(db): State<Database>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson,
) -> Result<Json<Task>, ApiError> {
    let id = parse_id(&id).ok_or_else(ApiError::task_not_found)?;
    let patch = TaskPatch::from_document(&body)?;
    with_store(db, move |db| db.update_task(id, patch))
        .await?
        .map(Json)
        .ok_or_else(ApiError::task_not_found)
}

pub async fn delete_task(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<Json<TaskDeletion>, ApiError> {
    let id = parse_id(&id).ok_or_else(ApiError::task_not_found)?;
    with_store(db, move |db| db.delete_task(id))
        .await?
        .map(|task| Json(TaskDeletion::new(task)))
        .ok_or_else(ApiError::task_not_found)
}

// ============================================================
// Sessions
// ============================================================

pub async fn create_session(
    State(db): State<Database>,
    ApiJson(body): ApiJson,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let input = NewSession::from_document(&body)?;
    let session = with_store(db, move |db| db.create_session(input)).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn list_sessions(
    State(db): State<Database>,
) -> Result<Json<Vec<SessionWithTask>>, ApiError> {
    Ok(Json(with_store(db, |db| db.get_all_sessions()).await?))
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::db::StoreError;

    #[tokio::test(flavor = "current_thread")]
    async fn slow_store_calls_leave_the_runtime_free() {
        let db = Database::open_memory().unwrap();
        let slow = tokio::spawn(with_store(db, |_| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        }));

        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(started.elapsed() < Duration::from_millis(250));

        slow.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn store_failures_become_api_errors() {
        let err = with_store(Database::disconnected(), |db| db.get_all_tasks())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = with_store(Database::disconnected(), |_| -> StoreResult<()> {
            Err(StoreError::Validation(ValidationError::field(
                "id",
                "cannot be modified",
            )))
        })
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn parse_id_accepts_only_uuids() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()), Some(id));
        assert_eq!(parse_id("507f1f77bcf86cd799439011"), None);
    }
}
