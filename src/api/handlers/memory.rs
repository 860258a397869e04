use crate::{
    providers::MemoryProvider,
    types::{MemoryCreateRequest, MemoryCreateResponse, MemoryDeleteResponse, Result, UserMemory},
    AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};

/// List a user's memories
#[utoipa::path(
    get,
    path = "/mm/v1/memory/{user_id}/memories",
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Stored memories", body = Vec<UserMemory>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "memory",
    security(("api_key" = []), ("bearer" = []))
)]
pub async fn list_memories(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<UserMemory>>> {
    let memory = MemoryProvider::new(state.mindmatrix.clone()).memory()?;
    Ok(Json(memory.get_user_memories(Some(&user_id)).await?))
}

/// Store a memory for a user
#[utoipa::path(
    post,
    path = "/mm/v1/memory/{user_id}/memories",
    params(("user_id" = String, Path, description = "User identifier")),
    request_body = MemoryCreateRequest,
    responses(
        (status = 200, description = "Memory stored", body = MemoryCreateResponse),
        (status = 400, description = "Empty memory"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "memory",
    security(("api_key" = []), ("bearer" = []))
)]
pub async fn create_memory(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<MemoryCreateRequest>,
) -> Result<Json<MemoryCreateResponse>> {
    if payload.memory.trim().is_empty() {
        return Err(crate::types::AppError::InvalidInput(
            "Memory text must not be empty".to_string(),
        ));
    }

    let memory = MemoryProvider::new(state.mindmatrix.clone()).memory()?;
    let topics = payload.topics.unwrap_or_default();
    let memory_id = memory
        .add_user_memory(
            Some(&user_id),
            UserMemory::new(payload.memory.clone(), topics.clone()),
        )
        .await?;

    tracing::debug!(user_id = %user_id, memory_id = %memory_id, "memory created");
    Ok(Json(MemoryCreateResponse {
        memory_id,
        memory: payload.memory,
        topics,
    }))
}

/// Delete one of a user's memories
#[utoipa::path(
    delete,
    path = "/mm/v1/memory/{user_id}/memories/{memory_id}",
    params(
        ("user_id" = String, Path, description = "User identifier"),
        ("memory_id" = String, Path, description = "Memory identifier")
    ),
    responses(
        (status = 200, description = "Memory deleted", body = MemoryDeleteResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Unknown memory")
    ),
    tag = "memory",
    security(("api_key" = []), ("bearer" = []))
)]
pub async fn delete_memory(
    State(state): State<AppState>,
    Path((user_id, memory_id)): Path<(String, String)>,
) -> Result<Json<MemoryDeleteResponse>> {
    let memory = MemoryProvider::new(state.mindmatrix.clone()).memory()?;
    memory.delete_user_memory(Some(&user_id), &memory_id).await?;
    Ok(Json(MemoryDeleteResponse {
        memory_id,
        deleted: true,
    }))
}
