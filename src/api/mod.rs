//! HTTP API Handlers and Routes
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Router assembly and middleware stack
//!
//! # API Endpoints
//!
//! ## Chat (`/mm/v1`)
//! - `POST /mm/v1/agent/chat/completions` - OpenAI-compatible completion from an agent
//! - `POST /mm/v1/workflow/chat/completions` - Same, routed to a workflow
//! - `POST /mm/v1/sse/{kind}/chat/completions` - Named event stream (`stream`, `artifact`, `error`)
//!
//! ## Memory (`/mm/v1/memory`)
//! - `GET /mm/v1/memory/{user_id}/memories` - List a user's memories
//! - `POST /mm/v1/memory/{user_id}/memories` - Store a memory
//! - `DELETE /mm/v1/memory/{user_id}/memories/{memory_id}` - Delete a memory
//!
//! ## Public
//! - `GET /health` - Liveness probe
//! - `GET /api-docs/openapi.json` - OpenAPI document
//!
//! When the `swagger-ui` feature is enabled, interactive documentation is
//! served at `/swagger-ui/`.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

use crate::auth::middleware::API_KEY_HEADER;
use crate::types::{
    Artifact, ChatCompletionChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    DeltaMessage, MemoryCreateRequest, MemoryCreateResponse, MemoryDeleteResponse, Usage,
    UserMemory,
};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// OpenAPI description of the MindMatrix HTTP surface.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::chat::agent_chat_completions,
        handlers::chat::workflow_chat_completions,
        handlers::sse::sse_chat_completions,
        handlers::memory::list_memories,
        handlers::memory::create_memory,
        handlers::memory::delete_memory,
    ),
    components(schemas(
        ChatMessage,
        ChatCompletionRequest,
        ChatCompletionResponse,
        ChatCompletionChoice,
        DeltaMessage,
        Usage,
        Artifact,
        UserMemory,
        MemoryCreateRequest,
        MemoryCreateResponse,
        MemoryDeleteResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "chat", description = "Agent and workflow conversations"),
        (name = "memory", description = "Per-user memories"),
        (name = "system", description = "Operational endpoints")
    ),
    info(title = "MindMatrix", description = "Agent and workflow server")
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
        );
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
