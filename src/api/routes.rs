use crate::api::handlers::{chat, health, memory, sse};
use crate::AppState;
use crate::{auth::middleware::auth_middleware, context};
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use std::any::Any;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Assemble the full application: public routes, the authenticated `/mm/v1`
/// surface, and the shared middleware stack.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health::health_check));

    let protected_routes = Router::new()
        .route(
            "/mm/v1/agent/chat/completions",
            post(chat::agent_chat_completions),
        )
        .route(
            "/mm/v1/workflow/chat/completions",
            post(chat::workflow_chat_completions),
        )
        .route(
            "/mm/v1/sse/{kind}/chat/completions",
            post(sse::sse_chat_completions),
        )
        .route(
            "/mm/v1/memory/{user_id}/memories",
            get(memory::list_memories).post(memory::create_memory),
        )
        .route(
            "/mm/v1/memory/{user_id}/memories/{memory_id}",
            delete(memory::delete_memory),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    public_routes
        .merge(protected_routes)
        .merge(docs_routes())
        .with_state(state)
        .layer(middleware::from_fn(request_scope))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(not(feature = "swagger-ui"))]
fn docs_routes() -> Router<AppState> {
    use utoipa::OpenApi;
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(crate::api::ApiDoc::openapi()) }),
    )
}

#[cfg(feature = "swagger-ui")]
fn docs_routes() -> Router<AppState> {
    use utoipa::OpenApi;
    use utoipa_swagger_ui::SwaggerUi;
    Router::new().merge(
        SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", crate::api::ApiDoc::openapi()),
    )
}

/// Gives every request its own context slots.
async fn request_scope(req: Request, next: Next) -> Response {
    context::scope(next.run(req)).await
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": format!("An unexpected error occurred: {}", detail) })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mindmatrix::MindMatrix;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState::new(Arc::new(MindMatrix::builder().build())))
    }

    #[test]
    fn test_panic_payload_is_reported() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health_skips_auth() {
        let response = app()
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_route_requires_credentials() {
        let request = HttpRequest::get("/mm/v1/memory/u1/memories")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = app()
            .oneshot(HttpRequest::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
