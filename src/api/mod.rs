//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Introspection endpoints are mounted under `/api/v1`; system endpoints
//! live at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for every HTTP and WebSocket endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "consult-relay",
        description = "WebSocket chat relay for telehealth consultations"
    ),
    paths(
        handlers::system::health_handler,
        handlers::system::relay_settings_handler,
        handlers::rooms::list_rooms,
        handlers::rooms::get_session_room,
        handlers::rooms::get_consultation_room,
        crate::ws::handler::ws_handler,
        crate::ws::handler::session_ws_handler,
        crate::ws::handler::consultation_ws_handler,
    ),
    tags(
        (name = "System", description = "Health and settings"),
        (name = "Rooms", description = "Live room introspection"),
        (name = "Chat", description = "WebSocket chat ingress"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
