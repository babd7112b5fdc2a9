use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// Multipart bodies may exceed axum's 2 MB default; the upload pipeline
/// enforces the configured limit itself.
const UPLOAD_BODY_LIMIT: usize = 256 * 1024 * 1024;

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health
        .route("/api/health", get(handlers::health::health_check))
        .route("/api/health/services", get(handlers::health::service_health))
        // Knowledge graph
        .route(
            "/api/knowledge/nodes",
            get(handlers::knowledge::list_nodes).post(handlers::knowledge::save_nodes),
        )
        .route(
            "/api/knowledge/nodes/{key}",
            get(handlers::knowledge::get_node)
                .patch(handlers::knowledge::update_node)
                .delete(handlers::knowledge::delete_node),
        )
        .route(
            "/api/knowledge/nodes/{key}/connected",
            get(handlers::knowledge::connected_nodes),
        )
        .route("/api/knowledge/edges", post(handlers::knowledge::create_edge))
        .route("/api/knowledge/edges/batch", post(handlers::knowledge::save_edges))
        .route(
            "/api/knowledge/edges/{key}",
            axum::routing::delete(handlers::knowledge::delete_edge),
        )
        .route("/api/knowledge/stats", get(handlers::knowledge::stats))
        .route(
            "/api/knowledge/documents",
            post(handlers::knowledge::process_document),
        )
        .route(
            "/api/knowledge/documents/{key}",
            axum::routing::delete(handlers::knowledge::remove_document),
        )
        // Documents
        .route(
            "/api/documents",
            get(handlers::documents::list_documents)
                .post(handlers::documents::upload_document)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/documents/{id}",
            get(handlers::documents::get_document)
                .patch(handlers::documents::update_document)
                .delete(handlers::documents::delete_document),
        )
        .route(
            "/api/documents/{id}/content",
            get(handlers::documents::document_content),
        )
        // Agents
        .route(
            "/api/agents",
            get(handlers::agents::list_agents).post(handlers::agents::create_agent),
        )
        .route(
            "/api/agents/{id}",
            get(handlers::agents::get_agent)
                .patch(handlers::agents::update_agent)
                .delete(handlers::agents::delete_agent),
        )
        // Workflows
        .route(
            "/api/workflows",
            get(handlers::workflows::list_workflows).post(handlers::workflows::create_workflow),
        )
        .route(
            "/api/workflows/{id}",
            get(handlers::workflows::get_workflow)
                .patch(handlers::workflows::update_workflow)
                .delete(handlers::workflows::delete_workflow),
        )
        // Integrations
        .route("/api/integrations", get(handlers::integrations::list_connectors))
        .route(
            "/api/integrations/connections",
            get(handlers::integrations::list_connections)
                .post(handlers::integrations::create_connection),
        )
        .route(
            "/api/integrations/connections/{id}",
            get(handlers::integrations::get_connection)
                .patch(handlers::integrations::update_connection)
                .delete(handlers::integrations::delete_connection),
        )
        .route(
            "/api/integrations/{name}",
            get(handlers::integrations::list_integrations),
        )
        // Settings
        .route(
            "/api/settings",
            get(handlers::settings::get_settings).patch(handlers::settings::update_settings),
        )
        // Real-time
        .route("/api/websocket", get(handlers::websocket::websocket))
        .route("/api/websocket/status", post(handlers::websocket::post_status))
}
