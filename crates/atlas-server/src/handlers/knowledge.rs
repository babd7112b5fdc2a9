use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use atlas_core::api_types::{
    ConnectedNodesResponse, ConnectedQuery, CreateEdgeRequest, EdgeResponse, GraphStatsResponse,
    NodeListQuery, NodeListResponse, NodeResponse, ProcessDocumentRequest, SaveEdgesRequest,
    SaveEdgesResponse, SaveNodesRequest, SaveNodesResponse,
};
use atlas_core::{NodeQuery, NodeUpdate, ProcessOptions, ProcessOutcome};

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/knowledge/nodes
pub async fn list_nodes(
    State(state): State<AppState>,
    query: Result<Query<NodeListQuery>, QueryRejection>,
) -> ApiResult<Json<NodeListResponse>> {
    let Query(query) = query?;
    let limit = query.bounded_limit();
    info!(limit, node_type = ?query.node_type, query = ?query.query, "Listing nodes");

    let nodes = state
        .knowledge
        .get_nodes(&NodeQuery {
            limit,
            node_type: query.node_type,
            query: query.query,
        })
        .await?;
    let total = nodes.len();
    Ok(Json(NodeListResponse { nodes, total }))
}

/// POST /api/knowledge/nodes
pub async fn save_nodes(
    State(state): State<AppState>,
    body: Result<Json<SaveNodesRequest>, JsonRejection>,
) -> ApiResult<Json<SaveNodesResponse>> {
    let Json(request) = body?;
    info!(count = request.nodes.len(), "Saving nodes");
    let nodes = state.knowledge.save_nodes(request.nodes).await?;
    Ok(Json(SaveNodesResponse { nodes }))
}

/// GET /api/knowledge/nodes/{key}
pub async fn get_node(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<NodeResponse>> {
    let node = state.knowledge.get_node(&key).await?;
    Ok(Json(NodeResponse { node }))
}

/// PATCH /api/knowledge/nodes/{key}
pub async fn update_node(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Result<Json<NodeUpdate>, JsonRejection>,
) -> ApiResult<Json<NodeResponse>> {
    let Json(update) = body?;
    info!(node_key = %key, "Updating node");
    let node = state.knowledge.update_node(&key, update).await?;
    Ok(Json(NodeResponse { node }))
}

/// DELETE /api/knowledge/nodes/{key}
pub async fn delete_node(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<StatusCode> {
    info!(node_key = %key, "Deleting node");
    state.knowledge.delete_node(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/knowledge/nodes/{key}/connected
pub async fn connected_nodes(
    State(state): State<AppState>,
    Path(key): Path<String>,
    query: Result<Query<ConnectedQuery>, QueryRejection>,
) -> ApiResult<Json<ConnectedNodesResponse>> {
    let Query(query) = query?;
    let connected = state
        .knowledge
        .get_connected_nodes(&key, query.edge_type, query.direction)
        .await?;
    Ok(Json(ConnectedNodesResponse {
        node_key: key,
        connected,
    }))
}

/// POST /api/knowledge/edges
pub async fn create_edge(
    State(state): State<AppState>,
    body: Result<Json<CreateEdgeRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EdgeResponse>)> {
    let Json(request) = body?;
    info!(
        edge_type = %request.edge_type.as_str(),
        source = %request.source,
        target = %request.target,
        "Creating edge"
    );
    let edge = state.knowledge.create_edge(request).await?;
    Ok((StatusCode::CREATED, Json(EdgeResponse { edge })))
}

/// POST /api/knowledge/edges/batch (endpoints named by node name)
pub async fn save_edges(
    State(state): State<AppState>,
    body: Result<Json<SaveEdgesRequest>, JsonRejection>,
) -> ApiResult<Json<SaveEdgesResponse>> {
    let Json(request) = body?;
    info!(count = request.edges.len(), "Saving edges");
    Ok(Json(state.knowledge.save_edges(request.edges).await?))
}

/// DELETE /api/knowledge/edges/{key}
pub async fn delete_edge(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<StatusCode> {
    state.knowledge.delete_edge(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/knowledge/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<GraphStatsResponse>> {
    Ok(Json(state.knowledge.stats().await?))
}

/// POST /api/knowledge/documents: chunk raw text into the graph.
pub async fn process_document(
    State(state): State<AppState>,
    body: Result<Json<ProcessDocumentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ProcessOutcome>)> {
    let Json(request) = body?;
    let settings = state.current_settings().await?;
    let options = request.options.resolve(ProcessOptions::from(&settings));
    info!(name = %request.name, ?options, "Processing document");

    let outcome = state
        .ingestor
        .process_document(&request.content, &request.name, request.metadata, options)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// DELETE /api/knowledge/documents/{key}
pub async fn remove_document(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = state.ingestor.remove_document(&key).await?;
    Ok(Json(serde_json::json!({ "documentKey": key, "removedNodes": removed })))
}
