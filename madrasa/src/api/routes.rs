//! API routes for the madrasa server
//!
//! Every endpoint answers with the uniform `{status, data, message}`
//! envelope. Validation is presence checks only; graph and driver errors
//! propagate as generic 400s with the error text in `message`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use madrasa_kg::{episode, mutation, Episode, EpisodeType, KgError, KnowledgeGraph};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Application state
pub struct AppState {
    pub kg: Arc<KnowledgeGraph>,
}

/// Uniform response envelope
#[derive(Serialize)]
pub struct Envelope {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub message: String,
}

impl Envelope {
    pub fn success(data: Option<serde_json::Value>, message: impl Into<String>) -> Json<Envelope> {
        Json(Envelope {
            status: "success".to_string(),
            data,
            message: message.into(),
        })
    }
}

/// An error answered with the envelope and a 4xx/5xx status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = Envelope {
            status: "error".to_string(),
            data: None,
            message: self.message,
        };
        (self.status, Json(envelope)).into_response()
    }
}

impl From<KgError> for ApiError {
    fn from(e: KgError) -> Self {
        ApiError::bad_request(e.to_string())
    }
}

// ── Request bodies ───────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AddNodeRequest {
    pub data: Option<AddNodeData>,
}

#[derive(Deserialize)]
pub struct AddNodeData {
    pub properties: Option<NodeProperties>,
}

#[derive(Deserialize)]
pub struct NodeProperties {
    pub name: Option<String>,
    pub content: Option<serde_json::Value>,
    pub source: Option<String>,
    pub source_description: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteNodeRequest {
    pub uuid: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateEdgeRequest {
    pub source_id: Option<String>,
    pub target_id: Option<String>,
    pub rel_type: Option<String>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
pub struct ExecuteCypherRequest {
    pub query: Option<String>,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

// ── Validation ───────────────────────────────────────────────────────────

fn validate_add_node(request: AddNodeRequest) -> Result<Episode, ApiError> {
    let properties = request
        .data
        .and_then(|d| d.properties)
        .ok_or_else(|| ApiError::bad_request("Invalid request: data and properties required"))?;

    let name = properties
        .name
        .ok_or_else(|| ApiError::bad_request("Error missing parameters: name"))?;
    let content = properties
        .content
        .ok_or_else(|| ApiError::bad_request("Error missing parameters: content"))?;
    let source = properties
        .source
        .ok_or_else(|| ApiError::bad_request("Error missing parameters: source"))?;
    let description = properties
        .source_description
        .ok_or_else(|| ApiError::bad_request("Error missing parameters: source_description"))?;

    let source = EpisodeType::parse(&source)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown source type: {}", source)))?;

    Ok(Episode {
        name,
        content,
        source,
        description,
    })
}

fn validate_delete_node(request: DeleteNodeRequest) -> Result<String, ApiError> {
    request
        .uuid
        .filter(|uuid| !uuid.is_empty())
        .ok_or_else(|| ApiError::bad_request("Invalid request: uuid required"))
}

fn validate_update_edge(
    request: UpdateEdgeRequest,
) -> Result<(String, String, String, serde_json::Map<String, serde_json::Value>), ApiError> {
    match (request.source_id, request.target_id, request.rel_type) {
        (Some(source), Some(target), Some(rel_type))
            if !source.is_empty() && !target.is_empty() && !rel_type.is_empty() =>
        {
            Ok((source, target, rel_type, request.properties))
        }
        _ => Err(ApiError::bad_request(
            "Invalid request: source_id, target_id, and rel_type required",
        )),
    }
}

fn validate_execute_cypher(
    request: ExecuteCypherRequest,
) -> Result<(String, serde_json::Map<String, serde_json::Value>), ApiError> {
    let query = request
        .query
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Invalid request: query required"))?;
    Ok((query, request.params))
}

// ── Handlers ─────────────────────────────────────────────────────────────

/// Submit an episode to the graph.
pub async fn add_node(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddNodeRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let record = validate_add_node(request)?;
    let uuid = episode::add_episode(state.kg.graph(), &record, Utc::now()).await?;

    Ok(Envelope::success(
        Some(serde_json::json!({ "uuid": uuid })),
        "Node added successfully",
    ))
}

/// Delete a node and its relationships.
pub async fn delete_node(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeleteNodeRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let uuid = validate_delete_node(request)?;

    if !mutation::delete_node(state.kg.graph(), &uuid).await? {
        return Err(ApiError::not_found(format!(
            "Node with uuid {} not found",
            uuid
        )));
    }

    Ok(Envelope::success(None, format!("Node {} deleted", uuid)))
}

/// Merge properties onto an existing edge.
pub async fn update_edge(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateEdgeRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let (source, target, rel_type, properties) = validate_update_edge(request)?;

    if !mutation::update_edge(state.kg.graph(), &source, &target, &rel_type, &properties).await? {
        return Err(ApiError::not_found(
            "Edge not found or no properties updated",
        ));
    }

    Ok(Envelope::success(None, "Edge updated"))
}

/// Execute a raw Cypher query.
pub async fn execute_cypher(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExecuteCypherRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let (query, params) = validate_execute_cypher(request)?;

    let rows = mutation::run_cypher(state.kg.graph(), &query, &params).await?;

    Ok(Envelope::success(
        Some(serde_json::Value::Array(rows)),
        "Query executed",
    ))
}

/// Database liveness probe.
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Envelope>, ApiError> {
    let status = state.kg.health_check_ping().await;
    if !status.is_operational() {
        return Err(ApiError::unavailable("Database is not responding"));
    }

    Ok(Envelope::success(
        Some(serde_json::json!({
            "database": status,
            "version": env!("CARGO_PKG_VERSION"),
        })),
        "Service healthy",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_node_request(body: serde_json::Value) -> AddNodeRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_add_node_requires_data_and_properties() {
        let err = validate_add_node(add_node_request(serde_json::json!({}))).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("data and properties required"));

        let err = validate_add_node(add_node_request(serde_json::json!({ "data": {} })))
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_add_node_reports_missing_field() {
        let body = serde_json::json!({
            "data": { "properties": {
                "name": "درس",
                "content": "نص الدرس",
                "source_description": "كتاب"
            }}
        });
        let err = validate_add_node(add_node_request(body)).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("source"));
    }

    #[test]
    fn test_add_node_rejects_unknown_source_type() {
        let body = serde_json::json!({
            "data": { "properties": {
                "name": "درس",
                "content": "نص الدرس",
                "source": "video",
                "source_description": "كتاب"
            }}
        });
        let err = validate_add_node(add_node_request(body)).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("video"));
    }

    #[test]
    fn test_add_node_accepts_complete_request() {
        let body = serde_json::json!({
            "data": { "properties": {
                "name": "درس",
                "content": "نص الدرس",
                "source": "text",
                "source_description": "كتاب"
            }}
        });
        let record = validate_add_node(add_node_request(body)).unwrap();
        assert_eq!(record.source, EpisodeType::Text);
        assert_eq!(record.body(), "نص الدرس");
    }

    #[test]
    fn test_delete_node_requires_uuid() {
        let err =
            validate_delete_node(serde_json::from_value(serde_json::json!({})).unwrap())
                .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("uuid required"));
    }

    #[test]
    fn test_update_edge_requires_all_ids() {
        let request: UpdateEdgeRequest = serde_json::from_value(serde_json::json!({
            "source_id": "a",
            "rel_type": "RELATES_TO"
        }))
        .unwrap();
        let err = validate_update_edge(request).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("source_id, target_id, and rel_type"));
    }

    #[test]
    fn test_update_edge_defaults_properties_to_empty() {
        let request: UpdateEdgeRequest = serde_json::from_value(serde_json::json!({
            "source_id": "a",
            "target_id": "b",
            "rel_type": "RELATES_TO"
        }))
        .unwrap();
        let (_, _, _, properties) = validate_update_edge(request).unwrap();
        assert!(properties.is_empty());
    }

    #[test]
    fn test_execute_cypher_requires_query() {
        let err =
            validate_execute_cypher(serde_json::from_value(serde_json::json!({})).unwrap())
                .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("query required"));
    }

    #[test]
    fn test_error_response_codes_and_envelope() {
        let response = ApiError::bad_request("bad").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::not_found("missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::unavailable("down").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = Envelope {
            status: "success".to_string(),
            data: Some(serde_json::json!({ "uuid": "u-1" })),
            message: "Node added successfully".to_string(),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"]["uuid"], "u-1");
        assert_eq!(json["message"], "Node added successfully");
    }

    #[test]
    fn test_driver_errors_map_to_400() {
        let err: ApiError = KgError::QueryError("boom".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("boom"));
    }
}
