//! REST route handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{ApiError, AppState, Envelope, APP_NAME};
use crate::catalog::ServerDescriptor;
use crate::error::VpnError;
use crate::session::{SpeedSample, VpnStatus};

/// Build the API router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/servers", get(handle_list_servers))
        .route("/api/vpn/server", post(handle_select_server))
        .route("/api/vpn/connect", post(handle_connect))
        .route("/api/vpn/disconnect", post(handle_disconnect))
        .route("/api/vpn/status", get(handle_status))
        .route("/api/vpn/speed", get(handle_speed))
        .route("/api/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRequest {
    pub server_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub session_id: String,
    pub ip: String,
    pub start_time: u64,
    pub config: String,
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl From<VpnStatus> for StatusResponse {
    fn from(status: VpnStatus) -> Self {
        match status {
            VpnStatus::Disconnected => Self {
                connected: false,
                server: None,
                duration: None,
                ip: None,
            },
            VpnStatus::Connected {
                server,
                duration,
                address,
            } => Self {
                connected: true,
                server: Some(server),
                duration: Some(duration.as_secs()),
                ip: Some(address.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub app: &'static str,
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/servers - List selectable servers
pub async fn handle_list_servers(
    State(state): State<AppState>,
) -> Json<Envelope<Vec<ServerDescriptor>>> {
    Envelope::ok(state.catalog.list().to_vec())
}

/// POST /api/vpn/server - Look up one server by code
pub async fn handle_select_server(
    State(state): State<AppState>,
    payload: Result<Json<ServerRequest>, JsonRejection>,
) -> ApiResult<ServerDescriptor> {
    let Json(request) = payload?;

    let server = state
        .catalog
        .get(&request.server_code)
        .cloned()
        .ok_or(VpnError::ServerNotFound {
            code: request.server_code,
        })?;

    Ok(Envelope::ok(server))
}

/// POST /api/vpn/connect - Start a session, replacing any active one
pub async fn handle_connect(
    State(state): State<AppState>,
    payload: Result<Json<ServerRequest>, JsonRejection>,
) -> ApiResult<ConnectResponse> {
    let Json(request) = payload?;

    let session = state.manager.connect(&request.server_code).await?;

    Ok(Envelope::ok(ConnectResponse {
        session_id: session.id.to_string(),
        ip: session.address.to_string(),
        start_time: session.started_at,
        config: session.peer_config,
    }))
}

/// POST /api/vpn/disconnect - End a session
pub async fn handle_disconnect(
    State(state): State<AppState>,
    payload: Result<Json<DisconnectRequest>, JsonRejection>,
) -> ApiResult<DisconnectResponse> {
    let Json(request) = payload?;

    state.manager.disconnect(&request.session_id).await?;

    Ok(Envelope::ok(DisconnectResponse {
        status: "disconnected",
    }))
}

/// GET /api/vpn/status - Current connection state
pub async fn handle_status(State(state): State<AppState>) -> Json<Envelope<StatusResponse>> {
    Envelope::ok(state.manager.status().await.into())
}

/// GET /api/vpn/speed - Synthetic speed figures
pub async fn handle_speed(State(state): State<AppState>) -> Json<Envelope<SpeedSample>> {
    Envelope::ok(state.manager.speed())
}

/// GET /api/health
pub async fn handle_health() -> Json<Envelope<HealthResponse>> {
    Envelope::ok(HealthResponse {
        status: "healthy",
        app: APP_NAME,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::catalog::ServerCatalog;
    use crate::crypto::keys::OsKeyGenerator;
    use crate::peer::{ClientTemplate, PeerController};
    use crate::pool::AddressPool;
    use crate::session::SessionManager;
    use crate::wireguard::fake::FakeTunnel;

    fn app(subnet: &str) -> (Router, Arc<FakeTunnel>) {
        let tunnel = Arc::new(FakeTunnel::new());
        let template = ClientTemplate {
            server_public_key: "YgkBjKXER5YarD8STsvMFURw/5nhCLIFOJ5uKWrrMW4=".to_string(),
            endpoint: "203.0.113.10".to_string(),
            port: 51820,
            dns: vec!["1.1.1.1".parse().unwrap(), "8.8.8.8".parse().unwrap()],
        };
        let peers = PeerController::new(tunnel.clone(), Arc::new(OsKeyGenerator), template);
        let catalog = Arc::new(ServerCatalog::new([ServerDescriptor::new(
            "KE",
            "Nairobi VPN",
            "203.0.113.10",
        )]));
        let pool = AddressPool::new(subnet.parse().unwrap()).unwrap();
        let manager = Arc::new(SessionManager::new(pool, peers, Arc::clone(&catalog)));

        (build_router(AppState { manager, catalog }), tunnel)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app("10.8.0.0/24");
        let (status, body) = send(&app, "GET", "/api/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_list_and_select_servers() {
        let (app, _) = app("10.8.0.0/24");

        let (status, body) = send(&app, "GET", "/api/servers", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["code"], "KE");
        assert_eq!(body["data"][0]["ip"], "203.0.113.10");

        let (status, body) =
            send(&app, "POST", "/api/vpn/server", Some(json!({"serverCode": "KE"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Nairobi VPN");

        let (status, body) =
            send(&app, "POST", "/api/vpn/server", Some(json!({"serverCode": "ZZ"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "server not found: ZZ");
    }

    #[tokio::test]
    async fn test_connect_status_disconnect_flow() {
        let (app, tunnel) = app("10.8.0.0/24");

        let (status, body) = send(&app, "GET", "/api/vpn/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({"connected": false}));

        let (status, body) =
            send(&app, "POST", "/api/vpn/connect", Some(json!({"serverCode": "KE"}))).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["ip"], "10.8.0.2");
        assert!(data["startTime"].as_u64().unwrap() > 0);
        assert!(data["config"].as_str().unwrap().contains("PersistentKeepalive = 25"));
        let session_id = data["sessionId"].as_str().unwrap().to_string();
        assert_eq!(tunnel.peer_count(), 1);

        let (_, body) = send(&app, "GET", "/api/vpn/status", None).await;
        assert_eq!(body["data"]["connected"], true);
        assert_eq!(body["data"]["server"], "KE");
        assert_eq!(body["data"]["ip"], "10.8.0.2");
        assert!(body["data"]["duration"].as_u64().unwrap() <= 1);

        let (status, body) = send(
            &app,
            "POST",
            "/api/vpn/disconnect",
            Some(json!({"sessionId": session_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "disconnected");
        assert_eq!(tunnel.peer_count(), 0);

        let (_, body) = send(&app, "GET", "/api/vpn/status", None).await;
        assert_eq!(body["data"]["connected"], false);
    }

    #[tokio::test]
    async fn test_disconnect_unknown_session() {
        let (app, _) = app("10.8.0.0/24");
        let (status, body) = send(
            &app,
            "POST",
            "/api/vpn/disconnect",
            Some(json!({"sessionId": "nope"})),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_malformed_bodies() {
        let (app, _) = app("10.8.0.0/24");

        let (status, body) =
            send(&app, "POST", "/api/vpn/connect", Some(json!({"server": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid request: malformed request body");

        // No JSON content type
        let (status, _) = send(&app, "POST", "/api/vpn/connect", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            send(&app, "POST", "/api/vpn/connect", Some(json!({"serverCode": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_provisioning_failure_maps_to_bad_gateway() {
        let (app, tunnel) = app("10.8.0.0/30");
        tunnel.fail_add(true);

        let (status, body) =
            send(&app, "POST", "/api/vpn/connect", Some(json!({"serverCode": "KE"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);

        // Address was rolled back
        tunnel.fail_add(false);
        let (status, body) =
            send(&app, "POST", "/api/vpn/connect", Some(json!({"serverCode": "KE"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["ip"], "10.8.0.2");
    }

    #[tokio::test]
    async fn test_speed_shape() {
        let (app, _) = app("10.8.0.0/24");
        let (status, body) = send(&app, "GET", "/api/vpn/speed", None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["download"].is_f64());
        assert!(body["data"]["upload"].is_f64());
        assert!(body["data"]["latency"].is_u64());
    }
}
