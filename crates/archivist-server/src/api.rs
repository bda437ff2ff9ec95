use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::archive::Archive;
use crate::auth::require_access;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::query::{self, ListParams};
use crate::visibility::VisibilityStore;

#[derive(Clone)]
pub struct AppState {
    pub archive: Archive,
    pub visibility: Arc<VisibilityStore>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    // Every `/api` path, matched or not, passes the access check first.
    let api = Router::new()
        .route("/api", any(route_not_found))
        .route("/api/", any(route_not_found))
        .route("/api/channels", get(list_channels).fallback(method_not_allowed))
        .route("/api/message", get(lookup_message).fallback(method_not_allowed))
        .route("/api/messages", get(list_messages).fallback(method_not_allowed))
        .route("/api/*rest", any(route_not_found))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_access,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Attach `status` and `success` to a JSON object body.
pub fn envelope(status: StatusCode, mut body: Value) -> Response {
    if let Value::Object(map) = &mut body {
        map.insert("status".into(), json!(status.as_u16()));
        map.insert("success".into(), json!(status == StatusCode::OK));
    }
    (status, Json(body)).into_response()
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct LookupParams {
    id: Option<String>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_channels(State(state): State<AppState>) -> Result<Response, ApiError> {
    let entries = query::list_channels(&state.archive, &state.visibility).await?;

    let channels: Map<String, Value> = entries
        .into_iter()
        .map(|c| {
            let entry = json!({
                "name": c.name,
                "guild": { "id": c.guild_id, "name": c.guild_name },
            });
            (c.id, entry)
        })
        .collect();

    Ok(envelope(StatusCode::OK, json!({ "channels": channels })))
}

async fn lookup_message(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> Result<Response, ApiError> {
    let id = params
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("A message \"id\" has to be specified.".into()))?;

    let messages = query::lookup(&state.archive, &id).await?;
    Ok(envelope(
        StatusCode::OK,
        json!({ "count": messages.len(), "messages": messages }),
    ))
}

async fn list_messages(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let list = params.validate(state.config.max_limit)?;
    let messages = query::list_messages(&state.archive, &state.visibility, &list).await?;
    Ok(envelope(
        StatusCode::OK,
        json!({ "count": messages.len(), "messages": messages }),
    ))
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::message_in;
    use crate::visibility::test_support::store_in;
    use crate::visibility::ForbiddenList;
    use archivist_shared::mentions::rewrite;
    use archivist_shared::record::MessageRecord;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const TOKEN: &str = "test-token";

    struct Harness {
        state: AppState,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let forbidden = ForbiddenList {
            channels: ["10".to_string()].into_iter().collect(),
            guilds: Default::default(),
        };
        let visibility = Arc::new(store_in(dir.path(), forbidden));
        let config = ServerConfig {
            admins: ["77".to_string()].into_iter().collect(),
            api_tokens: vec![TOKEN.to_string()],
            ..ServerConfig::default()
        };

        let archive = Archive::in_memory();
        for (channel, id, ts) in [("9", "m3", 3), ("10", "m4", 4), ("9", "m5", 5)] {
            let msg = message_in(channel, "77", id, ts);
            let record =
                MessageRecord::assemble(&msg, rewrite(&msg.content, &msg.mentions)).unwrap();
            archive.store_revision(record).await.unwrap();
        }

        Harness {
            state: AppState {
                archive,
                visibility,
                config: Arc::new(config),
            },
            _dir: dir,
        }
    }

    async fn get_json(state: &AppState, uri: &str, auth: Option<(&str, &str)>) -> (StatusCode, Value) {
        send_json(state, Method::GET, uri, auth).await
    }

    async fn send_json(
        state: &AppState,
        method: Method,
        uri: &str,
        auth: Option<(&str, &str)>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some((name, value)) = auth {
            req = req.header(name, value);
        }
        let response = build_router(state.clone())
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn bearer() -> Option<(&'static str, &'static str)> {
        Some(("authorization", "Bearer test-token"))
    }

    #[tokio::test]
    async fn health_is_open() {
        let h = harness().await;
        let (status, body) = get_json(&h.state, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unauthenticated_requests_are_refused() {
        let h = harness().await;
        let (status, body) = get_json(&h.state, "/api/messages?user=77", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Requires authentication.");
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], 403);

        let (status, body) =
            get_json(&h.state, "/api/nope", Some(("authorization", "Bearer wrong"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "You do not have access.");
    }

    #[tokio::test]
    async fn session_users_need_access() {
        let h = harness().await;
        let uri = "/api/messages?channel=9";

        let (status, _) = get_json(&h.state, uri, Some(("x-archivist-user", "55"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        h.state.visibility.allow_users(&["55".to_string()]);
        let (status, body) = get_json(&h.state, uri, Some(("x-archivist-user", "55"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, _) = get_json(&h.state, uri, Some(("x-archivist-user", "77"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn list_validation_errors() {
        let h = harness().await;

        let (status, body) = get_json(&h.state, "/api/messages", bearer()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
        assert_eq!(body["success"], false);

        let (status, body) =
            get_json(&h.state, "/api/messages?channel=9&limit=1000", bearer()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "The \"limit\" specified (1000) is higher than maximum (50) allowed."
        );

        let (status, _) = get_json(&h.state, "/api/messages?channel=9&offset=-1", bearer()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_redacted() {
        let h = harness().await;
        let (status, body) = get_json(&h.state, "/api/messages?user=77", bearer()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        let ids: Vec<&str> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["m5", "m3"]);

        let (_, body) = get_json(&h.state, "/api/messages?channel=10", bearer()).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn lookup_by_key_skips_redaction() {
        let h = harness().await;

        let (status, body) = get_json(&h.state, "/api/message?id=m4_4", bearer()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["messages"][0]["revisionKey"], "m4-4");

        let (_, body) = get_json(&h.state, "/api/message?id=m4_5", bearer()).await;
        assert_eq!(body["count"], 0);

        let (status, _) = get_json(&h.state, "/api/message?id=m4-4", bearer()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn channels_hide_forbidden_and_ignored() {
        let h = harness().await;

        let (status, body) = get_json(&h.state, "/api/channels", bearer()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channels"]["9"]["name"], "channel-9");
        assert_eq!(body["channels"]["9"]["guild"]["id"], "1");
        assert!(body["channels"].get("10").is_none());

        h.state.visibility.ignore_channels(&["9".to_string()]);
        let (_, body) = get_json(&h.state, "/api/channels", bearer()).await;
        assert!(body["channels"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_api_route() {
        let h = harness().await;
        let (status, body) = get_json(&h.state, "/api/nope/deeper", bearer()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Route not found");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn api_root_is_an_unknown_route() {
        let h = harness().await;

        for uri in ["/api", "/api/"] {
            let (status, body) = get_json(&h.state, uri, bearer()).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["message"], "Route not found");
            assert_eq!(body["status"], 404);
            assert_eq!(body["success"], false);

            let (status, body) = get_json(&h.state, uri, None).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
            assert_eq!(body["message"], "Requires authentication.");
        }
    }

    #[tokio::test]
    async fn wrong_method_gets_an_envelope() {
        let h = harness().await;

        let (status, body) =
            send_json(&h.state, Method::POST, "/api/messages?channel=9", bearer()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["message"], "Method not allowed");
        assert_eq!(body["status"], 405);
        assert_eq!(body["success"], false);

        let (status, _) = send_json(&h.state, Method::DELETE, "/api/channels", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
