//! HTTP surface
//!
//! Axum router exposing the query endpoint and the admin operations
//! (cache clear, store introspection). CORS is permissive: this layer sits
//! in front of browser clients the same way the origin API would.

use crate::error::QueryError;
use crate::executor::{QueryCache, QueryRequest};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<QueryCache>,
}

/// Build the application router
pub fn router(cache: Arc<QueryCache>) -> Router {
    Router::new()
        .route("/graphql", post(handle_graphql))
        .route("/admin/clear-cache", post(handle_clear_cache))
        .route("/admin/store-info", get(handle_store_info))
        .layer(CorsLayer::permissive())
        .with_state(AppState { cache })
}

/// Run the server until shutdown
pub async fn serve(cache: Arc<QueryCache>, addr: &str) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", addr, e))?;
    tracing::info!(addr, "listening");

    axum::serve(
        listener,
        router(cache).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| format!("Server error: {}", e))
}

async fn handle_graphql(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> impl IntoResponse {
    let client = client_address(&headers, connect_info);

    match state.cache.process(&request, &client).await {
        Ok(response) => (
            StatusCode::OK,
            Json(json!({
                "data": response.data,
                "cacheHit": response.cache_hit,
            })),
        ),
        Err(err) => (
            status_for(&err),
            Json(json!({
                "data": null,
                "errors": [{ "message": err.to_string() }],
            })),
        ),
    }
}

async fn handle_clear_cache(State(state): State<AppState>) -> impl IntoResponse {
    match state.cache.clear_cache().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "cleared": true }))),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "errors": [{ "message": err.to_string() }] })),
        ),
    }
}

async fn handle_store_info(State(state): State<AppState>) -> impl IntoResponse {
    match state.cache.store_introspection().await {
        Ok(introspection) => (StatusCode::OK, Json(json!(introspection))),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "errors": [{ "message": err.to_string() }] })),
        ),
    }
}

/// Rate-limit key for a request: forwarded address first, then the socket
fn client_address(headers: &HeaderMap, connect_info: Option<ConnectInfo<SocketAddr>>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    match connect_info {
        Some(ConnectInfo(addr)) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

fn status_for(err: &QueryError) -> StatusCode {
    match err {
        QueryError::BadRequest(_)
        | QueryError::QueryTooDeep { .. }
        | QueryError::QueryTooCostly { .. } => StatusCode::BAD_REQUEST,
        QueryError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        QueryError::Upstream(_) => StatusCode::BAD_GATEWAY,
        QueryError::CacheUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdmissionConfig, CacheConfig};
    use crate::executor::OriginResolver;
    use crate::schema::SchemaMaps;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    struct StaticOrigin(Value);

    #[async_trait]
    impl OriginResolver for StaticOrigin {
        async fn resolve(&self, _query: &str, _variables: Option<&Value>) -> Result<Value, String> {
            Ok(self.0.clone())
        }
    }

    fn test_router(max_per_sec: u32) -> Router {
        let mut schema = SchemaMaps::new();
        schema.add_query("book", "Book");
        let cache = Arc::new(QueryCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StaticOrigin(json!({ "book": { "id": "3", "name": "Dune" } }))),
            schema,
            CacheConfig::default(),
            AdmissionConfig {
                max_per_sec,
                ..AdmissionConfig::default()
            },
        ));
        router(cache)
    }

    fn graphql_request(body: Value, client: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/graphql")
            .header("content-type", "application/json")
            .header("x-forwarded-for", client)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_query_endpoint() {
        let app = test_router(100);
        let response = app
            .oneshot(graphql_request(
                json!({ "query": "{ book(id: \"3\") { id name } }" }),
                "10.0.0.1",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["book"]["name"], "Dune");
        assert_eq!(body["cacheHit"], "none");
    }

    #[tokio::test]
    async fn test_missing_query_is_bad_request() {
        let app = test_router(100);
        let response = app
            .oneshot(graphql_request(json!({}), "10.0.0.1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("Missing query"));
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_429() {
        let app = test_router(2);
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(graphql_request(
                    json!({ "query": "{ book(id: \"3\") { id name } }" }),
                    "10.9.9.9",
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(graphql_request(
                json!({ "query": "{ book(id: \"3\") { id name } }" }),
                "10.9.9.9",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_admin_endpoints() {
        let app = test_router(100);

        // Warm the cache through a query
        app.clone()
            .oneshot(graphql_request(
                json!({ "query": "{ book(id: \"3\") { id name } }" }),
                "10.0.0.1",
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/admin/store-info")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["sections"].get("server").is_some());
        assert!(body["keys"].as_array().unwrap().iter().any(|k| k == "Book--3"));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/clear-cache")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/admin/store-info")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert!(body["keys"].as_array().unwrap().is_empty());
    }
}
