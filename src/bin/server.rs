//! Standalone cache server wired to an in-process demo origin
//!
//! Run with: cargo run --bin qache-server
//!
//! Endpoints:
//!   POST /graphql            - Execute a query through the cache layer
//!   POST /admin/clear-cache  - Flush the store and reset the ID index
//!   GET  /admin/store-info   - Store statistics and key/value listings

use async_trait::async_trait;
use qache_core::{
    AdmissionConfig, CacheConfig, MemoryStore, OriginResolver, QueryCache, SchemaMaps,
    ServerConfig,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Demo origin serving a small fixed dataset; a production deployment
/// implements `OriginResolver` against the real system of record
struct DemoOrigin;

#[async_trait]
impl OriginResolver for DemoOrigin {
    async fn resolve(&self, query: &str, _variables: Option<&Value>) -> Result<Value, String> {
        tracing::debug!(query, "demo origin resolving");
        if query.contains("countries") {
            return Ok(json!({ "countries": [
                { "id": "1", "name": "Chile", "capitol": { "id": "10", "name": "Santiago" } },
                { "id": "2", "name": "Peru", "capitol": { "id": "11", "name": "Lima" } },
            ]}));
        }
        if query.contains("country") {
            return Ok(json!({ "country": {
                "id": "1",
                "name": "Chile",
                "capitol": { "id": "10", "name": "Santiago" },
            }}));
        }
        Err(format!("Demo origin cannot resolve: {}", query))
    }
}

fn demo_schema() -> SchemaMaps {
    let mut schema = SchemaMaps::new();
    schema.add_query("country", "Country");
    schema.add_query("countries", "[Country]");
    schema.add_mutation("addCountry", "Country");
    schema.add_mutation("deleteCountry", "Country");
    schema.add_field("Country", "capitol", "City");
    schema
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let server_config = ServerConfig::default();
    let cache = Arc::new(QueryCache::new(
        Arc::new(MemoryStore::new()),
        Arc::new(DemoOrigin),
        demo_schema(),
        CacheConfig::default(),
        AdmissionConfig::default(),
    ));

    if let Err(err) = qache_core::server::serve(cache, &server_config.addr).await {
        tracing::error!(error = %err, "server exited");
        std::process::exit(1);
    }
}
