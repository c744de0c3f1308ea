//! Request pipeline
//!
//! Orchestrates one request end to end: admission, compilation, cache read,
//! query reduction, origin resolution, response merge, and normalization.
//! The cache layer fails open at every step — a store fault degrades the
//! request to full origin resolution, never to a client-visible error.

use crate::admission::AdmissionControl;
use crate::cache_reader::CacheReader;
use crate::compiler::{compile, OperationKind};
use crate::config::{AdmissionConfig, CacheConfig};
use crate::error::QueryError;
use crate::gql_parser::Parser;
use crate::id_index::IdIndex;
use crate::invalidator::Invalidator;
use crate::merger::join_responses;
use crate::normalizer::Normalizer;
use crate::prototype::FieldShape;
use crate::query_reducer::{create_query_obj, create_query_str};
use crate::schema::SchemaMaps;
use crate::storage::{parse_info, CacheStore};
use crate::types::CacheHit;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Executes unresolved (sub-)queries against the system of record
#[async_trait]
pub trait OriginResolver: Send + Sync {
    /// Resolve query source text into a response data object
    async fn resolve(&self, query: &str, variables: Option<&Value>) -> Result<Value, String>;
}

/// One incoming request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    pub query: Option<String>,
    pub variables: Option<Value>,
    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,
}

/// One outgoing response
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub data: Value,
    #[serde(rename = "cacheHit")]
    pub cache_hit: CacheHit,
}

/// Parsed store INFO plus key and value listings, for the admin surface
#[derive(Debug, Clone, Serialize)]
pub struct StoreIntrospection {
    pub sections: BTreeMap<String, BTreeMap<String, String>>,
    pub keys: Vec<String>,
    pub values: BTreeMap<String, Value>,
}

/// The cache manager: owns the ID index and wires every pipeline stage
/// around the shared store and schema maps
pub struct QueryCache {
    store: Arc<dyn CacheStore>,
    origin: Arc<dyn OriginResolver>,
    schema: SchemaMaps,
    id_index: IdIndex,
    cache_config: CacheConfig,
    admission: AdmissionControl,
}

impl QueryCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        origin: Arc<dyn OriginResolver>,
        schema: SchemaMaps,
        cache_config: CacheConfig,
        admission_config: AdmissionConfig,
    ) -> Self {
        QueryCache {
            store,
            origin,
            schema,
            id_index: IdIndex::new(cache_config.id_index_max_entries),
            cache_config,
            admission: AdmissionControl::new(admission_config),
        }
    }

    /// Process one request from a client
    pub async fn process(
        &self,
        request: &QueryRequest,
        client: &str,
    ) -> Result<QueryResponse, QueryError> {
        self.admission.check_rate(client)?;

        let source = request
            .query
            .as_deref()
            .filter(|query| !query.trim().is_empty())
            .ok_or_else(|| QueryError::BadRequest("Missing query".to_string()))?;

        let document = Parser::parse(source).map_err(QueryError::BadRequest)?;
        let compiled = compile(
            &document,
            request.operation_name.as_deref(),
            &self.schema,
            &self.cache_config,
        )?;

        self.admission.check_depth(&compiled.prototype)?;
        self.admission.check_cost(&compiled.prototype, compiled.kind)?;

        match compiled.kind {
            OperationKind::Unquellable | OperationKind::NoId => {
                tracing::debug!(kind = ?compiled.kind, "bypassing cache");
                let data = self.resolve_origin(source, request.variables.as_ref()).await?;
                Ok(QueryResponse {
                    data,
                    cache_hit: CacheHit::None,
                })
            }
            OperationKind::Mutation => self.process_mutation(source, request, &compiled).await,
            OperationKind::Query => self.process_query(&compiled).await,
        }
    }

    async fn process_query(
        &self,
        compiled: &crate::compiler::CompiledQuery,
    ) -> Result<QueryResponse, QueryError> {
        let mut prototype = compiled.prototype.clone();

        let reader = CacheReader::new(self.store.as_ref(), &self.id_index, &self.cache_config);
        let cache_data = reader.build_from_cache(&mut prototype).await;

        let reduced = create_query_obj(&prototype);
        let reduced_source = create_query_str(&reduced, OperationKind::Query);

        if reduced_source.is_empty() {
            tracing::debug!("full cache hit");
            return Ok(QueryResponse {
                data: cache_data,
                cache_hit: CacheHit::Full,
            });
        }

        tracing::debug!(query = %reduced_source, "fetching remainder from origin");
        let origin_data = self.resolve_origin(&reduced_source, None).await?;
        let merged = join_responses(&cache_data, &origin_data, &prototype);

        let normalizer = Normalizer::new(self.store.as_ref(), &self.id_index, &self.cache_config);
        normalizer.normalize_for_cache(&merged, &prototype, None).await;

        let cache_hit = if value_has_content(&cache_data) {
            CacheHit::Partial
        } else {
            CacheHit::None
        };
        Ok(QueryResponse {
            data: merged,
            cache_hit,
        })
    }

    async fn process_mutation(
        &self,
        source: &str,
        request: &QueryRequest,
        compiled: &crate::compiler::CompiledQuery,
    ) -> Result<QueryResponse, QueryError> {
        let data = self.resolve_origin(source, request.variables.as_ref()).await?;

        // Invalidation runs after the origin succeeds and must never block
        // returning the mutation's own result
        let invalidator = Invalidator::new(self.store.as_ref(), &self.schema, &self.cache_config);
        for (name, shape) in &compiled.prototype.fields {
            let node = match shape {
                FieldShape::Entity(node) | FieldShape::EntityList(node) => node,
                _ => continue,
            };
            invalidator
                .update_cache_by_mutation(&data, node.response_key(name), &node.type_name, &node.args)
                .await;
        }

        Ok(QueryResponse {
            data,
            cache_hit: CacheHit::None,
        })
    }

    async fn resolve_origin(
        &self,
        query: &str,
        variables: Option<&Value>,
    ) -> Result<Value, QueryError> {
        self.origin
            .resolve(query, variables)
            .await
            .map_err(QueryError::Upstream)
    }

    /// Flush the store and reset the ID index
    pub async fn clear_cache(&self) -> Result<(), QueryError> {
        self.store
            .flush()
            .await
            .map_err(QueryError::CacheUnavailable)?;
        self.id_index.clear();
        tracing::info!("cache cleared");
        Ok(())
    }

    /// Store statistics plus key and value listings
    pub async fn store_introspection(&self) -> Result<StoreIntrospection, QueryError> {
        let info = self
            .store
            .info()
            .await
            .map_err(QueryError::CacheUnavailable)?;
        let keys = self
            .store
            .keys()
            .await
            .map_err(QueryError::CacheUnavailable)?;
        let values = self
            .store
            .mget(&keys)
            .await
            .map_err(QueryError::CacheUnavailable)?;

        let values = keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| {
                let text = value?;
                let parsed = serde_json::from_str(&text).unwrap_or(Value::String(text));
                Some((key.clone(), parsed))
            })
            .collect();

        Ok(StoreIntrospection {
            sections: parse_info(&info),
            keys,
            values,
        })
    }

    pub fn id_index(&self) -> &IdIndex {
        &self.id_index
    }
}

/// Whether a partial response actually carries data (an empty shell like
/// `{"book": {}}` does not)
fn value_has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(fields) => fields.values().any(value_has_content),
        Value::Array(items) => items.iter().any(value_has_content),
        _ => true,
    }
}
