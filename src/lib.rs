//! Qache - Normalizing Cache Layer
//!
//! Sits between a GraphQL front end and an origin resolver, splitting each
//! incoming query into "already cached" and "must be fetched" portions,
//! merging the two, and decomposing the merged result into flat,
//! independently-addressable cache entries for future reuse.
//!
//! # Architecture
//!
//! - AST Layer: hand-written lexer/parser producing a standard GraphQL AST
//! - Compiler: AST -> annotated prototype + operation classification
//! - Cache Reader: prototype-driven partial reconstruction with miss marking
//! - Query Reducer: minimal follow-up query for the origin
//! - Response Merger: cache partial + origin remainder -> unified response
//! - Normalizer: response -> flat per-entity records + ID index
//! - Mutation Invalidator: surgical create/update/delete of affected records
//! - Admission Control: rate, depth, and cost gates ahead of all cache work
//! - Storage: Redis-compatible command surface behind the `CacheStore` seam

pub mod types;
pub mod error;
pub mod config;
pub mod schema;
pub mod storage;
pub mod id_index;
pub mod prototype;

// GraphQL front-end modules
pub mod gql_lexer;
pub mod gql_ast;
pub mod gql_parser;

// Pipeline stages
pub mod compiler;
pub mod cache_reader;
pub mod query_reducer;
pub mod merger;
pub mod normalizer;
pub mod invalidator;
pub mod admission;
pub mod executor;

// HTTP surface
pub mod server;

pub use types::{entity_key, ArgValue, CacheHit};
pub use error::QueryError;
pub use config::{AdmissionConfig, CacheConfig, ServerConfig};
pub use schema::{SchemaMaps, TypeRef};
pub use storage::{CacheStore, MemoryStore};
pub use id_index::IdIndex;
pub use prototype::{FieldShape, PrototypeNode};

// Pipeline exports
pub use compiler::{compile, CompiledQuery, FragmentTable, OperationKind};
pub use cache_reader::CacheReader;
pub use query_reducer::{create_query_obj, create_query_str};
pub use merger::join_responses;
pub use normalizer::Normalizer;
pub use invalidator::Invalidator;
pub use admission::AdmissionControl;
pub use executor::{
    OriginResolver, QueryCache, QueryRequest, QueryResponse, StoreIntrospection,
};

// Parser exports
pub use gql_parser::Parser as GqlParser;
