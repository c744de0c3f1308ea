//! Configuration for the cache layer, admission control, and server

use serde::{Deserialize, Serialize};

/// Cache behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied to every cache entry, in seconds
    pub ttl_secs: u64,
    /// Number of reference keys fetched per pipelined batch
    pub batch_size: usize,
    /// Argument name treated as the unique identifier, overriding the
    /// conventional spellings (id, _id, ID, Id)
    pub user_defined_id: Option<String>,
    /// Ceiling on ID-index entries; new entries are dropped once full
    pub id_index_max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: 600,
            batch_size: 10,
            user_defined_id: None,
            id_index_max_entries: 10_000,
        }
    }
}

/// Admission-control configuration (rate, depth, and cost ceilings)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Maximum requests per client per second
    pub max_per_sec: u32,
    /// Maximum selection-set nesting depth
    pub max_depth: usize,
    /// Maximum static query cost
    pub max_cost: f64,
    /// Flat cost added for a mutation operation
    pub mutation_cost: f64,
    /// Cost of each object (entity) field
    pub object_cost: f64,
    /// Cost of each scalar field
    pub scalar_cost: f64,
    /// Multiplier applied per nesting level
    pub depth_factor: f64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        AdmissionConfig {
            max_per_sec: 20,
            max_depth: 10,
            max_cost: 5000.0,
            mutation_cost: 10.0,
            object_cost: 2.0,
            scalar_cost: 1.0,
            depth_factor: 1.5,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, e.g. "127.0.0.1:4000"
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: "127.0.0.1:4000".to_string(),
        }
    }
}
