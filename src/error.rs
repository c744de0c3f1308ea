//! Error taxonomy for the cache layer
//!
//! Cache-layer faults (`CacheUnavailable`) are caught and logged inside the
//! pipeline and never surface to the client; every other variant maps to a
//! client-visible HTTP status.

/// Errors produced while admitting, compiling, or resolving a request
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Request body had no query, or the query failed to parse
    BadRequest(String),
    /// Per-client request ceiling exceeded for the current second
    RateLimited { limit: u32 },
    /// Query nesting exceeds the configured maximum
    QueryTooDeep { depth: usize, max: usize },
    /// Static query cost exceeds the configured ceiling
    QueryTooCostly { cost: f64, max: f64 },
    /// The origin resolver failed to execute the (reduced) query
    Upstream(String),
    /// Key-value store fault; handled fail-open inside the cache layer
    CacheUnavailable(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            QueryError::RateLimited { limit } => {
                write!(f, "Rate limit of {} requests per second exceeded", limit)
            }
            QueryError::QueryTooDeep { depth, max } => {
                write!(f, "Query depth {} exceeds maximum of {}", depth, max)
            }
            QueryError::QueryTooCostly { cost, max } => {
                write!(f, "Query cost {} exceeds maximum of {}", cost, max)
            }
            QueryError::Upstream(msg) => write!(f, "Origin resolver error: {}", msg),
            QueryError::CacheUnavailable(msg) => write!(f, "Cache unavailable: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {}
