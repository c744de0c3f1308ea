//! Admission Control
//!
//! Three independent, composable pre-checks gating every request before any
//! cache or origin work: a per-client-per-second rate ceiling, a prototype
//! depth ceiling, and a static cost ceiling. All three fail closed with a
//! client-visible error.

use crate::compiler::OperationKind;
use crate::config::AdmissionConfig;
use crate::error::QueryError;
use crate::prototype::{FieldShape, PrototypeNode};
use dashmap::DashMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct AdmissionControl {
    config: AdmissionConfig,
    /// Counter keyed `"{clientAddress}:{unixSecond}"`; stale seconds are
    /// swept lazily on each check
    counters: DashMap<String, u32>,
}

impl AdmissionControl {
    pub fn new(config: AdmissionConfig) -> Self {
        AdmissionControl {
            config,
            counters: DashMap::new(),
        }
    }

    /// Per-client rate ceiling for the current second
    pub fn check_rate(&self, client: &str) -> Result<(), QueryError> {
        let second = current_second();
        let key = format!("{}:{}", client, second);

        let count = {
            let mut entry = self.counters.entry(key).or_insert(0);
            *entry += 1;
            *entry
        };

        // Expire counters from previous seconds
        let suffix = format!(":{}", second);
        self.counters.retain(|key, _| key.ends_with(&suffix));

        if count > self.config.max_per_sec {
            tracing::info!(client, count, "rate limit exceeded");
            return Err(QueryError::RateLimited {
                limit: self.config.max_per_sec,
            });
        }
        Ok(())
    }

    /// Prototype nesting ceiling
    pub fn check_depth(&self, prototype: &PrototypeNode) -> Result<(), QueryError> {
        // The root node itself is not a selection level
        let depth = prototype.depth().saturating_sub(1);
        if depth > self.config.max_depth {
            tracing::info!(depth, max = self.config.max_depth, "query too deep");
            return Err(QueryError::QueryTooDeep {
                depth,
                max: self.config.max_depth,
            });
        }
        Ok(())
    }

    /// Static cost ceiling: configured weights multiplied by a depth factor
    /// at each nesting level
    pub fn check_cost(&self, prototype: &PrototypeNode, kind: OperationKind) -> Result<(), QueryError> {
        let mut cost = if kind == OperationKind::Mutation {
            self.config.mutation_cost
        } else {
            0.0
        };
        cost += self.node_cost(prototype, 0);

        if cost > self.config.max_cost {
            tracing::info!(cost, max = self.config.max_cost, "query too costly");
            return Err(QueryError::QueryTooCostly {
                cost,
                max: self.config.max_cost,
            });
        }
        Ok(())
    }

    fn node_cost(&self, node: &PrototypeNode, depth: u32) -> f64 {
        let factor = self.config.depth_factor.powi(depth as i32);
        node.fields
            .iter()
            .map(|(_, shape)| match shape {
                FieldShape::Scalar(_) => self.config.scalar_cost * factor,
                FieldShape::Entity(child) | FieldShape::EntityList(child) => {
                    self.config.object_cost * factor + self.node_cost(child, depth + 1)
                }
                FieldShape::FragmentSpread(_) => 0.0,
            })
            .sum()
    }
}

fn current_second() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
