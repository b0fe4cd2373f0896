use super::catalog::ModelCatalog;
use crate::error::RoutingError;
use crate::health::{HealthMonitor, ModelStatus};
use std::collections::HashSet;
use std::sync::Arc;

/// Picks the model a request actually goes to.
///
/// The requested model wins whenever it is not `unavailable`; a degraded
/// model is still used, since slow-but-working beats failover churn.
/// Otherwise the model's static fallback chain is walked in declaration
/// order and the first entry that is not `unavailable` wins. No dynamic
/// re-ranking: identical health snapshots always produce identical answers.
pub struct FallbackResolver {
    catalog: Arc<ModelCatalog>,
    monitor: Arc<HealthMonitor>,
}

impl FallbackResolver {
    pub fn new(catalog: Arc<ModelCatalog>, monitor: Arc<HealthMonitor>) -> Self {
        Self { catalog, monitor }
    }

    pub fn resolve(&self, requested: &str) -> Result<String, RoutingError> {
        self.resolve_excluding(requested, &HashSet::new())
    }

    /// Resolve while treating `excluded` models as down. The automatic
    /// retry path uses this so a model that just failed is not chosen again
    /// within the same call.
    pub fn resolve_excluding(
        &self,
        requested: &str,
        excluded: &HashSet<String>,
    ) -> Result<String, RoutingError> {
        let descriptor = self
            .catalog
            .get(requested)
            .ok_or_else(|| RoutingError::UnknownModel(requested.to_string()))?;

        if self.eligible(requested, excluded) {
            return Ok(requested.to_string());
        }

        for alt in &descriptor.fallback {
            if !self.catalog.contains(alt) {
                tracing::debug!(model = requested, alt, "Skipping unregistered chain entry");
                continue;
            }
            if self.eligible(alt, excluded) {
                tracing::info!(requested, effective = alt.as_str(), "Falling back");
                return Ok(alt.clone());
            }
        }

        Err(RoutingError::NoModelAvailable {
            requested: requested.to_string(),
        })
    }

    fn eligible(&self, model: &str, excluded: &HashSet<String>) -> bool {
        if excluded.contains(model) {
            return false;
        }
        let status = self
            .monitor
            .status_of(model)
            .map_or(ModelStatus::Unknown, |r| r.status);
        status != ModelStatus::Unavailable
    }
}
