use crate::config::ModelConfig;
use crate::error::RoutingError;
use crate::provider::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

// ─── Descriptors ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub supports_tools: bool,
    pub supports_vision: bool,
    pub max_context_tokens: u32,
}

/// Static description of one routable model: who serves it, what it can do,
/// and where to go when it is down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub provider: ProviderKind,
    pub capabilities: ModelCapabilities,
    /// Ordered preference of alternates. Never contains the model itself.
    pub fallback: Vec<String>,
}

impl From<&ModelConfig> for ModelDescriptor {
    fn from(config: &ModelConfig) -> Self {
        Self {
            id: config.id.clone(),
            provider: config.provider,
            capabilities: ModelCapabilities {
                supports_tools: config.supports_tools,
                supports_vision: config.supports_vision,
                max_context_tokens: config.max_context_tokens,
            },
            fallback: config.fallback.clone(),
        }
    }
}

// ─── Catalog ────────────────────────────────────────────────────────────────

/// Registry of known models. Registration validates the fallback chain:
/// no self-reference, no duplicate entries, and no cycle through the
/// already-registered graph.
#[derive(Default)]
pub struct ModelCatalog {
    models: RwLock<HashMap<String, Arc<ModelDescriptor>>>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, descriptor: ModelDescriptor) -> Result<(), RoutingError> {
        if descriptor.fallback.iter().any(|alt| *alt == descriptor.id) {
            return Err(RoutingError::InvalidFallbackChain {
                model: descriptor.id,
                reason: "chain references the model itself".into(),
            });
        }
        let mut seen = HashSet::new();
        for alt in &descriptor.fallback {
            if !seen.insert(alt.as_str()) {
                return Err(RoutingError::InvalidFallbackChain {
                    model: descriptor.id,
                    reason: format!("duplicate chain entry {alt}"),
                });
            }
        }

        let mut models = self.models.write().expect("catalog lock poisoned");
        if Self::creates_cycle(&models, &descriptor) {
            return Err(RoutingError::InvalidFallbackChain {
                model: descriptor.id,
                reason: "chain creates a cycle".into(),
            });
        }
        models.insert(descriptor.id.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Depth-first walk over the fallback graph as it would look with
    /// `candidate` inserted.
    fn creates_cycle(
        models: &HashMap<String, Arc<ModelDescriptor>>,
        candidate: &ModelDescriptor,
    ) -> bool {
        fn visit(
            id: &str,
            models: &HashMap<String, Arc<ModelDescriptor>>,
            candidate: &ModelDescriptor,
            path: &mut HashSet<String>,
        ) -> bool {
            if !path.insert(id.to_string()) {
                return true;
            }
            let chain: &[String] = if id == candidate.id {
                &candidate.fallback
            } else {
                models.get(id).map_or(&[], |d| d.fallback.as_slice())
            };
            for next in chain {
                if visit(next, models, candidate, path) {
                    return true;
                }
            }
            path.remove(id);
            false
        }

        let mut path = HashSet::new();
        visit(&candidate.id, models, candidate, &mut path)
    }

    pub fn get(&self, id: &str) -> Option<Arc<ModelDescriptor>> {
        let models = self.models.read().expect("catalog lock poisoned");
        models.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        let models = self.models.read().expect("catalog lock poisoned");
        models.contains_key(id)
    }

    /// All registered (model id, provider kind) pairs, sorted by id.
    pub fn routes(&self) -> Vec<(String, ProviderKind)> {
        let models = self.models.read().expect("catalog lock poisoned");
        let mut routes: Vec<(String, ProviderKind)> = models
            .values()
            .map(|d| (d.id.clone(), d.provider))
            .collect();
        routes.sort_by(|a, b| a.0.cmp(&b.0));
        routes
    }

    pub fn len(&self) -> usize {
        let models = self.models.read().expect("catalog lock poisoned");
        models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
