use super::types::{ChatRequest, ChatResponse, ProviderFailure, ProviderKind};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type DispatchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ChatResponse, ProviderFailure>> + Send + 'a>>;

/// One backend, normalized.
///
/// An adapter sends a single chat request to its backend and returns either a
/// normalized [`ChatResponse`] or a [`ProviderFailure`] whose kind is one of
/// the fixed taxonomy. Adapters own their connection pools; a pool is scoped
/// to one provider kind and never shared across kinds.
pub trait ProviderAdapter: Send + Sync {
    /// Which backend this adapter fronts.
    fn kind(&self) -> ProviderKind;

    fn dispatch<'a>(&'a self, request: &'a ChatRequest) -> DispatchFuture<'a>;

    /// Lightweight synthetic request used by the health monitor. Adapters may
    /// override this with a cheaper endpoint where the backend offers one.
    fn probe<'a>(&'a self, model: &'a str) -> DispatchFuture<'a> {
        Box::pin(async move {
            let request = ChatRequest::probe(model);
            self.dispatch(&request).await
        })
    }
}

/// The set of adapters the core routes through, keyed by provider kind.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSet")
            .field("kinds", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AdapterSet {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn insert(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.insert(adapter);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(&kind)
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.adapters.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
