use super::dedup::{self, Novelty};
use super::registry::{CreatedSession, SessionCore, SessionRegistry, SessionSlot};
use super::store::TurnStore;
use super::types::{SessionSnapshot, Turn, TurnRole};
use crate::config::Config;
use crate::error::{RoutingError, SessionError, SwitchboardError};
use crate::health::{CallOutcome, HealthMonitor, ModelHealthRecord, ModelStatus};
use crate::provider::{
    AdapterSet, ChatMessage, ChatRequest, ChatResponse, ProviderFailure, ProviderFailureKind,
};
use crate::routing::{FallbackResolver, ModelCatalog, ModelDescriptor};
use arc_swap::ArcSwap;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The orchestrator: composes registry, dedup, isolation boundary, health
/// monitor, resolver, and adapters into the request/response cycle, and is
/// the only mutator of session state.
///
/// Sessions serialize their own operations on the slot's async mutex while
/// distinct sessions proceed fully in parallel; the health table is the one
/// structure shared across sessions, written only through the monitor.
pub struct SessionManager {
    config: Arc<ArcSwap<Config>>,
    registry: Arc<SessionRegistry>,
    catalog: Arc<ModelCatalog>,
    monitor: Arc<HealthMonitor>,
    resolver: FallbackResolver,
    adapters: AdapterSet,
    store: Option<Arc<dyn TurnStore>>,
}

impl SessionManager {
    pub fn new(
        config: Config,
        adapters: AdapterSet,
        store: Option<Arc<dyn TurnStore>>,
    ) -> Result<Self, SwitchboardError> {
        config.validate()?;

        let registry = Arc::new(SessionRegistry::new(config.session.clone()));
        let catalog = Arc::new(ModelCatalog::new());
        let monitor = Arc::new(HealthMonitor::new(config.health.clone()));
        for model in &config.models {
            catalog.register(ModelDescriptor::from(model))?;
            monitor.register(&model.id);
        }
        let resolver = FallbackResolver::new(Arc::clone(&catalog), Arc::clone(&monitor));

        Ok(Self {
            config: Arc::new(ArcSwap::new(Arc::new(config))),
            registry,
            catalog,
            monitor,
            resolver,
            adapters,
            store,
        })
    }

    /// Spawn the background tasks: the active probe timer and the idle
    /// sweep. Callers hold the handles for shutdown.
    pub fn start(&self) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            Arc::clone(&self.monitor)
                .spawn_probe_loop(self.adapters.clone(), self.catalog.routes()),
            Arc::clone(&self.registry).spawn_idle_sweeper(),
        ]
    }

    /// Hot-swap the configuration used for dispatch parameters.
    pub fn update_config(&self, new_config: Arc<Config>) {
        self.config.store(new_config);
    }

    // ── Public operations ────────────────────────────────────────────────

    pub fn create_session(&self) -> Result<CreatedSession, SwitchboardError> {
        let config = self.config.load();
        let created = self.registry.create(&config.default_model)?;
        Ok(created)
    }

    pub fn close_session(&self, session_id: &str) -> Result<(), SwitchboardError> {
        self.registry.close(session_id)?;
        Ok(())
    }

    /// Deliver one user message: resolve the session, suppress duplicates,
    /// pick a live model, dispatch with a bounded timeout, and append the
    /// outcome to the session's log. A retryable provider failure gets one
    /// automatic retry against the next model the resolver offers; after
    /// that the failure is recorded as a `failed` turn and surfaced.
    pub async fn send_message(
        &self,
        session_id: &str,
        requested_model: &str,
        content: &str,
        idempotency_token: Option<&str>,
    ) -> Result<Turn, SwitchboardError> {
        let slot = self.registry.resolve(session_id)?;
        let mut core = slot.core.lock().await;
        slot.touch();

        let fingerprint = dedup::fingerprint(session_id, content, idempotency_token);
        if let Novelty::Duplicate { prior_seq } = core.dedup.check(&fingerprint) {
            tracing::debug!(
                session = session_id,
                prior_seq,
                "Duplicate message suppressed before dispatch"
            );
            return Err(SessionError::DuplicateTurn { prior_seq }.into());
        }

        let effective = match self.resolver.resolve(requested_model) {
            Ok(model) => model,
            Err(err @ RoutingError::NoModelAvailable { .. }) => {
                self.record_failed_turn(&slot, &mut core, content, &fingerprint, &err.to_string())?;
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        let (max_attempts, temperature, max_tokens) = {
            let config = self.config.load();
            (
                1 + config.dispatch.fallback_retries,
                config.default_temperature,
                config.dispatch.max_tokens,
            )
        };
        let mut messages = context_messages(core.boundary.read_log());
        messages.push(ChatMessage::user(content));

        let mut excluded: HashSet<String> = HashSet::new();
        let mut model = effective;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let request = ChatRequest {
                model: model.clone(),
                system_prompt: None,
                messages: messages.clone(),
                temperature,
                max_tokens,
            };

            match self.dispatch(&request).await {
                Ok((response, latency)) => {
                    self.monitor
                        .report_outcome(&model, CallOutcome::success(latency));
                    return self.record_exchange(
                        &slot,
                        &mut core,
                        content,
                        &fingerprint,
                        &response,
                        &model,
                    );
                }
                Err(failure) => {
                    self.monitor
                        .report_outcome(&model, CallOutcome::failure(failure.kind));
                    tracing::warn!(
                        session = session_id,
                        model = model.as_str(),
                        attempt,
                        kind = %failure.kind,
                        "Provider dispatch failed: {}",
                        failure.message
                    );
                    excluded.insert(model.clone());

                    if attempt < max_attempts && failure.is_retryable() {
                        match self.resolver.resolve_excluding(requested_model, &excluded) {
                            Ok(next) => {
                                tracing::info!(
                                    session = session_id,
                                    from = model.as_str(),
                                    to = next.as_str(),
                                    "Retrying once against fallback model"
                                );
                                model = next;
                                continue;
                            }
                            Err(_) => {
                                tracing::debug!(session = session_id, "No alternate model left");
                            }
                        }
                    }

                    self.record_failed_turn(
                        &slot,
                        &mut core,
                        content,
                        &fingerprint,
                        &failure.to_string(),
                    )?;
                    return Err(failure.into());
                }
            }
        }
    }

    /// Point this session, and only this session, at a different model.
    /// The target must be registered and not currently unavailable. An
    /// audit marker turn records the change.
    pub async fn switch_active_model(
        &self,
        session_id: &str,
        model_id: &str,
    ) -> Result<(), SwitchboardError> {
        let slot = self.registry.resolve(session_id)?;
        if !self.catalog.contains(model_id) {
            return Err(RoutingError::UnknownModel(model_id.to_string()).into());
        }
        let status = self
            .monitor
            .status_of(model_id)
            .map_or(ModelStatus::Unknown, |r| r.status);
        if status == ModelStatus::Unavailable {
            return Err(RoutingError::ModelUnavailable {
                model: model_id.to_string(),
            }
            .into());
        }

        let mut core = slot.core.lock().await;
        let from = core.boundary.active_model().to_string();
        if from == model_id {
            return Ok(());
        }
        let marker = core.boundary.draft_model_switch(&from, model_id);
        let turn = core.boundary.append_turn(marker)?.clone();
        core.boundary.set_active_model(model_id);
        slot.touch();
        self.persist(session_id, std::slice::from_ref(&turn));
        tracing::info!(session = session_id, from = from.as_str(), to = model_id, "Model switched");
        Ok(())
    }

    /// Read-only projection of the session's log.
    pub async fn get_history(&self, session_id: &str) -> Result<Vec<Turn>, SwitchboardError> {
        let slot = self.registry.resolve(session_id)?;
        let core = slot.core.lock().await;
        Ok(core.boundary.read_log().to_vec())
    }

    pub async fn session_snapshot(
        &self,
        session_id: &str,
    ) -> Result<SessionSnapshot, SwitchboardError> {
        let slot = self.registry.resolve(session_id)?;
        Ok(slot.snapshot().await)
    }

    /// Current health table, for status indicators.
    pub fn list_model_health(&self) -> BTreeMap<String, ModelHealthRecord> {
        self.monitor.snapshot()
    }

    /// One immediate probe pass over the whole catalog, outside the timer.
    pub async fn probe_all(&self) {
        self.monitor
            .probe_sweep(&self.adapters, &self.catalog.routes())
            .await;
    }

    pub fn verify_boundary(
        &self,
        session_id: &str,
        boundary_token: &str,
    ) -> Result<(), SwitchboardError> {
        self.registry.verify_boundary(session_id, boundary_token)?;
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────

    async fn dispatch(
        &self,
        request: &ChatRequest,
    ) -> Result<(ChatResponse, Duration), ProviderFailure> {
        let descriptor = self.catalog.get(&request.model).ok_or_else(|| {
            // Catalog entries are validated at registration; this only
            // triggers if a model was referenced without being registered.
            ProviderFailure::new(
                crate::provider::ProviderKind::Ollama,
                ProviderFailureKind::InvalidResponse,
                format!("model {} has no descriptor", request.model),
            )
        })?;
        let adapter = self.adapters.get(descriptor.provider).ok_or_else(|| {
            ProviderFailure::new(
                descriptor.provider,
                ProviderFailureKind::Unreachable,
                "no adapter configured for provider",
            )
        })?;

        let timeout_secs = self.config.load().dispatch.request_timeout_secs;
        let started = Instant::now();
        match tokio::time::timeout(Duration::from_secs(timeout_secs), adapter.dispatch(request))
            .await
        {
            Ok(Ok(response)) => Ok((response, started.elapsed())),
            Ok(Err(failure)) => Err(failure),
            Err(_) => Err(ProviderFailure::timeout(descriptor.provider, timeout_secs)),
        }
    }

    fn record_exchange(
        &self,
        slot: &Arc<SessionSlot>,
        core: &mut SessionCore,
        content: &str,
        fingerprint: &str,
        response: &ChatResponse,
        effective_model: &str,
    ) -> Result<Turn, SwitchboardError> {
        let user_draft = core.boundary.draft_user(content, fingerprint);
        let user_turn = core.boundary.append_turn(user_draft)?.clone();

        let assistant_draft = core
            .boundary
            .draft_assistant(&response.text, effective_model);
        let assistant_turn = core.boundary.append_turn(assistant_draft)?.clone();

        core.dedup.record(fingerprint, user_turn.seq);
        slot.touch();
        self.persist(&slot.id, &[user_turn, assistant_turn.clone()]);
        Ok(assistant_turn)
    }

    fn record_failed_turn(
        &self,
        slot: &Arc<SessionSlot>,
        core: &mut SessionCore,
        content: &str,
        fingerprint: &str,
        error: &str,
    ) -> Result<(), SwitchboardError> {
        let draft = core.boundary.draft_failed(content, fingerprint, error);
        let turn = core.boundary.append_turn(draft)?.clone();
        core.dedup.record(fingerprint, turn.seq);
        slot.touch();
        self.persist(&slot.id, std::slice::from_ref(&turn));
        Ok(())
    }

    /// Durability is best-effort: the in-memory log is authoritative and a
    /// store error must not unwind an exchange that already happened.
    fn persist(&self, session_id: &str, turns: &[Turn]) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        for turn in turns {
            if let Err(e) = store.append(session_id, turn) {
                tracing::warn!(session = session_id, seq = turn.seq, "Turn persist failed: {e}");
            }
        }
    }
}

/// Project the log into provider messages: delivered user messages and
/// assistant responses, in order. Failure and switch markers stay local.
fn context_messages(log: &[Turn]) -> Vec<ChatMessage> {
    log.iter()
        .filter_map(|turn| match turn.role {
            TurnRole::User => Some(ChatMessage::user(turn.content.clone())),
            TurnRole::Assistant => Some(ChatMessage::assistant(turn.content.clone())),
            TurnRole::Failed | TurnRole::ModelSwitch => None,
        })
        .collect()
}
