#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod credentials;
pub mod error;
pub mod health;
pub mod provider;
pub mod routing;
pub mod session;

pub use config::Config;
pub use credentials::{CredentialStore, EnvCredentialStore, Secret};
pub use error::{
    ConfigError, CredentialError, Result, RoutingError, SessionError, SwitchboardError,
};
pub use health::{CallOutcome, HealthMonitor, ModelHealthRecord, ModelStatus};
pub use provider::{
    AdapterSet, ChatMessage, ChatRequest, ChatResponse, ProviderAdapter, ProviderFailure,
    ProviderFailureKind, ProviderKind,
};
pub use routing::{FallbackResolver, ModelCatalog, ModelDescriptor};
pub use session::{
    CreatedSession, JsonlTurnStore, SessionManager, SessionRegistry, SessionSnapshot, Turn,
    TurnRole, TurnStore,
};
