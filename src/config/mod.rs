mod schema;

pub use schema::{
    Config, DispatchConfig, HealthConfig, ModelConfig, PersistenceConfig, ProvidersConfig,
    SessionConfig,
};
