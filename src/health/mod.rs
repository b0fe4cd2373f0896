pub mod monitor;
pub mod record;

pub use monitor::{CallOutcome, HealthMonitor};
pub use record::{ModelHealthRecord, ModelStatus, RollingStats};
