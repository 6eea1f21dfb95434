pub mod health;
pub mod retry;

pub use health::{ComponentHealth, HealthConfig, HealthMonitor, HealthReport, HealthStatus};
pub use retry::RetryPolicy;
