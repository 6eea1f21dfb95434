use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentHealth {
    Healthy,
    Degraded(String),  // reason
    Unhealthy(String), // reason
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub unhealthy_threshold: u32,
    pub recovery_threshold: u32,
    pub history_len: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            unhealthy_threshold: 3, // 3 consecutive failures = unhealthy
            recovery_threshold: 2,  // 2 consecutive successes = recovered
            history_len: 100,
        }
    }
}

#[derive(Debug)]
struct ComponentState {
    health: ComponentHealth,
    recent_checks: VecDeque<bool>,
    consecutive_failures: u32,
    consecutive_successes: u32,
}

impl ComponentState {
    fn new(history_len: usize) -> Self {
        Self {
            health: ComponentHealth::Healthy,
            recent_checks: VecDeque::with_capacity(history_len),
            consecutive_failures: 0,
            consecutive_successes: 0,
        }
    }
}

/// Turns individual pass/fail health checks into a debounced per-component status.
///
/// A single failed check only degrades a component; it becomes unhealthy after
/// `unhealthy_threshold` consecutive failures and recovers after `recovery_threshold`
/// consecutive successes.
pub struct HealthMonitor {
    config: HealthConfig,
    components: RwLock<HashMap<String, ComponentState>>,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            components: RwLock::new(HashMap::new()),
        }
    }

    pub async fn record_health_check(&self, component: &str, result: Result<(), String>) {
        let mut components = self.components.write().await;
        let state = components
            .entry(component.to_string())
            .or_insert_with(|| ComponentState::new(self.config.history_len));

        let success = result.is_ok();
        state.recent_checks.push_back(success);
        if state.recent_checks.len() > self.config.history_len {
            state.recent_checks.pop_front();
        }

        if success {
            state.consecutive_successes += 1;
            state.consecutive_failures = 0;
        } else {
            state.consecutive_failures += 1;
            state.consecutive_successes = 0;
        }

        let new_health = match result {
            Err(reason) if state.consecutive_failures >= self.config.unhealthy_threshold => {
                ComponentHealth::Unhealthy(reason)
            }
            Err(reason) => ComponentHealth::Degraded(reason),
            Ok(()) => match &state.health {
                ComponentHealth::Unhealthy(_)
                    if state.consecutive_successes < self.config.recovery_threshold =>
                {
                    state.health.clone()
                }
                _ => ComponentHealth::Healthy,
            },
        };

        if std::mem::discriminant(&new_health) != std::mem::discriminant(&state.health) {
            tracing::info!(
                component,
                from = ?state.health,
                to = ?new_health,
                "Component health changed"
            );
        }
        state.health = new_health;
    }

    /// Drop state for a component that is no longer registered.
    pub async fn forget(&self, component: &str) {
        self.components.write().await.remove(component);
    }

    pub async fn get_overall_health(&self) -> HealthStatus {
        let components = self.components.read().await;

        let mut has_degraded = false;
        for state in components.values() {
            match &state.health {
                ComponentHealth::Unhealthy(_) => return HealthStatus::Unhealthy,
                ComponentHealth::Degraded(_) => has_degraded = true,
                ComponentHealth::Healthy => {}
            }
        }

        if has_degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub async fn get_component_health(&self, component: &str) -> Option<ComponentHealth> {
        let components = self.components.read().await;
        components.get(component).map(|state| state.health.clone())
    }

    pub async fn get_component_history(&self, component: &str) -> Vec<bool> {
        let components = self.components.read().await;
        components
            .get(component)
            .map(|state| state.recent_checks.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn get_all_component_status(&self) -> BTreeMap<String, ComponentHealth> {
        let components = self.components.read().await;
        components
            .iter()
            .map(|(name, state)| (name.clone(), state.health.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub components: BTreeMap<String, ComponentHealth>,
    pub timestamp: DateTime<Utc>,
    pub uptime: Duration,
}

impl HealthReport {
    pub async fn generate(monitor: &HealthMonitor, start_time: Instant) -> Self {
        Self {
            overall_status: monitor.get_overall_health().await,
            components: monitor.get_all_component_status().await,
            timestamp: Utc::now(),
            uptime: start_time.elapsed(),
        }
    }
}
