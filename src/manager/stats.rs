use crate::component::ComponentStats;
use crate::pipeline::PipelineStats;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregated view refreshed by the manager's statistics loop.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ManagerStats {
    pub pipeline: PipelineStats,
    /// Sum of every producer's self-reported `processed` count.
    pub collected: u64,
    pub producers: BTreeMap<String, ComponentStats>,
    pub transforms: BTreeMap<String, ComponentStats>,
    pub sinks: BTreeMap<String, ComponentStats>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ManagerStats {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
