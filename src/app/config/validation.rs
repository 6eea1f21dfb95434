use super::{ConfigError, MAX_QUEUE_CAPACITY, MAX_WORKER_COUNT, PipelineConfig};

impl PipelineConfig {
    /// Reject values that `with_defaults` cannot repair.
    ///
    /// Zero counts and durations are treated as "unset" and are filled in at construction, so
    /// this only fails for values that are present but meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "Queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::InvalidConfig(format!(
                "Queue capacity ({}) must not exceed {MAX_QUEUE_CAPACITY}",
                self.queue_capacity
            )));
        }

        if self.worker_count == 0 {
            return Err(ConfigError::InvalidConfig(
                "Worker count must be greater than 0".to_string(),
            ));
        }

        if self.worker_count > MAX_WORKER_COUNT {
            return Err(ConfigError::InvalidConfig(format!(
                "Worker count ({}) must not exceed {MAX_WORKER_COUNT}",
                self.worker_count
            )));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.flush_interval.is_zero() || self.process_timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Flush interval and process timeout must be greater than 0".to_string(),
            ));
        }

        if self.health_check_interval.is_zero() || self.stats_interval.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Health check and stats intervals must be greater than 0".to_string(),
            ));
        }

        if !self.saturation_threshold.is_finite()
            || self.saturation_threshold <= 0.0
            || self.saturation_threshold > 1.0
        {
            return Err(ConfigError::InvalidConfig(format!(
                "Saturation threshold ({}) must be within (0, 1]",
                self.saturation_threshold
            )));
        }

        Ok(())
    }
}
