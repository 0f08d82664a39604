//! Channel configuration for outcome delivery

/// Buffer sizing for the dispatcher → collector channel
///
/// When the collector falls behind, completions wait on the channel rather
/// than piling up in memory. Execution permits are released only after the
/// outcome is handed over, so a full buffer also throttles admission.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Outcome channel buffer size (executions -> collector)
    pub outcome_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            outcome_buffer: 1_024,
        }
    }
}

impl ChannelConfig {
    /// Set the outcome buffer size (minimum 1)
    pub fn with_outcome_buffer(mut self, size: usize) -> Self {
        self.outcome_buffer = size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_config_default() {
        let config = ChannelConfig::default();
        assert_eq!(config.outcome_buffer, 1_024);
    }

    #[test]
    fn test_channel_config_builder() {
        let config = ChannelConfig::default().with_outcome_buffer(16);
        assert_eq!(config.outcome_buffer, 16);
        assert_eq!(ChannelConfig::default().with_outcome_buffer(0).outcome_buffer, 1);
    }
}
