//! Agent loop configuration

use std::path::PathBuf;
use std::time::Duration;

use skillrun_core::AgentSettings;

/// Configuration for the agent loop
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Working directory named in the system prompt
    pub working_dir: PathBuf,
    /// Maximum model calls per invocation
    pub max_iterations: usize,
    /// Pause before every model call after the first
    pub iteration_delay: Duration,
    /// Durable history entries replayed into each request
    pub history_window: usize,
    /// Decline pending confirmations after this long
    pub approval_timeout: Option<Duration>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from_settings(&AgentSettings::default())
    }
}

impl AgentConfig {
    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_iterations: settings.max_iterations,
            iteration_delay: Duration::from_millis(settings.iteration_delay_ms),
            history_window: settings.history_window,
            approval_timeout: settings.approval_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_iteration_delay(mut self, delay: Duration) -> Self {
        self.iteration_delay = delay;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_approval_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.approval_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_iterations, 32);
        assert_eq!(config.iteration_delay, Duration::from_secs(1));
        assert_eq!(config.history_window, 4);
        assert!(config.approval_timeout.is_none());
    }

    #[test]
    fn test_agent_config_builder() {
        let config = AgentConfig::default()
            .with_max_iterations(3)
            .with_iteration_delay(Duration::ZERO)
            .with_approval_timeout(Some(Duration::from_secs(5)));

        assert_eq!(config.max_iterations, 3);
        assert!(config.iteration_delay.is_zero());
        assert_eq!(config.approval_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_from_settings() {
        let settings = AgentSettings {
            max_iterations: 8,
            iteration_delay_ms: 250,
            history_window: 2,
            approval_timeout_secs: Some(30),
            ..AgentSettings::default()
        };
        let config = AgentConfig::from_settings(&settings);
        assert_eq!(config.iteration_delay, Duration::from_millis(250));
        assert_eq!(config.history_window, 2);
        assert_eq!(config.approval_timeout, Some(Duration::from_secs(30)));
    }
}
