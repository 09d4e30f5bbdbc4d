//! Configuration for the control and event façades.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a mouse event listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Upper bound on how long the loop waits for native events before
    /// re-checking the running flag (milliseconds).
    pub poll_interval_ms: u64,
    /// Consume observed events instead of passing them through.
    pub capture: bool,
    /// Capacity of event channels built for this listener, such as the one
    /// behind a [`ChannelHandler`](crate::ChannelHandler).
    pub event_buffer: usize,
    /// Capacity of the handler-fault queue; faults beyond it are only logged.
    pub fault_buffer: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            capture: false,
            event_buffer: 1024,
            fault_buffer: 64,
        }
    }
}

impl ListenerConfig {
    pub fn poll_interval(&self) -> Duration {
        // A zero interval would turn the loop into a busy spin.
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Configuration for control backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Pause between the press and release halves of a click (milliseconds).
    /// Zero means no pause.
    pub click_delay_ms: u64,
}

impl ControlConfig {
    pub fn click_delay(&self) -> Option<Duration> {
        (self.click_delay_ms > 0).then(|| Duration::from_millis(self.click_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listener_config() {
        let config = ListenerConfig::default();
        assert_eq!(config.poll_interval_ms, 10);
        assert!(!config.capture);
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = ListenerConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ListenerConfig = serde_json::from_str(r#"{"capture": true}"#).unwrap();
        assert!(config.capture);
        assert_eq!(config.event_buffer, 1024);

        let control: ControlConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(control.click_delay(), None);
        let control = ControlConfig { click_delay_ms: 15 };
        assert_eq!(control.click_delay(), Some(Duration::from_millis(15)));
    }
}
