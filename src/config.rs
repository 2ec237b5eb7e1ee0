use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::errors::BridgeError;
use crate::interop::{ExecutionContext, TaskQueue, WaitBound};

/// Label of the process-wide default task queue
pub const DEFAULT_QUEUE_LABEL: &str = "scriptbridge.default-queue";

/// Global name of the script-side helper object installed by the bootstrap library
pub const DEFAULT_SCRIPT_HELPER: &str = "ScriptBridge";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub channel: ChannelConfig,

    #[serde(default)]
    pub invocation: InvocationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Queue used by channels created without an explicit execution context
    #[serde(default = "default_queue_label")]
    pub default_queue_label: String,

    #[serde(default = "default_script_helper")]
    pub script_helper: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationConfig {
    #[serde(default = "default_wait_slice_ms")]
    pub wait_slice_ms: u64,

    /// Slices a blocking call waits before giving up with an empty result
    #[serde(default = "default_max_wait_slices")]
    pub max_wait_slices: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            default_queue_label: default_queue_label(),
            script_helper: default_script_helper(),
        }
    }
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            wait_slice_ms: default_wait_slice_ms(),
            max_wait_slices: default_max_wait_slices(),
        }
    }
}

fn default_queue_label() -> String { DEFAULT_QUEUE_LABEL.to_string() }
fn default_script_helper() -> String { DEFAULT_SCRIPT_HELPER.to_string() }
fn default_wait_slice_ms() -> u64 { 1000 }
fn default_max_wait_slices() -> u32 { 3 }

impl InvocationConfig {
    pub fn wait_bound(&self) -> WaitBound {
        WaitBound {
            slice: Duration::from_millis(self.wait_slice_ms.max(1)),
            max_slices: self.max_wait_slices.max(1),
        }
    }
}

impl ChannelConfig {
    /// Shared task queue named by `default_queue_label`
    pub fn default_context(&self) -> ExecutionContext {
        ExecutionContext::Queue(TaskQueue::shared(&self.default_queue_label))
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let content = fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, BridgeError> {
        toml::from_str(content)
            .map_err(|e| BridgeError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Generate default configuration file content
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate config"))
    }

    pub fn save(&self, path: &Path) -> Result<(), BridgeError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BridgeError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| BridgeError::Config(format!("Failed to write config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.channel.default_queue_label, DEFAULT_QUEUE_LABEL);
        assert_eq!(config.channel.script_helper, "ScriptBridge");
        assert_eq!(config.invocation.wait_bound(), WaitBound::default());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[invocation]
wait_slice_ms = 250
"#;

        let config = BridgeConfig::parse(toml).unwrap();
        assert_eq!(config.invocation.wait_slice_ms, 250);
        assert_eq!(config.invocation.max_wait_slices, 3);
        assert_eq!(config.channel, ChannelConfig::default());
    }

    #[test]
    fn test_parse_rejects_bad_types() {
        let err = BridgeConfig::parse("[invocation]\nmax_wait_slices = \"many\"\n").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_generate_default_round_trips() {
        let text = BridgeConfig::generate_default();
        assert_eq!(BridgeConfig::parse(&text).unwrap(), BridgeConfig::default());
    }
}
