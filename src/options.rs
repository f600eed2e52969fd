//! Options for constructing a [`Provider`](crate::Provider).

use std::collections::BTreeMap;
use std::time::Duration;

use crate::legacy::LegacyProviderTable;

/// Environment variable that restores the legacy preview behavior.
pub const LEGACY_PREVIEW_ENV: &str = "PULUMI_LEGACY_PROVIDER_PREVIEW";

/// Options controlling a provider handle.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Echo inputs instead of calling the provider for every preview create or update.
    ///
    /// Default: false.
    pub disable_provider_preview: bool,

    /// When configuration is unknown, preview creates and updates echo their
    /// inputs instead of returning empty outputs.
    ///
    /// Default: false.
    pub legacy_preview: bool,

    /// Runtime options passed to a spawned plugin as `PULUMI_RUNTIME_<NAME>`.
    pub runtime_options: BTreeMap<String, serde_json::Value>,

    /// JSON configuration passed to a spawned plugin as `PULUMI_CONFIG`.
    pub json_config: Option<String>,

    /// Rules for providers that misreport unimplemented methods.
    pub legacy_providers: LegacyProviderTable,

    /// How long to wait for a spawned plugin to report its port.
    ///
    /// Default: 10 seconds.
    pub dial_timeout: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            disable_provider_preview: false,
            legacy_preview: false,
            runtime_options: BTreeMap::new(),
            json_config: None,
            legacy_providers: LegacyProviderTable::default(),
            dial_timeout: Duration::from_secs(10),
        }
    }
}

impl ProviderOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create default options, with toggles read from the environment.
    pub fn from_env() -> Self {
        let legacy_preview = std::env::var(LEGACY_PREVIEW_ENV)
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        Self::default().with_legacy_preview(legacy_preview)
    }

    /// Set whether provider previews are disabled.
    pub fn with_disable_provider_preview(mut self, disable: bool) -> Self {
        self.disable_provider_preview = disable;
        self
    }

    /// Set whether the legacy preview behavior is used.
    pub fn with_legacy_preview(mut self, legacy: bool) -> Self {
        self.legacy_preview = legacy;
        self
    }

    /// Add a runtime option.
    pub fn with_runtime_option(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.runtime_options.insert(name.into(), value.into());
        self
    }

    /// Set the JSON configuration for a spawned plugin.
    pub fn with_json_config(mut self, config: impl Into<String>) -> Self {
        self.json_config = Some(config.into());
        self
    }

    /// Replace the legacy provider table.
    pub fn with_legacy_providers(mut self, table: LegacyProviderTable) -> Self {
        self.legacy_providers = table;
        self
    }

    /// Set the dial timeout.
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ProviderOptions::new();
        assert!(!opts.disable_provider_preview);
        assert!(!opts.legacy_preview);
        assert_eq!(opts.legacy_providers.len(), 2);
        assert_eq!(opts.dial_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_truthy() {
        assert!(is_truthy("1"));
        assert!(is_truthy("TRUE"));
        assert!(is_truthy("true"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("yes"));
    }

    #[test]
    fn test_builder() {
        let opts = ProviderOptions::new()
            .with_runtime_option("typescript", true)
            .with_json_config(r#"{"region":"us-west-2"}"#)
            .with_dial_timeout(Duration::from_secs(1));
        assert_eq!(opts.runtime_options["typescript"], serde_json::Value::Bool(true));
        assert!(opts.json_config.is_some());
    }
}
