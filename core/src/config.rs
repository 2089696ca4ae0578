//! Configuration for hosts that build states from files or the environment
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, `EMBER_CONFIG_PATH`, or `ember.toml` if present)
//! 3. `EMBER_*` environment variables, e.g. `EMBER_LIMITS__RECURSION_LIMIT=300`
//!    or `EMBER_CAPABILITIES__MODULES=math,json`
//!
//! A `.env` file in the working directory is loaded first, so its entries
//! behave like environment variables.

use crate::capability::{Builtin, BuiltinGroup, CapabilityPolicy, CapabilitySet, StdModule};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default guest call depth
pub const DEFAULT_RECURSION_LIMIT: usize = 400;

/// Default stack for the execution thread (16 MiB)
pub const DEFAULT_STACK_SIZE: usize = 16 * 1024 * 1024;

const DEFAULT_CONFIG_FILE: &str = "ember.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmberConfig {
    pub capabilities: CapabilitiesConfig,
    pub limits: LimitsConfig,
}

/// Which capabilities a configured state starts with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitiesConfig {
    pub modules: Vec<StdModule>,
    pub builtins: Vec<Builtin>,
    pub builtin_groups: Vec<BuiltinGroup>,
    pub all_modules: bool,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        let policy = CapabilityPolicy::default();
        Self {
            modules: policy.modules,
            builtins: policy.builtins,
            builtin_groups: Vec::new(),
            all_modules: false,
        }
    }
}

impl CapabilitiesConfig {
    pub fn to_set(&self) -> CapabilitySet {
        let mut set = CapabilityPolicy {
            modules: self.modules.clone(),
            builtins: self.builtins.clone(),
        }
        .to_set();
        if self.all_modules {
            set.enable_all_modules();
        }
        for group in &self.builtin_groups {
            set.enable_builtin_group(*group);
        }
        set
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum guest call depth before `RecursionError`
    pub recursion_limit: usize,
    /// Stack size of the execution thread in bytes; 0 runs on the caller
    pub stack_size: usize,
    /// Timeout applied by hosts that want one by default (the CLI does)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_timeout_ms: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            stack_size: DEFAULT_STACK_SIZE,
            default_timeout_ms: None,
        }
    }
}

impl LimitsConfig {
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }
}

impl EmberConfig {
    pub fn builder() -> EmberConfigBuilder {
        EmberConfigBuilder::default()
    }

    /// Load from the default locations and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::builder().build()
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[derive(Debug, Default)]
pub struct EmberConfigBuilder {
    config_path: Option<PathBuf>,
    skip_env: bool,
}

impl EmberConfigBuilder {
    /// Explicit config file; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Ignore `.env` and `EMBER_*` variables
    pub fn skip_env(mut self, skip: bool) -> Self {
        self.skip_env = skip;
        self
    }

    pub fn build(self) -> Result<EmberConfig, config::ConfigError> {
        if !self.skip_env {
            dotenvy::dotenv().ok();
        }

        let path = self.config_path.or_else(|| {
            if self.skip_env {
                None
            } else {
                std::env::var_os("EMBER_CONFIG_PATH").map(PathBuf::from)
            }
        });

        let mut builder = config::Config::builder();
        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(
                config::File::with_name(DEFAULT_CONFIG_FILE)
                    .format(config::FileFormat::Toml)
                    .required(false),
            ),
        };

        if !self.skip_env {
            builder = builder.add_source(
                config::Environment::with_prefix("EMBER")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("capabilities.modules")
                    .with_list_parse_key("capabilities.builtins")
                    .with_list_parse_key("capabilities.builtin_groups")
                    .try_parsing(true),
            );
        }

        let config: EmberConfig = builder.build()?.try_deserialize()?;
        tracing::debug!(?config, "loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let config = EmberConfig::builder().skip_env(true).build().unwrap();
        assert_eq!(config, EmberConfig::default());
        assert_eq!(config.limits.recursion_limit, DEFAULT_RECURSION_LIMIT);
        assert_eq!(config.limits.default_timeout(), None);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("ember-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ember.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[capabilities]\nmodules = [\"time\"]\nbuiltin_groups = [\"execution\"]\n\n[limits]\nrecursion_limit = 50\ndefault_timeout_ms = 250"
        )
        .unwrap();

        let config = EmberConfig::builder()
            .config_path(Some(path))
            .skip_env(true)
            .build()
            .unwrap();

        assert_eq!(config.capabilities.modules, vec![StdModule::Time]);
        assert_eq!(config.limits.recursion_limit, 50);
        assert_eq!(config.limits.stack_size, DEFAULT_STACK_SIZE);
        assert_eq!(
            config.limits.default_timeout(),
            Some(Duration::from_millis(250))
        );

        let caps = config.capabilities.to_set();
        assert!(caps.is_module_enabled(StdModule::Time));
        assert!(!caps.is_module_enabled(StdModule::Math));
        assert!(caps.is_builtin_enabled(Builtin::Eval));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = EmberConfig::builder()
            .config_path(Some(PathBuf::from("/nonexistent/ember.toml")))
            .skip_env(true)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_renders_as_toml() {
        let rendered = EmberConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[capabilities]"));
        assert!(rendered.contains("recursion_limit = 400"));
    }
}
