//! # app-utils
//!
//! Service-side plumbing around the rule engine.
//!
//! This crate provides non-core features:
//! - Protection configuration parsing (TOML or YAML)
//! - Environment overrides
//! - Rule-set bootstrap from configuration

#![forbid(unsafe_code)]

pub mod error;

pub mod config {
    //! Protection configuration documents

    use crate::error::{Error, Result};
    use serde::{Deserialize, Serialize};
    use std::path::{Path, PathBuf};

    /// Environment variable overriding `property_protection_file`
    pub const ENV_PROPERTY_PROTECTION_FILE: &str = "PROPGUARD_PROPERTY_PROTECTION_FILE";

    /// Environment variable overriding `policy_file`
    pub const ENV_POLICY_FILE: &str = "PROPGUARD_POLICY_FILE";

    /// Where the protection rules and policy rules live
    ///
    /// An unset `property_protection_file` disables property protection.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct ProtectionConfig {
        /// Rule file; `None` means every property is unrestricted
        #[serde(default)]
        pub property_protection_file: Option<PathBuf>,
        /// Policy file backing `policy:` delegations
        #[serde(default)]
        pub policy_file: Option<PathBuf>,
    }

    impl ProtectionConfig {
        /// Read a configuration file, choosing the parser by extension
        /// (`.yaml` / `.yml` for YAML, anything else TOML)
        ///
        /// # Errors
        ///
        /// I/O and parse errors.
        pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref();
            let input = std::fs::read_to_string(path).map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;
            parser_for(path).parse(&input)
        }

        /// Apply `PROPGUARD_*` environment overrides
        #[must_use]
        pub fn with_env_overrides(self) -> Self {
            self.with_overrides(|name| std::env::var(name).ok())
        }

        /// Apply overrides from `lookup`; empty values are ignored
        #[must_use]
        pub fn with_overrides<F>(mut self, lookup: F) -> Self
        where
            F: Fn(&str) -> Option<String>,
        {
            let path = |name: &str| lookup(name).filter(|v| !v.is_empty()).map(PathBuf::from);
            if let Some(file) = path(ENV_PROPERTY_PROTECTION_FILE) {
                self.property_protection_file = Some(file);
            }
            if let Some(file) = path(ENV_POLICY_FILE) {
                self.policy_file = Some(file);
            }
            self
        }
    }

    /// Trait for configuration parsers (OCP - extensible to other formats)
    pub trait ConfigParser {
        /// Parse a configuration from a string
        fn parse(&self, input: &str) -> Result<ProtectionConfig>;
    }

    /// TOML parser implementation
    pub struct TomlParser;

    impl ConfigParser for TomlParser {
        fn parse(&self, input: &str) -> Result<ProtectionConfig> {
            toml::from_str(input).map_err(|e| Error::TomlParseError(e.to_string()))
        }
    }

    /// YAML parser implementation
    pub struct YamlParser;

    impl ConfigParser for YamlParser {
        fn parse(&self, input: &str) -> Result<ProtectionConfig> {
            // An empty YAML document is null, not an empty mapping.
            if input.trim().is_empty() {
                return Ok(ProtectionConfig::default());
            }
            serde_yaml::from_str(input).map_err(|e| Error::YamlParseError(e.to_string()))
        }
    }

    /// Parser matching the file extension of `path`
    #[must_use]
    pub fn parser_for(path: &Path) -> Box<dyn ConfigParser> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Box::new(YamlParser),
            _ => Box::new(TomlParser),
        }
    }
}

pub mod bootstrap {
    //! Building the process rule set from configuration

    use crate::config::ProtectionConfig;
    use crate::error::Result;
    use core_protection::{PolicyOracle, RuleExprOracle, RuleSet, RuleSetLoader, SharedRuleSet};
    use std::sync::Arc;
    use tracing::info;

    /// Loader for `config`, backed by the policy file when one is configured
    ///
    /// # Errors
    ///
    /// Policy file I/O and parse errors.
    pub fn build_loader(config: &ProtectionConfig) -> Result<RuleSetLoader> {
        let loader = RuleSetLoader::new();
        match &config.policy_file {
            Some(path) => {
                let oracle: Arc<dyn PolicyOracle> = Arc::new(RuleExprOracle::load(path)?);
                Ok(loader.with_oracle(oracle))
            }
            None => Ok(loader),
        }
    }

    /// Rule set described by `config`
    ///
    /// No rule file configured yields an empty rule set, which allows
    /// every property operation.
    ///
    /// # Errors
    ///
    /// Any rule file or policy file load error. A configured rule file that
    /// does not exist is an error.
    pub fn build_rule_set(config: &ProtectionConfig) -> Result<RuleSet> {
        let Some(path) = &config.property_protection_file else {
            info!("no property protection file configured; properties are unrestricted");
            return Ok(RuleSet::empty());
        };
        Ok(build_loader(config)?.load(path)?)
    }

    /// Reloadable handle over [`build_rule_set`]
    ///
    /// # Errors
    ///
    /// See [`build_rule_set`].
    pub fn build_shared_rule_set(config: &ProtectionConfig) -> Result<SharedRuleSet> {
        build_rule_set(config).map(SharedRuleSet::new)
    }
}

/// Re-export commonly used types
pub use bootstrap::{build_loader, build_rule_set, build_shared_rule_set};
pub use config::{ConfigParser, ProtectionConfig, TomlParser, YamlParser};
pub use error::{Error, Result};
