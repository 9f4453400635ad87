//! Integration tests for configuration parsing and rule-set bootstrap

use app_utils::config::{ENV_POLICY_FILE, ENV_PROPERTY_PROTECTION_FILE};
use app_utils::{build_rule_set, ConfigParser, Error, ProtectionConfig, TomlParser, YamlParser};
use core_context::RequesterContext;
use core_protection::{ConfigurationError, ProtectionError};
use std::io::Write;
use std::path::PathBuf;
use tempfile::{Builder, NamedTempFile};

const RULES: &str = r#"
["^x_"]
create = "admin"
read = "policy:x_reader"
update = "admin"
delete = "admin"
"#;

const POLICIES: &str = r#"
[rules]
x_reader = "role:reader or is_admin:True"
"#;

fn write(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_toml_and_yaml_agree() {
    let toml = TomlParser
        .parse("property_protection_file = \"/etc/propguard/rules.toml\"\n")
        .unwrap();
    let yaml = YamlParser
        .parse("property_protection_file: /etc/propguard/rules.toml\n")
        .unwrap();
    assert_eq!(toml, yaml);
    assert_eq!(toml.policy_file, None);
}

#[test]
fn test_unknown_key_rejected() {
    assert!(matches!(
        TomlParser.parse("strict = false\n"),
        Err(Error::TomlParseError(_))
    ));
    assert!(matches!(
        YamlParser.parse("strict: false\n"),
        Err(Error::YamlParseError(_))
    ));
}

#[test]
fn test_empty_documents() {
    assert_eq!(TomlParser.parse("").unwrap(), ProtectionConfig::default());
    assert_eq!(YamlParser.parse("").unwrap(), ProtectionConfig::default());
}

#[test]
fn test_env_overrides() {
    let config = ProtectionConfig {
        property_protection_file: Some(PathBuf::from("from-file.toml")),
        policy_file: Some(PathBuf::from("policy.toml")),
    }
    .with_overrides(|name| match name {
        ENV_PROPERTY_PROTECTION_FILE => Some("from-env.toml".to_string()),
        ENV_POLICY_FILE => Some(String::new()),
        _ => None,
    });

    assert_eq!(config.property_protection_file, Some(PathBuf::from("from-env.toml")));
    assert_eq!(config.policy_file, Some(PathBuf::from("policy.toml")));
}

#[test]
fn test_unset_rule_file_allows_everything() {
    let rules = build_rule_set(&ProtectionConfig::default()).unwrap();
    assert!(rules.is_empty());
    assert!(rules
        .check("anything", "delete", &RequesterContext::anonymous())
        .unwrap());
}

#[test]
fn test_configured_missing_rule_file_fails() {
    let config = ProtectionConfig {
        property_protection_file: Some(PathBuf::from("/nonexistent/propguard/rules.toml")),
        policy_file: None,
    };
    assert!(matches!(
        build_rule_set(&config),
        Err(Error::Protection(ProtectionError::Configuration(
            ConfigurationError::FileNotFound { .. }
        )))
    ));
}

#[test]
fn test_bootstrap_from_yaml_config() {
    let rules_file = write(".toml", RULES);
    let policy_file = write(".toml", POLICIES);
    let config_file = write(
        ".yaml",
        &format!(
            "property_protection_file: {}\npolicy_file: {}\n",
            rules_file.path().display(),
            policy_file.path().display()
        ),
    );

    let config = ProtectionConfig::from_path(config_file.path()).unwrap();
    let rules = build_rule_set(&config).unwrap();

    assert!(rules.check("x_a", "read", &RequesterContext::new(["reader"])).unwrap());
    assert!(rules
        .check("x_a", "read", &RequesterContext::anonymous().with_admin(true))
        .unwrap());
    assert!(!rules.check("x_a", "read", &RequesterContext::new(["member"])).unwrap());
}

#[test]
fn test_policy_rule_without_policy_file_fails() {
    let rules_file = write(".toml", RULES);
    let config = ProtectionConfig {
        property_protection_file: Some(rules_file.path().to_path_buf()),
        policy_file: None,
    };
    assert!(matches!(
        build_rule_set(&config),
        Err(Error::Protection(ProtectionError::Configuration(
            ConfigurationError::OracleRequired { .. }
        )))
    ));
}
