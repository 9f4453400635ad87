pub mod rules;

use anyhow::Result;
use app_utils::{build_loader, ProtectionConfig};
use core_context::RequesterContext;
use core_protection::RuleSet;
use std::path::{Path, PathBuf};

/// Requester assembled from command-line flags
pub fn requester(
    roles: Vec<String>,
    tenant: Option<String>,
    user: Option<String>,
    admin: bool,
) -> Result<RequesterContext> {
    let mut ctx = RequesterContext::new(roles).with_admin(admin);
    if let Some(tenant) = tenant {
        ctx = ctx.with_tenant(tenant)?;
    }
    if let Some(user) = user {
        ctx = ctx.with_user(user);
    }
    Ok(ctx)
}

/// Load `file` strictly, with an oracle when a policy file is given
pub fn load_rules(file: &Path, policy_file: Option<&Path>) -> Result<RuleSet> {
    let config = ProtectionConfig {
        property_protection_file: Some(file.to_path_buf()),
        policy_file: policy_file.map(PathBuf::from),
    };
    Ok(build_loader(&config)?.load(file)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const RULES: &str = r#"
["^x_"]
create = "admin"
read = "policy:x_reader"
update = "admin"
delete = "admin"
"#;

    fn file_with(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_rules_with_policy_file() {
        let rules = file_with(RULES);
        let policy = file_with("[rules]\nx_reader = \"role:reader\"\n");

        let rule_set = load_rules(rules.path(), Some(policy.path())).unwrap();
        let reader = requester(vec!["reader".to_string()], None, None, false).unwrap();
        let member = requester(vec!["member".to_string()], None, None, false).unwrap();
        assert!(rule_set.check("x_a", "read", &reader).unwrap());
        assert!(!rule_set.check("x_a", "read", &member).unwrap());
    }

    #[test]
    fn test_load_rules_policy_without_policy_file() {
        let rules = file_with(RULES);
        assert!(load_rules(rules.path(), None).is_err());
    }

    #[test]
    fn test_requester_rejects_empty_tenant() {
        assert!(requester(Vec::new(), Some(String::new()), None, false).is_err());
    }
}
