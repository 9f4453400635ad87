//! Integration tests for ProtectedProperties

use core_context::RequesterContext;
use core_protection::{
    Action, OracleError, PolicyOracle, PolicyTarget, PropertyAuthorizer, ProtectionError,
    RuleSet, RuleSetLoader,
};
use propguard_engine::ProtectedProperties;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

fn x_rules() -> Arc<dyn PropertyAuthorizer> {
    Arc::new(
        RuleSetLoader::new()
            .load_str(
                r#"
["^x_.*$"]
create = "admin"
read = "admin,member"
update = "admin"
delete = "admin"
"#,
            )
            .unwrap(),
    )
}

#[test]
fn test_member_set_on_new_key_is_noop() {
    let mut props = ProtectedProperties::new(
        RequesterContext::new(["member"]),
        BTreeMap::<String, String>::new(),
        x_rules(),
        Action::Read,
    )
    .unwrap();

    assert!(!props.set("x_note", "v".to_string()).unwrap());
    assert!(props.is_empty());
    assert!(props.into_inner().is_empty());
}

#[test]
fn test_read_mode_round_trip() {
    let backing: HashMap<String, u32> = [("x_a".to_string(), 1), ("b".to_string(), 2)]
        .into_iter()
        .collect();
    let props = ProtectedProperties::new(
        RequesterContext::new(["member"]),
        backing,
        x_rules(),
        Action::Read,
    )
    .unwrap();

    assert_eq!(props.iter().collect::<Vec<_>>(), vec![("x_a", &1u32)]);
    assert!(matches!(props.get("b"), Err(ProtectionError::KeyNotFound(_))));
    assert_eq!(props.into_inner().len(), 2);
}

#[test]
fn test_empty_rule_set_is_transparent() {
    let mut props = ProtectedProperties::new(
        RequesterContext::anonymous(),
        BTreeMap::from([("anything".to_string(), "1".to_string())]),
        Arc::new(RuleSet::empty()),
        Action::Read,
    )
    .unwrap();

    assert_eq!(props.get("anything").unwrap(), "1");
    assert!(props.set("new", "2".to_string()).unwrap());
    assert!(props.delete("anything").unwrap());
    assert_eq!(props.keys().collect::<Vec<_>>(), vec!["new"]);
}

struct FailingOracle;

impl PolicyOracle for FailingOracle {
    fn enforce(
        &self,
        _requester: &RequesterContext,
        _rule_name: &str,
        _target: &PolicyTarget,
    ) -> core::result::Result<bool, OracleError> {
        Err(OracleError::Unavailable("policy service down".into()))
    }

    fn load_rules(&self, _rules: BTreeMap<String, String>) -> core::result::Result<(), OracleError> {
        Ok(())
    }
}

#[test]
fn test_oracle_failure_aborts_construction() {
    let rules = RuleSetLoader::new()
        .with_oracle(Arc::new(FailingOracle))
        .load_str(
            r#"
["^x_"]
create = "admin"
read = "policy:x_reader"
update = "admin"
delete = "admin"
"#,
        )
        .unwrap();

    let err = ProtectedProperties::new(
        RequesterContext::new(["admin"]),
        BTreeMap::from([("x_a".to_string(), "1".to_string())]),
        Arc::new(rules),
        Action::Read,
    )
    .unwrap_err();
    assert!(matches!(err, ProtectionError::Oracle(OracleError::Unavailable(_))));
}

proptest! {
    /// A key hidden from the requester is always written under `create`
    #[test]
    fn prop_hidden_key_write_uses_create(can_create in any::<bool>(), value in "[a-z]{0,8}") {
        let create = if can_create { "member" } else { "" };
        let source = format!(
            "[\"^wo_\"]\ncreate = \"{}\"\nread = \"\"\nupdate = \"member\"\ndelete = \"\"\n",
            create
        );
        let authorizer: Arc<dyn PropertyAuthorizer> =
            Arc::new(RuleSetLoader::new().load_str(&source).unwrap());

        let mut props = ProtectedProperties::new(
            RequesterContext::new(["member"]),
            BTreeMap::from([("wo_key".to_string(), "old".to_string())]),
            authorizer,
            Action::Read,
        )
        .unwrap();

        prop_assert_eq!(props.set("wo_key", value.clone()).unwrap(), can_create);
        let expected = if can_create { value } else { "old".to_string() };
        prop_assert_eq!(&props.into_inner()["wo_key"], &expected);
    }
}
