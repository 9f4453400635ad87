//! Integration tests for the authorization proxy chain

use core_context::RequesterContext;
use core_protection::{ProtectionError, RuleSetLoader};
use propguard_engine::{
    EngineError, Gateway, Image, ImageRepository, ListQuery, ProtectedImage, Visibility,
};

const RULES: &str = r#"
["^x_owner_"]
create = "admin,member"
read = "admin,member"
update = "admin,member"
delete = "admin"

["^x_admin_"]
create = "admin"
read = "admin"
update = "admin"
delete = "admin"

["^os_"]
create = "admin,member"
read = "admin,member,reader"
update = "admin"
delete = "admin"
"#;

fn gateway() -> Gateway {
    Gateway::with_rules(RuleSetLoader::new().load_str(RULES).unwrap())
}

fn member(tenant: &str) -> RequesterContext {
    RequesterContext::new(["member"]).with_tenant(tenant).unwrap()
}

fn admin(tenant: &str) -> RequesterContext {
    RequesterContext::new(["admin"]).with_tenant(tenant).unwrap()
}

fn seed(gateway: &Gateway) {
    let repo = gateway.image_repo(&admin("t1"));
    let image = Image::new("img-1")
        .with_owner("t1")
        .with_property("x_owner_note", "hello")
        .with_property("x_admin_secret", "s3cr3t")
        .with_property("os_distro", "debian");
    repo.add(repo.new_image(image).unwrap()).unwrap();
}

#[test]
fn test_get_returns_read_mode_view() {
    let gateway = gateway();
    seed(&gateway);

    let image = gateway.image_repo(&member("t1")).get("img-1").unwrap();
    let keys: Vec<_> = image.properties().keys().collect();
    assert_eq!(keys, vec!["os_distro", "x_owner_note"]);
    assert!(matches!(
        image.properties().get("x_admin_secret"),
        Err(ProtectionError::KeyNotFound(_))
    ));
}

#[test]
fn test_add_drops_properties_requester_cannot_create() {
    let gateway = gateway();
    let repo = gateway.image_repo(&member("t1"));
    let image = Image::new("img-2")
        .with_owner("t1")
        .with_property("x_owner_note", "kept")
        .with_property("x_admin_secret", "dropped")
        .with_property("unmatched", "dropped");
    repo.add(repo.new_image(image).unwrap()).unwrap();

    let stored = gateway.image_repo(&admin("t1")).get("img-2").unwrap();
    let keys: Vec<_> = stored.properties().keys().collect();
    assert_eq!(keys, vec!["x_owner_note"]);
}

#[test]
fn test_add_rechecks_create_mode() {
    let gateway = gateway();
    let admin_repo = gateway.image_repo(&admin("t1"));
    let prepared: ProtectedImage = admin_repo
        .new_image(Image::new("img-3").with_owner("t1").with_property("x_admin_secret", "s"))
        .unwrap();

    // A proxy built for an admin does not let a member smuggle properties in.
    gateway.image_repo(&member("t1")).add(prepared).unwrap();
    let stored = admin_repo.get("img-3").unwrap();
    assert!(stored.properties().is_empty());
}

#[test]
fn test_save_preserves_hidden_properties() {
    let gateway = gateway();
    seed(&gateway);

    let repo = gateway.image_repo(&member("t1"));
    let mut image = repo.get("img-1").unwrap();
    assert!(image.properties_mut().set("x_owner_note", "updated".to_string()).unwrap());
    assert!(!image.properties_mut().set("os_distro", "arch".to_string()).unwrap());
    assert!(!image.properties_mut().delete("x_owner_note").unwrap());
    repo.save(image).unwrap();

    let stored = gateway.image_repo(&admin("t1")).get("img-1").unwrap();
    assert_eq!(stored.properties().get("x_owner_note").unwrap(), "updated");
    assert_eq!(stored.properties().get("x_admin_secret").unwrap(), "s3cr3t");
    assert_eq!(stored.properties().get("os_distro").unwrap(), "debian");
}

#[test]
fn test_save_rejects_proxy_from_another_requester() {
    let gateway = gateway();
    seed(&gateway);

    let mut image = gateway.image_repo(&admin("t1")).get("img-1").unwrap();
    assert!(image.properties_mut().set("x_admin_secret", "leaked".to_string()).unwrap());

    // The member holds no update grant on x_admin_ and cannot borrow the
    // admin's proxy to persist one.
    let member_repo = gateway.image_repo(&member("t1"));
    assert!(matches!(member_repo.save(image), Err(EngineError::Forbidden(_))));

    let stored = gateway.image_repo(&admin("t1")).get("img-1").unwrap();
    assert_eq!(stored.properties().get("x_admin_secret").unwrap(), "s3cr3t");
}

#[test]
fn test_save_rejects_retargeted_proxy() {
    let gateway = gateway();
    seed(&gateway);
    let admin_repo = gateway.image_repo(&admin("t1"));
    admin_repo
        .add(
            admin_repo
                .new_image(Image::new("img-2").with_owner("t1").with_property("x_admin_secret", "two"))
                .unwrap(),
        )
        .unwrap();

    let repo = gateway.image_repo(&member("t1"));
    let mut image = repo.get("img-1").unwrap();
    image.image_mut().id = "img-2".to_string();
    assert!(matches!(repo.save(image), Err(EngineError::Forbidden(_))));

    let stored = admin_repo.get("img-2").unwrap();
    assert_eq!(stored.properties().get("x_admin_secret").unwrap(), "two");
}

#[test]
fn test_save_rejects_create_mode_proxy() {
    let gateway = gateway();
    seed(&gateway);

    let repo = gateway.image_repo(&member("t1"));
    let replacement = repo
        .new_image(Image::new("img-1").with_owner("t1").with_property("x_owner_note", "new"))
        .unwrap();
    assert!(matches!(repo.save(replacement), Err(EngineError::Forbidden(_))));

    let stored = gateway.image_repo(&admin("t1")).get("img-1").unwrap();
    assert_eq!(stored.properties().get("x_admin_secret").unwrap(), "s3cr3t");
}

#[test]
fn test_other_tenant_cannot_see_or_save() {
    let gateway = gateway();
    seed(&gateway);

    let err = gateway.image_repo(&member("t2")).get("img-1").unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    // Make it public: visible, still not mutable by t2.
    let owner_repo = gateway.image_repo(&admin("t1"));
    let mut image = owner_repo.get("img-1").unwrap();
    image.image_mut().visibility = Visibility::Public;
    owner_repo.save(image).unwrap();

    let t2_repo = gateway.image_repo(&member("t2"));
    let image = t2_repo.get("img-1").unwrap();
    assert!(matches!(t2_repo.save(image), Err(EngineError::Forbidden(_))));
}

#[test]
fn test_list_wraps_every_image() {
    let gateway = gateway();
    seed(&gateway);
    let repo = gateway.image_repo(&RequesterContext::new(["reader"]).with_admin(true));

    let images = repo.list(&ListQuery::new()).unwrap();
    assert_eq!(images.len(), 1);
    let keys: Vec<_> = images[0].properties().keys().collect();
    assert_eq!(keys, vec!["os_distro"]);
}

#[test]
fn test_reload_applies_to_new_requests_only() {
    let gateway = gateway();
    seed(&gateway);

    let before = gateway.image_repo(&member("t1"));
    gateway.rules().replace(
        RuleSetLoader::new()
            .load_str(
                r#"
[".*"]
create = "admin"
read = "admin"
update = "admin"
delete = "admin"
"#,
            )
            .unwrap(),
    );

    assert_eq!(before.get("img-1").unwrap().properties().len(), 2);
    assert!(gateway
        .image_repo(&member("t1"))
        .get("img-1")
        .unwrap()
        .properties()
        .is_empty());
}

#[test]
fn test_serialized_view_omits_hidden_properties() {
    let gateway = gateway();
    seed(&gateway);

    let image = gateway.image_repo(&member("t1")).get("img-1").unwrap();
    let json = serde_json::to_value(image.to_view()).unwrap();
    let extra = json["extra_properties"].as_object().unwrap();
    assert!(extra.contains_key("x_owner_note"));
    assert!(!extra.contains_key("x_admin_secret"));
    assert_eq!(json["owner"], "t1");
}
