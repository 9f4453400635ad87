//! Protected Image Flow Example
//!
//! This example walks through property protection in an image registry:
//!
//! 1. Load a rule file describing who may touch which image properties
//! 2. Add an image through the protected repository
//! 3. Read and edit it as requesters holding different roles
//!
//! Run with: cargo run --example protected_image_flow

use propguard::engine::{Image, ImageRepository};
use propguard::{Gateway, RequesterContext, RuleSetLoader};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("propguard - Protected Image Flow");
    println!("--------------------------------");
    println!();

    // -------------------------------------------------------------------------
    // Step 1: Load Rules
    // -------------------------------------------------------------------------
    // Each section is a regular expression over property names. Every
    // matching section is consulted; any one of them may grant.

    let rules = RuleSetLoader::new().load_str(
        r#"
["^x_billing_"]
create = "admin"
read = "admin,billing"
update = "admin"
delete = "admin"

["^os_"]
create = "admin,member"
read = "admin,member,billing"
update = "admin,member"
delete = "admin"
"#,
    )?;
    println!("Loaded {} rule sections", rules.len());
    println!();

    let gateway = Gateway::with_rules(rules);
    let admin = RequesterContext::new(["admin"]).with_tenant("acme")?;
    let member = RequesterContext::new(["member"]).with_tenant("acme")?;
    let billing = RequesterContext::new(["billing"]).with_tenant("acme")?;

    // -------------------------------------------------------------------------
    // Step 2: Create an Image
    // -------------------------------------------------------------------------
    // The repository wraps the new image in create mode: properties the
    // requester may not create are dropped before anything is stored.

    let repo = gateway.image_repo(&admin);
    let image = Image::new("img-42")
        .with_owner("acme")
        .with_property("os_distro", "debian")
        .with_property("x_billing_code", "PRJ-7");
    repo.add(repo.new_image(image)?)?;

    // -------------------------------------------------------------------------
    // Step 3: Read as Different Requesters
    // -------------------------------------------------------------------------

    for (label, requester) in [("admin", &admin), ("member", &member), ("billing", &billing)] {
        let image = gateway.image_repo(requester).get("img-42")?;
        let keys: Vec<_> = image.properties().keys().collect();
        println!("  {:<8} sees {:?}", label, keys);
    }
    println!();

    // -------------------------------------------------------------------------
    // Step 4: Edit as a Member
    // -------------------------------------------------------------------------
    // Writes the member is not entitled to are dropped silently; hidden
    // properties survive the save untouched.

    let member_repo = gateway.image_repo(&member);
    let mut image = member_repo.get("img-42")?;
    let updated = image.properties_mut().set("os_distro", "ubuntu".to_string())?;
    let smuggled = image.properties_mut().set("x_billing_code", "FREE".to_string())?;
    println!("  member update os_distro applied: {}", updated);
    println!("  member write x_billing_code applied: {}", smuggled);
    member_repo.save(image)?;

    let stored = gateway.image_repo(&admin).get("img-42")?;
    println!("  stored view for admin: {:?}", stored.to_view().extra_properties);

    println!();
    println!("--------------------------------");
    println!("Protected image flow completed successfully.");

    Ok(())
}
