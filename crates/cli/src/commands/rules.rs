use super::load_rules;
use crate::Mode;
use colored::*;
use core_context::RequesterContext;
use core_protection::{Action, Permission, Rule, RuleSet};
use propguard_engine::ProtectedProperties;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub fn check(file: &Path, policy_file: Option<&Path>) -> anyhow::Result<()> {
    println!("{} {}", "Checking rules:".bold(), file.display());

    let rules = load_rules(file, policy_file)?;
    println!("  {} Sections: {}", "✓".green(), rules.len());
    println!("  {} Policy delegations: {}", "✓".green(), rules.delegations().len());

    for rule in rules.rules() {
        println!("  {} {}", "•".cyan(), rule.pattern_text().bold());
        for (action, permission) in rule.permissions().iter() {
            println!("      {:<7} {}", action, permission);
        }
    }

    let warnings = lint(&rules);
    for warning in &warnings {
        println!("  {} {}", "⚠".yellow(), warning);
    }

    println!();
    if rules.is_empty() {
        println!(
            "{} Rule file is valid but empty: every property is unrestricted",
            "⚠".yellow().bold()
        );
    } else if warnings.is_empty() {
        println!("{} Rule file is valid!", "✓".green().bold());
    } else {
        println!(
            "{} Rule file is valid with {} warning(s)",
            "⚠".yellow().bold(),
            warnings.len()
        );
    }

    Ok(())
}

/// Findings that load fine but are usually mistakes
pub fn lint(rules: &RuleSet) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (i, rule) in rules.rules().iter().enumerate() {
        let pattern = rule.pattern_text();
        if !seen.insert(pattern.trim()) {
            warnings.push(format!("Section {} ({:?}) repeats an earlier pattern", i + 1, pattern));
        }
        if grants_nothing(rule) {
            warnings.push(format!(
                "Section {} ({:?}) grants no action to any role",
                i + 1,
                pattern
            ));
        }
        if !pattern.starts_with('^') {
            warnings.push(format!(
                "Section {} ({:?}) is not anchored with '^' and matches anywhere in a name",
                i + 1,
                pattern
            ));
        }
    }

    warnings
}

fn grants_nothing(rule: &Rule) -> bool {
    rule.permissions()
        .iter()
        .all(|(_, p)| matches!(p, Permission::Roles(roles) if roles.is_empty()))
}

pub fn eval(
    file: &Path,
    policy_file: Option<&Path>,
    property: &str,
    action: &str,
    requester: &RequesterContext,
) -> anyhow::Result<()> {
    let rules = load_rules(file, policy_file)?;
    let allowed = rules.check(property, action, requester)?;

    let verdict = if allowed { "ALLOW".green().bold() } else { "DENY".red().bold() };
    println!("{} {} on {}", verdict, action, property);

    if action.parse::<Action>().is_err() {
        println!("  {} '{}' is not a known action", "⚠".yellow(), action);
    }
    for rule in rules.matching_rules(property) {
        println!("  {} matched {}", "•".cyan(), rule.pattern_text());
    }

    Ok(())
}

pub fn view(
    file: &Path,
    policy_file: Option<&Path>,
    properties: &Path,
    mode: Mode,
    requester: RequesterContext,
) -> anyhow::Result<()> {
    let rules = load_rules(file, policy_file)?;

    let content = std::fs::read_to_string(properties)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", properties.display(), e))?;
    let backing: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Properties must be a JSON object: {}", e))?;

    let action = match mode {
        Mode::Read => Action::Read,
        Mode::Create => Action::Create,
    };
    let total = backing.len();
    debug!(mode = %action, total, "building property view");
    let view = ProtectedProperties::new(requester, backing, Arc::new(rules), action)?;

    let visible: BTreeMap<&str, &serde_json::Value> = view.iter().collect();
    println!("{}", serde_json::to_string_pretty(&visible)?);
    eprintln!(
        "{} {} of {} properties visible in {} mode",
        "✓".green(),
        view.len(),
        total,
        action
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_protection::RuleSetLoader;

    #[test]
    fn test_lint_findings() {
        let rules = RuleSetLoader::new()
            .load_str(
                r#"
["^x_"]
create = "admin"
read = "admin"
update = "admin"
delete = "admin"

["^locked_"]
create = ""
read = []
update = ""
delete = ""

["foo"]
create = "admin"
read = "admin"
update = "admin"
delete = "admin"
"#,
            )
            .unwrap();

        let warnings = lint(&rules);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("grants no action"));
        assert!(warnings[1].contains("not anchored"));
    }
}
