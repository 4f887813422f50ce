use crate::config::RuleConfig;
use crate::rules::{Rule, RuleAction, RuleBuildError};
use regex::Regex;

/// Build a rule from its config. `index` is the rule's position in the rule
/// list and only used for error messages.
pub fn build_rule(index: usize, config: &RuleConfig) -> Result<Rule, RuleBuildError> {
    let action = match config.action.trim().to_ascii_lowercase().as_str() {
        "keep" | "maintain" => RuleAction::Keep,
        "delete" => RuleAction::Delete,
        "modify" => {
            let replacement = config
                .replacement
                .clone()
                .ok_or(RuleBuildError::MissingReplacement(index))?;
            RuleAction::Modify(replacement)
        }
        _ => return Err(RuleBuildError::UnknownAction(index, config.action.clone())),
    };

    let mut rule = Rule::new(action);
    if let Some(pattern) = non_empty(&config.positive) {
        let re = compile(index, pattern)?;
        if let RuleAction::Modify(template) = rule.action() {
            check_groups(index, &re, template)?;
        }
        rule = rule.matching(re);
    }
    if let Some(pattern) = non_empty(&config.negative) {
        rule = rule.unless(compile(index, pattern)?);
    }
    Ok(rule)
}

/// Build every rule in order, stopping at the first invalid one.
pub fn build_rules(configs: &[RuleConfig]) -> Result<Vec<Rule>, RuleBuildError> {
    configs
        .iter()
        .enumerate()
        .map(|(i, c)| build_rule(i, c))
        .collect()
}

fn non_empty(pattern: &Option<String>) -> Option<&str> {
    pattern.as_deref().filter(|p| !p.is_empty())
}

fn compile(index: usize, pattern: &str) -> Result<Regex, RuleBuildError> {
    Regex::new(pattern).map_err(|source| RuleBuildError::InvalidRegex {
        index,
        pattern: pattern.to_string(),
        source,
    })
}

/// Group names referenced by a replacement template, using the regex crate's
/// syntax: `$$` is a literal dollar, `${name}` is braced, and a bare `$name`
/// takes the longest run of `[0-9A-Za-z_]`, so `$1_id` names group `1_id`.
fn group_references(template: &str) -> Vec<&str> {
    let mut refs = Vec::new();
    let mut rest = template;
    while let Some(i) = rest.find('$') {
        rest = &rest[i + 1..];
        if let Some(after) = rest.strip_prefix('$') {
            rest = after;
            continue;
        }
        if let Some(inner) = rest.strip_prefix('{') {
            if let Some(end) = inner.find('}') {
                refs.push(&inner[..end]);
                rest = &inner[end + 1..];
            }
            continue;
        }
        let len = rest
            .find(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
            .unwrap_or(rest.len());
        refs.push(&rest[..len]);
        rest = &rest[len..];
    }
    refs.retain(|r| !r.is_empty());
    refs
}

fn check_groups(index: usize, re: &Regex, template: &str) -> Result<(), RuleBuildError> {
    for group in group_references(template) {
        let known = match group.parse::<usize>() {
            Ok(n) => n < re.captures_len(),
            Err(_) => re.capture_names().flatten().any(|name| name == group),
        };
        if !known {
            return Err(RuleBuildError::UnknownGroup {
                index,
                group: group.to_string(),
            });
        }
    }
    Ok(())
}
