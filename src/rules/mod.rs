pub mod factory;

use crate::config::LineAction;
use regex::Regex;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug)]
pub enum RuleBuildError {
    /// Rule index and the action string that was not recognized.
    UnknownAction(usize, String),
    InvalidRegex {
        index: usize,
        pattern: String,
        source: regex::Error,
    },
    MissingReplacement(usize),
    /// The replacement references a capture group the pattern does not have.
    UnknownGroup { index: usize, group: String },
}

impl fmt::Display for RuleBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleBuildError::UnknownAction(i, a) => {
                write!(f, "rule #{}: unrecognized line action '{}'", i + 1, a)
            }
            RuleBuildError::InvalidRegex {
                index,
                pattern,
                source,
            } => write!(
                f,
                "rule #{}: invalid regex '{}': {}",
                index + 1,
                pattern,
                source
            ),
            RuleBuildError::MissingReplacement(i) => {
                write!(f, "rule #{}: modify rules need a replacement", i + 1)
            }
            RuleBuildError::UnknownGroup { index, group } => write!(
                f,
                "rule #{}: replacement references unknown group '{}' (use ${{1}} to put text right after a group number)",
                index + 1,
                group
            ),
        }
    }
}

impl std::error::Error for RuleBuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuleBuildError::InvalidRegex { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Action of a rule. Only `Modify` carries a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleAction {
    Keep,
    Delete,
    /// Replacement template. With a positive pattern it may reference capture
    /// groups (`$1`, `${name}`); without one it replaces the whole line as is.
    Modify(String),
}

impl RuleAction {
    pub fn line_action(&self) -> LineAction {
        match self {
            RuleAction::Keep => LineAction::Keep,
            RuleAction::Delete => LineAction::Delete,
            RuleAction::Modify(_) => LineAction::Modify,
        }
    }
}

/// An immutable matcher + action.
#[derive(Debug, Clone)]
pub struct Rule {
    action: RuleAction,
    positive: Option<Regex>,
    negative: Option<Regex>,
}

impl Rule {
    pub fn new(action: RuleAction) -> Self {
        Self {
            action,
            positive: None,
            negative: None,
        }
    }

    /// Only apply to lines matching `re`.
    pub fn matching(mut self, re: Regex) -> Self {
        self.positive = Some(re);
        self
    }

    /// Never apply to lines matching `re`.
    pub fn unless(mut self, re: Regex) -> Self {
        self.negative = Some(re);
        self
    }

    pub fn action(&self) -> &RuleAction {
        &self.action
    }

    pub fn positive(&self) -> Option<&Regex> {
        self.positive.as_ref()
    }

    pub fn negative(&self) -> Option<&Regex> {
        self.negative.as_ref()
    }

    pub fn applies_to(&self, line: &str) -> bool {
        if let Some(re) = &self.positive {
            if !re.is_match(line) {
                return false;
            }
        }
        if let Some(re) = &self.negative {
            if re.is_match(line) {
                return false;
            }
        }
        true
    }

    fn apply<'a>(&self, line: &'a str) -> Option<Cow<'a, str>> {
        match &self.action {
            RuleAction::Keep => Some(Cow::Borrowed(line)),
            RuleAction::Delete => None,
            RuleAction::Modify(replacement) => match &self.positive {
                Some(re) => Some(re.replace_all(line, replacement.as_str())),
                None => Some(Cow::Owned(replacement.clone())),
            },
        }
    }
}

/// Result of running the rule list over one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOutcome<'a> {
    pub action: LineAction,
    /// `None` when the line is deleted.
    pub line: Option<Cow<'a, str>>,
}

/// Apply the first rule that applies to `line`. Lines no rule applies to are
/// kept unchanged.
pub fn evaluate<'a>(line: &'a str, rules: &[Rule]) -> LineOutcome<'a> {
    match rules.iter().find(|r| r.applies_to(line)) {
        Some(rule) => LineOutcome {
            action: rule.action.line_action(),
            line: rule.apply(line),
        },
        None => LineOutcome {
            action: LineAction::Keep,
            line: Some(Cow::Borrowed(line)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re(p: &str) -> Regex {
        Regex::new(p).unwrap()
    }

    #[test]
    fn no_rules_keeps_line() {
        let out = evaluate("hello", &[]);
        assert_eq!(out.action, LineAction::Keep);
        assert_eq!(out.line.as_deref(), Some("hello"));
    }

    #[test]
    fn first_match_wins() {
        let rules = vec![
            Rule::new(RuleAction::Delete).matching(re("foo")),
            Rule::new(RuleAction::Modify("bar".into())).matching(re("foo")),
        ];
        let out = evaluate("foo", &rules);
        assert_eq!(out.action, LineAction::Delete);
        assert_eq!(out.line, None);
    }

    #[test]
    fn later_rule_applies_when_earlier_does_not() {
        let rules = vec![
            Rule::new(RuleAction::Delete).matching(re("^#")),
            Rule::new(RuleAction::Modify("X".into())).matching(re("a")),
        ];
        let out = evaluate("banana", &rules);
        assert_eq!(out.action, LineAction::Modify);
        assert_eq!(out.line.as_deref(), Some("bXnXnX"));
    }

    #[test]
    fn negative_pattern_blocks_rule() {
        let rules = vec![Rule::new(RuleAction::Delete)
            .matching(re("error"))
            .unless(re("keep-me"))];
        assert_eq!(evaluate("error here", &rules).action, LineAction::Delete);
        let out = evaluate("error keep-me", &rules);
        assert_eq!(out.action, LineAction::Keep);
        assert_eq!(out.line.as_deref(), Some("error keep-me"));
    }

    #[test]
    fn negative_only_rule() {
        let rules = vec![Rule::new(RuleAction::Delete).unless(re("INFO"))];
        assert_eq!(evaluate("DEBUG x", &rules).action, LineAction::Delete);
        assert_eq!(evaluate("INFO x", &rules).action, LineAction::Keep);
    }

    #[test]
    fn capture_group_substitution() {
        let rules = vec![
            Rule::new(RuleAction::Modify("$2".into())).matching(re(r"(.+)SKU=(.+)\s>>(.+)")),
        ];
        let out = evaluate("x SKU=ABC >>y", &rules);
        assert_eq!(out.action, LineAction::Modify);
        assert_eq!(out.line.as_deref(), Some("ABC"));
    }

    #[test]
    fn substitution_keeps_unmatched_text() {
        let rules = vec![Rule::new(RuleAction::Modify("${1}".into())).matching(re("SKU=(.+) >>"))];
        let out = evaluate("x SKU=ABC >>y", &rules);
        assert_eq!(out.line.as_deref(), Some("x ABCy"));
    }

    #[test]
    fn modify_without_pattern_is_literal() {
        let rules = vec![Rule::new(RuleAction::Modify("$1 literal".into()))];
        let out = evaluate("anything", &rules);
        assert_eq!(out.action, LineAction::Modify);
        assert_eq!(out.line.as_deref(), Some("$1 literal"));
    }

    #[test]
    fn modify_that_changes_nothing_still_counts_as_modify() {
        let rules = vec![Rule::new(RuleAction::Modify("$0".into())).matching(re("a"))];
        let out = evaluate("abc", &rules);
        assert_eq!(out.action, LineAction::Modify);
        assert_eq!(out.line.as_deref(), Some("abc"));
    }

    #[test]
    fn empty_line_is_evaluated() {
        let rules = vec![Rule::new(RuleAction::Delete).matching(re("^$"))];
        assert_eq!(evaluate("", &rules).action, LineAction::Delete);
    }
}
