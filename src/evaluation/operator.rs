//! Operator matcher table.
//!
//! Operators form a closed set. Rules store the operator identifier as text, so
//! resolving it goes through [`MatcherTable::lookup`], which reports unknown
//! identifiers instead of treating them as non-matches.

use regex::Regex;
use semver::Version;
use std::cmp::Ordering;
use std::collections::HashMap;

use super::error::{EvaluationError, EvaluationResult};
use super::model::TraitValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
    NotRegex,
    In,
    NotIn,
    SemverEqual,
    SemverGreaterThan,
    SemverLessThan,
}

impl Operator {
    pub const ALL: [Operator; 17] = [
        Operator::Equal,
        Operator::NotEqual,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqual,
        Operator::LessThan,
        Operator::LessThanOrEqual,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Regex,
        Operator::NotRegex,
        Operator::In,
        Operator::NotIn,
        Operator::SemverEqual,
        Operator::SemverGreaterThan,
        Operator::SemverLessThan,
    ];

    /// Wire identifier stored on rules.
    pub fn identifier(&self) -> &'static str {
        match self {
            Operator::Equal => "equal",
            Operator::NotEqual => "not_equal",
            Operator::GreaterThan => "greater_than",
            Operator::GreaterThanOrEqual => "greater_than_or_equal",
            Operator::LessThan => "less_than",
            Operator::LessThanOrEqual => "less_than_or_equal",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::Regex => "regex",
            Operator::NotRegex => "not_regex",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::SemverEqual => "semver_equal",
            Operator::SemverGreaterThan => "semver_greater_than",
            Operator::SemverLessThan => "semver_less_than",
        }
    }

    /// Checks that a rule value is usable with this operator: patterns must
    /// compile and versions must parse.
    pub fn validate(&self, rule_value: &TraitValue) -> EvaluationResult<()> {
        match self {
            Operator::Regex | Operator::NotRegex => self.compile(rule_value).map(|_| ()),
            Operator::SemverEqual | Operator::SemverGreaterThan | Operator::SemverLessThan => {
                self.rule_version(rule_value).map(|_| ())
            }
            _ => Ok(()),
        }
    }

    /// Applies the predicate to a trait value and the rule's value.
    ///
    /// Errors only when the rule value itself is unusable for this operator
    /// (a bad pattern or version).
    pub fn matches(&self, trait_value: &TraitValue, rule_value: &TraitValue) -> EvaluationResult<bool> {
        self.matches_with(trait_value, rule_value, None)
    }

    fn matches_with(
        &self,
        trait_value: &TraitValue,
        rule_value: &TraitValue,
        compiled: Option<&Regex>,
    ) -> EvaluationResult<bool> {
        let matched = match self {
            Operator::Equal => values_equal(trait_value, rule_value),
            Operator::NotEqual => !values_equal(trait_value, rule_value),
            Operator::GreaterThan => compare(trait_value, rule_value) == Some(Ordering::Greater),
            Operator::GreaterThanOrEqual => matches!(
                compare(trait_value, rule_value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::LessThan => compare(trait_value, rule_value) == Some(Ordering::Less),
            Operator::LessThanOrEqual => matches!(
                compare(trait_value, rule_value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Contains => trait_value.as_text().contains(&*rule_value.as_text()),
            Operator::NotContains => !trait_value.as_text().contains(&*rule_value.as_text()),
            Operator::StartsWith => trait_value.as_text().starts_with(&*rule_value.as_text()),
            Operator::EndsWith => trait_value.as_text().ends_with(&*rule_value.as_text()),
            Operator::Regex => self.is_match(trait_value, rule_value, compiled)?,
            Operator::NotRegex => !self.is_match(trait_value, rule_value, compiled)?,
            Operator::In => in_set(trait_value, rule_value),
            Operator::NotIn => !in_set(trait_value, rule_value),
            Operator::SemverEqual => self.compare_versions(trait_value, rule_value)? == Some(Ordering::Equal),
            Operator::SemverGreaterThan => {
                self.compare_versions(trait_value, rule_value)? == Some(Ordering::Greater)
            }
            Operator::SemverLessThan => {
                self.compare_versions(trait_value, rule_value)? == Some(Ordering::Less)
            }
        };
        Ok(matched)
    }

    fn is_match(
        &self,
        trait_value: &TraitValue,
        rule_value: &TraitValue,
        compiled: Option<&Regex>,
    ) -> EvaluationResult<bool> {
        let text = trait_value.as_text();
        match compiled {
            Some(pattern) => Ok(pattern.is_match(&text)),
            None => Ok(self.compile(rule_value)?.is_match(&text)),
        }
    }

    fn compile(&self, rule_value: &TraitValue) -> EvaluationResult<Regex> {
        Regex::new(&rule_value.as_text()).map_err(|e| self.invalid(rule_value, e.to_string()))
    }

    fn rule_version(&self, rule_value: &TraitValue) -> EvaluationResult<Version> {
        parse_version(&rule_value.as_text()).map_err(|e| self.invalid(rule_value, e.to_string()))
    }

    // None when the trait is not a version; that is user data, not a misconfigured rule.
    fn compare_versions(
        &self,
        trait_value: &TraitValue,
        rule_value: &TraitValue,
    ) -> EvaluationResult<Option<Ordering>> {
        let wanted = self.rule_version(rule_value)?;
        Ok(parse_version(&trait_value.as_text())
            .ok()
            .map(|actual| actual.cmp(&wanted)))
    }

    fn invalid(&self, rule_value: &TraitValue, message: String) -> EvaluationError {
        EvaluationError::InvalidRuleValue {
            operator: self.identifier(),
            value: rule_value.to_string(),
            message,
        }
    }
}

fn values_equal(a: &TraitValue, b: &TraitValue) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x == y,
        _ => a.as_text() == b.as_text(),
    }
}

fn compare(a: &TraitValue, b: &TraitValue) -> Option<Ordering> {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => Some(a.as_text().cmp(&b.as_text())),
    }
}

// Rule value is a comma separated list of members.
fn in_set(trait_value: &TraitValue, rule_value: &TraitValue) -> bool {
    rule_value
        .as_text()
        .split(',')
        .map(str::trim)
        .any(|member| values_equal(trait_value, &TraitValue::String(member.to_string())))
}

fn parse_version(raw: &str) -> Result<Version, semver::Error> {
    let raw = raw.trim();
    Version::parse(raw.strip_prefix('v').unwrap_or(raw))
}

/// Registry from operator identifier to predicate, plus the patterns of
/// prepared regex rules. Prepare rules while loading, then share read-only.
#[derive(Debug, Clone)]
pub struct MatcherTable {
    operators: HashMap<&'static str, Operator>,
    patterns: HashMap<String, Regex>,
}

impl MatcherTable {
    pub fn new() -> Self {
        let operators = Operator::ALL
            .iter()
            .map(|op| (op.identifier(), *op))
            .collect();
        Self {
            operators,
            patterns: HashMap::new(),
        }
    }

    pub fn lookup(&self, identifier: &str) -> EvaluationResult<Operator> {
        self.operators
            .get(identifier)
            .copied()
            .ok_or_else(|| EvaluationError::UnsupportedOperator {
                operator: identifier.to_string(),
            })
    }

    /// Resolves the operator and validates the rule value against it.
    /// Regex patterns are compiled here once and reused by [`MatcherTable::apply`].
    pub fn prepare(&mut self, identifier: &str, rule_value: &TraitValue) -> EvaluationResult<Operator> {
        let operator = self.lookup(identifier)?;
        match operator {
            Operator::Regex | Operator::NotRegex => {
                let source = rule_value.as_text().into_owned();
                if !self.patterns.contains_key(&source) {
                    let pattern = operator.compile(rule_value)?;
                    self.patterns.insert(source, pattern);
                }
            }
            _ => operator.validate(rule_value)?,
        }
        Ok(operator)
    }

    /// Applies a resolved operator, using the prepared pattern when there is one.
    pub fn apply(
        &self,
        operator: Operator,
        trait_value: &TraitValue,
        rule_value: &TraitValue,
    ) -> EvaluationResult<bool> {
        let compiled = match operator {
            Operator::Regex | Operator::NotRegex => self.patterns.get(&*rule_value.as_text()),
            _ => None,
        };
        operator.matches_with(trait_value, rule_value, compiled)
    }

    pub fn matches(
        &self,
        identifier: &str,
        trait_value: &TraitValue,
        rule_value: &TraitValue,
    ) -> EvaluationResult<bool> {
        self.apply(self.lookup(identifier)?, trait_value, rule_value)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.operators.keys().copied()
    }

    /// Number of compiled regex patterns held.
    pub fn prepared_patterns(&self) -> usize {
        self.patterns.len()
    }
}

impl Default for MatcherTable {
    fn default() -> Self {
        Self::new()
    }
}
