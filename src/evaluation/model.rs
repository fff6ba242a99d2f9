use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

// TRAITS

/// A single trait value supplied by the caller or stored on a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraitValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl TraitValue {
    /// Numeric view of the value. Strings count when they parse as a finite
    /// number, so words like "NaN" or "inf" stay text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TraitValue::Number(n) => Some(*n),
            TraitValue::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            TraitValue::Bool(_) => None,
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            TraitValue::String(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }
}

impl fmt::Display for TraitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraitValue::Bool(b) => write!(f, "{}", b),
            TraitValue::Number(n) => write!(f, "{}", n),
            TraitValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for TraitValue {
    fn from(value: &str) -> Self {
        TraitValue::String(value.to_string())
    }
}

impl From<String> for TraitValue {
    fn from(value: String) -> Self {
        TraitValue::String(value)
    }
}

impl From<f64> for TraitValue {
    fn from(value: f64) -> Self {
        TraitValue::Number(value)
    }
}

impl From<i64> for TraitValue {
    fn from(value: i64) -> Self {
        TraitValue::Number(value as f64)
    }
}

impl From<bool> for TraitValue {
    fn from(value: bool) -> Self {
        TraitValue::Bool(value)
    }
}

/// Identity being evaluated. `identifier` seeds bucketing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub identifier: String,
    #[serde(default)]
    pub traits: HashMap<String, TraitValue>,
}

impl EvaluationContext {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            traits: HashMap::new(),
        }
    }

    pub fn with_trait(mut self, key: impl Into<String>, value: impl Into<TraitValue>) -> Self {
        self.traits.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&TraitValue> {
        self.traits.get(key)
    }
}

// FLAG DEFINITIONS

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedVariation {
    pub variation_key: String,
    pub weight: u32,
}

impl WeightedVariation {
    pub fn new(variation_key: impl Into<String>, weight: u32) -> Self {
        Self {
            variation_key: variation_key.into(),
            weight,
        }
    }
}

/// A trait based targeting rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub key: String,
    pub trait_key: String,
    /// Operator identifier, resolved through the matcher table at evaluation time.
    pub operator: String,
    pub trait_value: TraitValue,
    #[serde(default)]
    pub negate: bool,
    pub rule_variations: Vec<WeightedVariation>,
}

impl Rule {
    pub fn new(
        trait_key: impl Into<String>,
        operator: impl Into<String>,
        trait_value: impl Into<TraitValue>,
    ) -> Self {
        Self {
            key: String::new(),
            trait_key: trait_key.into(),
            operator: operator.into(),
            trait_value: trait_value.into(),
            negate: false,
            rule_variations: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    pub fn with_variation(mut self, variation_key: impl Into<String>, weight: u32) -> Self {
        self.rule_variations
            .push(WeightedVariation::new(variation_key, weight));
        self
    }

    /// Identity used for the bucketing scope. Falls back to the rule's
    /// definition when no key was assigned.
    pub fn identity(&self) -> Cow<'_, str> {
        if self.key.is_empty() {
            Cow::Owned(format!(
                "{}|{}|{}|{}",
                self.trait_key, self.operator, self.trait_value, self.negate
            ))
        } else {
            Cow::Borrowed(self.key.as_str())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub flag_key: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub use_fallthrough: bool,
    pub fallthrough_variations: Vec<WeightedVariation>,
}

impl Flag {
    pub fn new(flag_key: impl Into<String>) -> Self {
        Self {
            flag_key: flag_key.into(),
            rules: Vec::new(),
            use_fallthrough: false,
            fallthrough_variations: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_fallthrough(mut self, variation_key: impl Into<String>, weight: u32) -> Self {
        self.fallthrough_variations
            .push(WeightedVariation::new(variation_key, weight));
        self
    }

    pub fn forcing_fallthrough(mut self) -> Self {
        self.use_fallthrough = true;
        self
    }
}

// RESULTS

/// Why a variation was chosen. The serialized names are a public contract
/// with client SDKs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    Targeted,
    TargetedWeighted,
    Fallthrough,
    FallthroughWeighted,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Targeted => "TARGETED",
            Reason::TargetedWeighted => "TARGETED_WEIGHTED",
            Reason::Fallthrough => "FALLTHROUGH",
            Reason::FallthroughWeighted => "FALLTHROUGH_WEIGHTED",
        }
    }

    pub(crate) fn targeted(candidates: usize) -> Self {
        if candidates > 1 {
            Reason::TargetedWeighted
        } else {
            Reason::Targeted
        }
    }

    pub(crate) fn fallthrough(candidates: usize) -> Self {
        if candidates > 1 {
            Reason::FallthroughWeighted
        } else {
            Reason::Fallthrough
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub flag_key: String,
    pub variation_key: String,
    pub reason: Reason,
}
