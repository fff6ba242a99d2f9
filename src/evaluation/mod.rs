//! Flag evaluation engine.
//!
//! Pure and stateless: maps (flag, salt, context) to a variation decision.
//! Rules are all evaluated in order and vote for a variation; the first rule to
//! reach a new highest tally leads. With no rule applied the flag falls
//! through to its default weighted set.

pub mod bucket;
pub mod error;
pub mod model;
pub mod operator;
pub mod rule;

use std::collections::HashMap;

use tracing::debug;

pub use error::{EvaluationError, EvaluationResult};
pub use model::{
    EvaluationContext, Evaluation, Flag, Reason, Rule, TraitValue, WeightedVariation,
};
pub use operator::{MatcherTable, Operator};
pub use rule::{Decision, RuleOutcome};

use bucket::BucketScope;

/// Evaluation result plus any configuration errors met on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluated {
    pub evaluation: Evaluation,
    pub errors: Vec<EvaluationError>,
}

impl Evaluated {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Strict view: the first configuration error fails the evaluation.
    pub fn into_result(self) -> EvaluationResult<Evaluation> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.evaluation),
        }
    }
}

/// Entry point holding the operator table. Build once, share by reference.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    matchers: MatcherTable,
}

impl Evaluator {
    pub fn new(matchers: MatcherTable) -> Self {
        Self { matchers }
    }

    pub fn matchers(&self) -> &MatcherTable {
        &self.matchers
    }

    /// Evaluate the variation for a single flag.
    ///
    /// A rule that fails with a configuration error counts as not applied and
    /// the error is returned alongside the evaluation.
    pub fn evaluate(&self, flag: &Flag, salt: &str, context: &EvaluationContext) -> Evaluated {
        let mut errors = Vec::new();

        let winner = if flag.use_fallthrough || flag.rules.is_empty() {
            None
        } else {
            self.vote(flag, salt, context, &mut errors)
        };

        let decision = match winner {
            Some(decision) if !decision.variation_key.is_empty() => decision,
            _ => fallthrough(flag, salt, context, &mut errors),
        };

        Evaluated {
            evaluation: Evaluation {
                flag_key: flag.flag_key.clone(),
                variation_key: decision.variation_key,
                reason: decision.reason,
            },
            errors,
        }
    }

    fn vote(
        &self,
        flag: &Flag,
        salt: &str,
        context: &EvaluationContext,
        errors: &mut Vec<EvaluationError>,
    ) -> Option<Decision> {
        let mut votes: HashMap<String, usize> = HashMap::new();
        let mut max_votes = 0;
        let mut leader = None;

        for rule in &flag.rules {
            let decision = match rule::evaluate_rule(
                &self.matchers,
                &flag.flag_key,
                rule,
                salt,
                context,
            ) {
                Ok(RuleOutcome::Applied(decision)) => decision,
                Ok(RuleOutcome::NotApplied) => continue,
                Err(err) => {
                    debug!(flag_key = %flag.flag_key, rule = %rule.identity(), error = %err, "skipping misconfigured rule");
                    errors.push(err);
                    continue;
                }
            };

            let tally = votes.entry(decision.variation_key.clone()).or_insert(0);
            *tally += 1;
            // ties keep the earlier leader
            if *tally > max_votes {
                max_votes = *tally;
                leader = Some(decision);
            }
        }

        leader
    }
}

fn fallthrough(
    flag: &Flag,
    salt: &str,
    context: &EvaluationContext,
    errors: &mut Vec<EvaluationError>,
) -> Decision {
    let variations = &flag.fallthrough_variations;
    let seed = bucket::seed(
        &flag.flag_key,
        BucketScope::Fallthrough,
        salt,
        &context.identifier,
    );

    let variation_key = match bucket::select(variations, &seed) {
        Some(variation) => variation.variation_key.clone(),
        None => {
            errors.push(EvaluationError::EmptyVariationSet {
                flag_key: flag.flag_key.clone(),
                scope: "fallthrough".to_string(),
            });
            String::new()
        }
    };

    Decision {
        variation_key,
        reason: Reason::fallthrough(variations.len()),
    }
}
