use super::bucket::{self, BucketScope};
use super::error::EvaluationResult;
use super::model::{EvaluationContext, Reason, Rule};
use super::operator::MatcherTable;

/// A variation picked by a rule or the fallthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub variation_key: String,
    pub reason: Reason,
}

/// Result of checking one rule against a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Trait missing, predicate false, or nothing to pick from.
    NotApplied,
    Applied(Decision),
}

/// Evaluate a single rule.
///
/// Errors are configuration failures of the rule itself (operator lookup or an
/// unusable rule value); the caller decides how to degrade.
pub fn evaluate_rule(
    matchers: &MatcherTable,
    flag_key: &str,
    rule: &Rule,
    salt: &str,
    context: &EvaluationContext,
) -> EvaluationResult<RuleOutcome> {
    // Resolve first so a misconfigured rule is reported even when the trait is absent.
    let operator = matchers.lookup(&rule.operator)?;

    let trait_value = match context.get(&rule.trait_key) {
        Some(value) => value,
        None => return Ok(RuleOutcome::NotApplied),
    };

    let mut matched = matchers.apply(operator, trait_value, &rule.trait_value)?;
    if rule.negate {
        matched = !matched;
    }
    if !matched {
        return Ok(RuleOutcome::NotApplied);
    }

    let identity = rule.identity();
    let seed = bucket::seed(
        flag_key,
        BucketScope::Rule(&identity),
        salt,
        &context.identifier,
    );

    let outcome = match bucket::select(&rule.rule_variations, &seed) {
        Some(variation) => RuleOutcome::Applied(Decision {
            variation_key: variation.variation_key.clone(),
            reason: Reason::targeted(rule.rule_variations.len()),
        }),
        None => RuleOutcome::NotApplied,
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::error::EvaluationError;
    use proptest::prelude::*;

    fn plan_rule() -> Rule {
        Rule::new("plan", "equal", "pro")
            .with_key("pro-plan")
            .with_variation("on", 1)
    }

    fn run(rule: &Rule, context: &EvaluationContext) -> EvaluationResult<RuleOutcome> {
        evaluate_rule(&MatcherTable::new(), "checkout", rule, "salt", context)
    }

    #[test]
    fn test_matching_rule_is_targeted() {
        let context = EvaluationContext::new("user-1").with_trait("plan", "pro");
        assert_eq!(
            run(&plan_rule(), &context).unwrap(),
            RuleOutcome::Applied(Decision {
                variation_key: "on".to_string(),
                reason: Reason::Targeted,
            })
        );
    }

    #[test]
    fn test_non_matching_rule_does_not_apply() {
        let context = EvaluationContext::new("user-1").with_trait("plan", "free");
        assert_eq!(run(&plan_rule(), &context).unwrap(), RuleOutcome::NotApplied);
    }

    #[test]
    fn test_missing_trait_does_not_apply_even_when_negated() {
        let context = EvaluationContext::new("user-1").with_trait("country", "de");
        assert_eq!(run(&plan_rule(), &context).unwrap(), RuleOutcome::NotApplied);
        assert_eq!(
            run(&plan_rule().negated(), &context).unwrap(),
            RuleOutcome::NotApplied
        );
    }

    #[test]
    fn test_negation_inverts_match() {
        let rule = plan_rule().negated();
        let free = EvaluationContext::new("user-1").with_trait("plan", "free");
        let pro = EvaluationContext::new("user-1").with_trait("plan", "pro");

        assert!(matches!(run(&rule, &free).unwrap(), RuleOutcome::Applied(_)));
        assert_eq!(run(&rule, &pro).unwrap(), RuleOutcome::NotApplied);
    }

    #[test]
    fn test_weighted_rule_reason() {
        let rule = Rule::new("plan", "equal", "pro")
            .with_variation("on", 50)
            .with_variation("off", 50);
        let context = EvaluationContext::new("user-1").with_trait("plan", "pro");

        match run(&rule, &context).unwrap() {
            RuleOutcome::Applied(decision) => {
                assert_eq!(decision.reason, Reason::TargetedWeighted);
                assert!(decision.variation_key == "on" || decision.variation_key == "off");
            }
            other => panic!("expected rule to apply, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_rule_variations_do_not_apply() {
        let rule = Rule::new("plan", "equal", "pro");
        let context = EvaluationContext::new("user-1").with_trait("plan", "pro");
        assert_eq!(run(&rule, &context).unwrap(), RuleOutcome::NotApplied);
    }

    #[test]
    fn test_unsupported_operator_is_reported() {
        let rule = Rule::new("plan", "looks_like", "pro").with_variation("on", 1);
        let context = EvaluationContext::new("user-1");
        assert_eq!(
            run(&rule, &context).unwrap_err(),
            EvaluationError::UnsupportedOperator {
                operator: "looks_like".to_string()
            }
        );
    }

    #[test]
    fn test_rules_with_identical_weights_bucket_independently() {
        let variations = |rule: Rule| rule.with_variation("a", 1).with_variation("b", 1);
        let first = variations(Rule::new("plan", "equal", "pro").with_key("first"));
        let second = variations(Rule::new("plan", "equal", "pro").with_key("second"));

        let differing = (0..200)
            .filter(|i| {
                let context =
                    EvaluationContext::new(format!("user-{}", i)).with_trait("plan", "pro");
                run(&first, &context).unwrap() != run(&second, &context).unwrap()
            })
            .count();
        assert!(differing > 0);
    }

    proptest! {
        #[test]
        fn negation_is_the_exact_complement(plan in "[a-z]{1,6}", wanted in "[a-z]{1,6}") {
            let rule = Rule::new("plan", "equal", wanted.as_str()).with_variation("on", 1);
            let negated = rule.clone().negated();
            let context = EvaluationContext::new("user-1").with_trait("plan", plan.as_str());

            let plain = matches!(run(&rule, &context).unwrap(), RuleOutcome::Applied(_));
            let inverted = matches!(run(&negated, &context).unwrap(), RuleOutcome::Applied(_));
            prop_assert_eq!(plain, !inverted);
        }
    }
}
