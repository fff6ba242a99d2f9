use feature_flag_evaluator::evaluation::{
    EvaluationContext, Evaluator, Flag, Reason, Rule, WeightedVariation,
};

fn evaluator() -> Evaluator {
    Evaluator::default()
}

fn pro_rule() -> Rule {
    Rule::new("plan", "equal", "pro").with_variation("on", 1)
}

#[test]
fn empty_rules_fall_through_for_any_context() {
    let flag = Flag::new("checkout").with_fallthrough("A", 100);

    for context in [
        EvaluationContext::new("user-1"),
        EvaluationContext::new("user-2").with_trait("plan", "pro"),
        EvaluationContext::default(),
    ] {
        let evaluation = evaluator()
            .evaluate(&flag, "salt", &context)
            .into_result()
            .unwrap();
        assert_eq!(evaluation.variation_key, "A");
        assert_eq!(evaluation.reason, Reason::Fallthrough);
    }
}

#[test]
fn matching_rule_targets_its_variation() {
    let flag = Flag::new("checkout")
        .with_rule(pro_rule())
        .with_fallthrough("off", 1);
    let context = EvaluationContext::new("user-1").with_trait("plan", "pro");

    let evaluation = evaluator().evaluate(&flag, "salt", &context).evaluation;
    assert_eq!(evaluation.variation_key, "on");
    assert_eq!(evaluation.reason, Reason::Targeted);
}

#[test]
fn non_matching_rule_falls_through() {
    let flag = Flag::new("checkout")
        .with_rule(pro_rule())
        .with_fallthrough("off", 1);
    let context = EvaluationContext::new("user-1").with_trait("plan", "free");

    let evaluation = evaluator().evaluate(&flag, "salt", &context).evaluation;
    assert_eq!(evaluation.variation_key, "off");
    assert_eq!(evaluation.reason, Reason::Fallthrough);
}

#[test]
fn context_without_rule_traits_uses_fallthrough_set() {
    let flag = Flag::new("checkout")
        .with_rule(pro_rule())
        .with_rule(Rule::new("country", "in", "de,fr").with_variation("eu", 1))
        .with_fallthrough("a", 1)
        .with_fallthrough("b", 1);
    let allowed: Vec<&str> = flag
        .fallthrough_variations
        .iter()
        .map(|v: &WeightedVariation| v.variation_key.as_str())
        .collect();

    for i in 0..100 {
        let context = EvaluationContext::new(format!("user-{}", i)).with_trait("team", "core");
        let evaluation = evaluator().evaluate(&flag, "salt", &context).evaluation;
        assert_eq!(evaluation.reason, Reason::FallthroughWeighted);
        assert!(allowed.contains(&evaluation.variation_key.as_str()));
    }
}

#[test]
fn weighted_rule_splits_evenly() {
    let flag = Flag::new("checkout")
        .with_rule(
            Rule::new("plan", "equal", "pro")
                .with_variation("on", 50)
                .with_variation("off", 50),
        )
        .with_fallthrough("control", 1);
    let evaluator = evaluator();

    let mut on = 0;
    for i in 0..10_000 {
        let context = EvaluationContext::new(format!("user-{}", i)).with_trait("plan", "pro");
        let evaluation = evaluator.evaluate(&flag, "salt", &context).evaluation;
        assert_eq!(evaluation.reason, Reason::TargetedWeighted);
        if evaluation.variation_key == "on" {
            on += 1;
        }
    }
    assert!((4_500..=5_500).contains(&on), "on = {}", on);
}

#[test]
fn first_rule_wins_a_one_vote_tie() {
    let flag = Flag::new("checkout")
        .with_rule(Rule::new("plan", "equal", "pro").with_variation("first", 1))
        .with_rule(Rule::new("plan", "starts_with", "p").with_variation("second", 1))
        .with_fallthrough("off", 1);
    let context = EvaluationContext::new("user-1").with_trait("plan", "pro");

    let evaluation = evaluator().evaluate(&flag, "salt", &context).evaluation;
    assert_eq!(evaluation.variation_key, "first");
    assert_eq!(evaluation.reason, Reason::Targeted);
}

#[test]
fn evaluator_is_shareable_across_threads() {
    let evaluator = std::sync::Arc::new(evaluator());
    let flag = std::sync::Arc::new(
        Flag::new("checkout")
            .with_rule(pro_rule())
            .with_fallthrough("a", 1)
            .with_fallthrough("b", 1),
    );

    let expected: Vec<_> = (0..50)
        .map(|i| {
            let context = EvaluationContext::new(format!("user-{}", i)).with_trait("plan", "free");
            evaluator.evaluate(&flag, "salt", &context).evaluation
        })
        .collect();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let evaluator = evaluator.clone();
            let flag = flag.clone();
            std::thread::spawn(move || {
                (0..50)
                    .map(|i| {
                        let context = EvaluationContext::new(format!("user-{}", i))
                            .with_trait("plan", "free");
                        evaluator.evaluate(&flag, "salt", &context).evaluation
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
