//! Deterministic weighted variation selection.
//!
//! The seed layout and hash are compatibility constants: changing either
//! reshuffles every running percentage rollout.

use sha2::{Digest, Sha256};

use super::model::WeightedVariation;

const SEED_SEPARATOR: &str = ".";
const FALLTHROUGH_SCOPE: &str = "fallthrough";

/// Which part of a flag is being bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketScope<'a> {
    Rule(&'a str),
    Fallthrough,
}

/// Builds the bucketing seed: `{flag_key}.{scope}.{salt}.{identifier}`.
pub fn seed(flag_key: &str, scope: BucketScope<'_>, salt: &str, identifier: &str) -> String {
    let scope = match scope {
        BucketScope::Rule(identity) => format!("rule:{}", identity),
        BucketScope::Fallthrough => FALLTHROUGH_SCOPE.to_string(),
    };
    [flag_key, scope.as_str(), salt, identifier].join(SEED_SEPARATOR)
}

/// First eight bytes of SHA-256, big endian.
pub fn hash_seed(seed: &str) -> u64 {
    let digest = Sha256::digest(seed.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Picks a variation from the weighted set.
///
/// Single entry sets never hash. A zero total picks the first entry, an empty
/// set picks nothing.
pub fn select<'a>(variations: &'a [WeightedVariation], seed: &str) -> Option<&'a WeightedVariation> {
    match variations {
        [] => None,
        [only] => Some(only),
        _ => {
            let total: u64 = variations.iter().map(|v| u64::from(v.weight)).sum();
            if total == 0 {
                return variations.first();
            }
            let bucket = hash_seed(seed) % total;
            pick(variations, bucket)
        }
    }
}

fn pick(variations: &[WeightedVariation], bucket: u64) -> Option<&WeightedVariation> {
    let mut cumulative = 0u64;
    for variation in variations {
        cumulative += u64::from(variation.weight);
        if bucket < cumulative {
            return Some(variation);
        }
    }
    variations.last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(entries: &[(&str, u32)]) -> Vec<WeightedVariation> {
        entries
            .iter()
            .map(|(key, weight)| WeightedVariation::new(*key, *weight))
            .collect()
    }

    #[test]
    fn test_seed_layout() {
        assert_eq!(
            seed("checkout", BucketScope::Rule("pro-users"), "env-salt", "user-1"),
            "checkout.rule:pro-users.env-salt.user-1"
        );
        assert_eq!(
            seed("checkout", BucketScope::Fallthrough, "env-salt", "user-1"),
            "checkout.fallthrough.env-salt.user-1"
        );
    }

    #[test]
    fn test_hash_is_pinned() {
        // SHA-256("") starts with e3b0c44298fc1c14
        assert_eq!(hash_seed(""), 0xe3b0_c442_98fc_1c14);
    }

    #[test]
    fn test_single_entry_short_circuits() {
        let variations = set(&[("on", 0)]);
        assert_eq!(select(&variations, "anything").unwrap().variation_key, "on");
    }

    #[test]
    fn test_empty_set_selects_nothing() {
        assert!(select(&[], "seed").is_none());
    }

    #[test]
    fn test_zero_total_selects_first() {
        let variations = set(&[("a", 0), ("b", 0), ("c", 0)]);
        for i in 0..50 {
            let picked = select(&variations, &format!("user-{}", i)).unwrap();
            assert_eq!(picked.variation_key, "a");
        }
    }

    #[test]
    fn test_zero_weight_entries_are_never_picked() {
        let variations = set(&[("a", 0), ("b", 10), ("c", 0)]);
        for i in 0..200 {
            let picked = select(&variations, &format!("user-{}", i)).unwrap();
            assert_eq!(picked.variation_key, "b");
        }
    }

    #[test]
    fn test_pick_walks_cumulative_bounds() {
        let variations = set(&[("a", 1), ("b", 2), ("c", 3)]);
        let keys: Vec<_> = (0..6)
            .map(|bucket| pick(&variations, bucket).unwrap().variation_key.as_str())
            .collect();
        assert_eq!(keys, vec!["a", "b", "b", "c", "c", "c"]);
    }

    #[test]
    fn test_weights_are_respected() {
        let variations = set(&[("on", 50), ("off", 50)]);
        let on = (0..10_000)
            .filter(|i| {
                let seed = seed("checkout", BucketScope::Fallthrough, "salt", &format!("user-{}", i));
                select(&variations, &seed).unwrap().variation_key == "on"
            })
            .count();
        assert!((4_500..=5_500).contains(&on), "on = {}", on);
    }

    #[test]
    fn test_uneven_weights_are_respected() {
        let variations = set(&[("a", 10), ("b", 30), ("c", 60)]);
        let mut counts = [0usize; 3];
        for i in 0..20_000 {
            let seed = seed("pricing", BucketScope::Rule("r1"), "salt", &format!("id-{}", i));
            match select(&variations, &seed).unwrap().variation_key.as_str() {
                "a" => counts[0] += 1,
                "b" => counts[1] += 1,
                _ => counts[2] += 1,
            }
        }
        assert!((1_600..=2_400).contains(&counts[0]), "{:?}", counts);
        assert!((5_400..=6_600).contains(&counts[1]), "{:?}", counts);
        assert!((11_200..=12_800).contains(&counts[2]), "{:?}", counts);
    }

    proptest! {
        #[test]
        fn selection_is_deterministic(identifier in "[a-zA-Z0-9-]{1,40}", salt in "[a-z0-9]{0,16}") {
            let variations = set(&[("a", 3), ("b", 5), ("c", 2)]);
            let seed = seed("flag", BucketScope::Fallthrough, &salt, &identifier);
            let first = select(&variations, &seed).unwrap();
            let second = select(&variations, &seed).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn single_entry_ignores_seed(seed in ".*", weight: u32) {
            let variations = set(&[("only", weight)]);
            prop_assert_eq!(select(&variations, &seed).unwrap().variation_key.as_str(), "only");
        }
    }
}
