use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use weighted_life::error::ConfigurationError;
use weighted_life::rule::{RuleEncoder, RuleMask, RuleOverrides};

#[test]
fn random_rules_never_overlap() {
    let mut seeds = StdRng::seed_from_u64(0x5eed);
    for _ in 0..10_000 {
        let mut rng = StdRng::seed_from_u64(seeds.gen());
        let rule = RuleEncoder::encode(RuleOverrides::default(), &mut rng).unwrap();
        assert_eq!(rule.born() & rule.survive(), 0, "{rule}");
    }
}

#[test]
fn survive_is_masked_by_complement_of_born() {
    let mut rng = StdRng::seed_from_u64(3);
    let b0: u8 = rng.gen();
    let b1: u8 = rng.gen();

    let mut rng = StdRng::seed_from_u64(3);
    let rule = RuleEncoder::encode(RuleOverrides::default(), &mut rng).unwrap();
    assert_eq!(rule.born(), b0);
    assert_eq!(rule.survive(), !b0 & b1);
}

#[test]
fn out_of_range_overrides_are_rejected() {
    let mut rng = StdRng::seed_from_u64(1);
    let err = RuleEncoder::encode(
        RuleOverrides {
            born: Some(256),
            survive: None,
        },
        &mut rng,
    )
    .unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::RuleOverrideOutOfRange {
            mask: "born",
            value: 256
        }
    );

    let err = RuleEncoder::encode(
        RuleOverrides {
            born: None,
            survive: Some(-1),
        },
        &mut rng,
    )
    .unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::RuleOverrideOutOfRange {
            mask: "survive",
            value: -1
        }
    );
}

#[test]
fn overlapping_override_pair_stays_disjoint() {
    let mut rng = StdRng::seed_from_u64(9);
    let rule = RuleEncoder::encode(
        RuleOverrides {
            born: Some(113),
            survive: Some(85),
        },
        &mut rng,
    )
    .unwrap();
    assert_eq!(rule.born(), 113);
    assert_eq!(rule.survive(), 85 & !113);
    assert_eq!(rule.born() & rule.survive(), 0);
}

#[test]
fn bit_queries_follow_masks() {
    let rule = RuleMask::from_bytes(0b0000_0100, 0b0000_1000);
    assert!(rule.is_born(2));
    assert!(!rule.is_born(3));
    assert!(rule.survives(3));
    assert!(!rule.survives(2));
    assert_eq!(rule.to_string(), "B4/S8 (00000100/00001000)");
}
