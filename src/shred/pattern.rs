//! Overwrite pass patterns and the per-file pass plan.
//!
//! A pattern maps to the byte content written over a file's full length during
//! one overwrite pass. The default cycle is zeros, ones, pseudo-random — the
//! pseudo-random pass is obfuscation, not cryptography.

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Byte content of a single overwrite pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassPattern {
    /// Every byte `0x00`.
    Zeros,
    /// Every byte `0xFF`.
    Ones,
    /// Pseudo-random bytes from the injected RNG.
    Random,
}

impl PassPattern {
    /// Fill `buf` with this pattern's bytes.
    pub fn fill(self, buf: &mut [u8], rng: &mut impl RngCore) {
        match self {
            Self::Zeros => buf.fill(0x00),
            Self::Ones => buf.fill(0xFF),
            Self::Random => rng.fill_bytes(buf),
        }
    }

    /// Short label for progress and audit output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Zeros => "zeros",
            Self::Ones => "ones",
            Self::Random => "random",
        }
    }
}

/// The default pattern cycle, repeated when the pass count exceeds its length.
pub const DEFAULT_CYCLE: [PassPattern; 3] =
    [PassPattern::Zeros, PassPattern::Ones, PassPattern::Random];

/// Build the full pass sequence for one file.
///
/// `passes` configured passes cycle through `cycle`, followed by one mandatory
/// final random pass. The plan therefore always has `passes + 1` entries and
/// always ends with [`PassPattern::Random`].
#[must_use]
pub fn pattern_plan(cycle: &[PassPattern], passes: usize) -> Vec<PassPattern> {
    let cycle = if cycle.is_empty() {
        &DEFAULT_CYCLE[..]
    } else {
        cycle
    };
    let mut plan: Vec<PassPattern> = (0..passes).map(|i| cycle[i % cycle.len()]).collect();
    plan.push(PassPattern::Random);
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn default_plan_for_three_passes() {
        let plan = pattern_plan(&DEFAULT_CYCLE, 3);
        assert_eq!(
            plan,
            vec![
                PassPattern::Zeros,
                PassPattern::Ones,
                PassPattern::Random,
                PassPattern::Random,
            ]
        );
    }

    #[test]
    fn cycle_repeats_beyond_its_length() {
        let plan = pattern_plan(&DEFAULT_CYCLE, 5);
        assert_eq!(plan[3], PassPattern::Zeros);
        assert_eq!(plan[4], PassPattern::Ones);
        assert_eq!(plan[5], PassPattern::Random); // mandatory final pass
    }

    #[test]
    fn empty_cycle_falls_back_to_default() {
        let plan = pattern_plan(&[], 2);
        assert_eq!(plan, vec![PassPattern::Zeros, PassPattern::Ones, PassPattern::Random]);
    }

    #[test]
    fn zeros_and_ones_fill_deterministically() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut buf = [0xAAu8; 64];
        PassPattern::Zeros.fill(&mut buf, &mut rng);
        assert!(buf.iter().all(|&b| b == 0x00));
        PassPattern::Ones.fill(&mut buf, &mut rng);
        assert!(buf.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn random_fill_is_seeded_deterministically() {
        let mut a = [0u8; 128];
        let mut b = [0u8; 128];
        PassPattern::Random.fill(&mut a, &mut StdRng::seed_from_u64(42));
        PassPattern::Random.fill(&mut b, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);

        let mut c = [0u8; 128];
        PassPattern::Random.fill(&mut c, &mut StdRng::seed_from_u64(43));
        assert_ne!(a, c, "different seeds should produce different bytes");
    }

    #[test]
    fn serde_uses_snake_case_labels() {
        let json = serde_json::to_string(&PassPattern::Zeros).unwrap();
        assert_eq!(json, "\"zeros\"");
        let back: PassPattern = serde_json::from_str("\"random\"").unwrap();
        assert_eq!(back, PassPattern::Random);
    }

    proptest! {
        #[test]
        fn plan_has_passes_plus_one_entries(passes in 1usize..64) {
            let plan = pattern_plan(&DEFAULT_CYCLE, passes);
            prop_assert_eq!(plan.len(), passes + 1);
            prop_assert_eq!(*plan.last().unwrap(), PassPattern::Random);
        }

        #[test]
        fn plan_prefix_follows_the_cycle(passes in 1usize..64) {
            let plan = pattern_plan(&DEFAULT_CYCLE, passes);
            for (i, pattern) in plan.iter().take(passes).enumerate() {
                prop_assert_eq!(*pattern, DEFAULT_CYCLE[i % DEFAULT_CYCLE.len()]);
            }
        }
    }
}
