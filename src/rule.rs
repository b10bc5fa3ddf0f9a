use std::fmt;

use rand::Rng;

use crate::error::ConfigurationError;

/// Born/survive bitmasks. Bit `b` of a mask answers "does a cell whose
/// neighbour density falls in bucket `b` become (or stay) alive".
///
/// The two masks never share a bit: `survive` is always derived through
/// `!born & x`, so there is no constructor that can produce an overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleMask {
    born: u8,
    survive: u8,
}

impl RuleMask {
    /// Builds a rule from a born byte and a candidate survive byte.
    pub fn from_bytes(born: u8, survive_candidate: u8) -> Self {
        Self {
            born,
            survive: !born & survive_candidate,
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let b0: u8 = rng.gen();
        let b1: u8 = rng.gen();
        Self::from_bytes(b0, b1)
    }

    #[inline]
    pub fn born(&self) -> u8 {
        self.born
    }

    #[inline]
    pub fn survive(&self) -> u8 {
        self.survive
    }

    #[inline]
    pub fn is_born(&self, bit: u8) -> bool {
        bit < 8 && (self.born >> bit) & 1 == 1
    }

    #[inline]
    pub fn survives(&self, bit: u8) -> bool {
        bit < 8 && (self.survive >> bit) & 1 == 1
    }
}

impl fmt::Display for RuleMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "B{}/S{} ({:08b}/{:08b})",
            self.born, self.survive, self.born, self.survive
        )
    }
}

/// Optional pinned masks, as read from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleOverrides {
    pub born: Option<i64>,
    pub survive: Option<i64>,
}

impl RuleOverrides {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_byte("born", self.born)?;
        check_byte("survive", self.survive)?;
        Ok(())
    }
}

fn check_byte(mask: &'static str, value: Option<i64>) -> Result<Option<u8>, ConfigurationError> {
    match value {
        None => Ok(None),
        Some(v) => u8::try_from(v)
            .map(Some)
            .map_err(|_| ConfigurationError::RuleOverrideOutOfRange { mask, value: v }),
    }
}

/// Derives the run's rule: two random bytes, with either side replaceable
/// by a validated override.
pub struct RuleEncoder;

impl RuleEncoder {
    pub fn encode<R: Rng + ?Sized>(
        overrides: RuleOverrides,
        rng: &mut R,
    ) -> Result<RuleMask, ConfigurationError> {
        let born_override = check_byte("born", overrides.born)?;
        let survive_override = check_byte("survive", overrides.survive)?;

        // Both bytes are always drawn so an override on one side does not
        // shift the random stream seen by the other.
        let b0: u8 = rng.gen();
        let b1: u8 = rng.gen();

        let born = born_override.unwrap_or(b0);
        let survive_candidate = match survive_override {
            Some(survive) => survive,
            None => !b0 & b1,
        };

        let rule = RuleMask::from_bytes(born, survive_candidate);
        if rule.survive() != survive_candidate {
            log::warn!(
                "survive mask {:08b} overlaps born mask {:08b}; using {:08b}",
                survive_candidate,
                born,
                rule.survive()
            );
        }
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn overrides_are_used_verbatim_when_disjoint() {
        let mut rng = StdRng::seed_from_u64(7);
        let overrides = RuleOverrides {
            born: Some(0b0000_0011),
            survive: Some(0b0011_0000),
        };
        let rule = RuleEncoder::encode(overrides, &mut rng).unwrap();
        assert_eq!(rule.born(), 0b0000_0011);
        assert_eq!(rule.survive(), 0b0011_0000);
    }

    #[test]
    fn overlapping_survive_override_is_masked() {
        let mut rng = StdRng::seed_from_u64(7);
        let overrides = RuleOverrides {
            born: Some(113),
            survive: Some(85),
        };
        let rule = RuleEncoder::encode(overrides, &mut rng).unwrap();
        assert_eq!(rule.born(), 113);
        assert_eq!(rule.survive(), !113u8 & 85);
        assert_eq!(rule.born() & rule.survive(), 0);
    }

    #[test]
    fn display_shows_both_masks() {
        let rule = RuleMask::from_bytes(0b1000_0001, 0b0100_0010);
        assert_eq!(rule.to_string(), "B129/S66 (10000001/01000010)");
    }
}
