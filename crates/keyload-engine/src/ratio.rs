use rand::Rng;

/// A ratio split into a guaranteed repeat count and a fractional probability.
///
/// A ratio of 2.5 means two guaranteed operations per iteration plus a 50%
/// chance of a third.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioSplit {
    pub repeats: u32,
    pub fractional: f64,
}

impl RatioSplit {
    pub const ZERO: RatioSplit = RatioSplit {
        repeats: 0,
        fractional: 0.0,
    };

    /// Draws whether the extra fractional operation runs this iteration.
    pub fn fires<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.fractional > 0.0 && rng.gen::<f64>() < self.fractional
    }
}

/// Splits a non-negative ratio into `(floor(r), r - floor(r))`.
///
/// Non-positive and non-finite inputs yield zero operations.
#[must_use]
pub fn ratio_split(ratio: f64) -> RatioSplit {
    if !ratio.is_finite() || ratio <= 0.0 {
        return RatioSplit::ZERO;
    }
    let whole = ratio.floor();
    RatioSplit {
        repeats: whole as u32,
        fractional: ratio - whole,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_split_values() {
        assert_eq!(
            ratio_split(2.5),
            RatioSplit {
                repeats: 2,
                fractional: 0.5
            }
        );
        assert_eq!(ratio_split(0.0), RatioSplit::ZERO);
        assert_eq!(
            ratio_split(1.0),
            RatioSplit {
                repeats: 1,
                fractional: 0.0
            }
        );
    }

    #[test]
    fn test_invalid_ratios_yield_zero() {
        assert_eq!(ratio_split(-1.0), RatioSplit::ZERO);
        assert_eq!(ratio_split(f64::NAN), RatioSplit::ZERO);
    }

    #[test]
    fn test_whole_ratio_never_fires() {
        let mut rng = StdRng::seed_from_u64(1);
        let split = ratio_split(3.0);
        assert!((0..1_000).all(|_| !split.fires(&mut rng)));
    }

    #[test]
    fn test_fractional_rate_converges() {
        let mut rng = StdRng::seed_from_u64(42);
        let split = ratio_split(0.25);
        let fired = (0..10_000).filter(|_| split.fires(&mut rng)).count();
        assert!((2_000..3_000).contains(&fired), "fired {fired} times");
    }
}
