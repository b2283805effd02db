use crate::types::{round_cents, Choice};
use rand::Rng;

/// Inclusive reward bounds for one arm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmRange {
    pub low: f64,
    pub high: f64,
}

/// Uniform per-arm reward draws, rounded to cents.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardModel {
    arms: [ArmRange; 3],
}

impl Default for RewardModel {
    fn default() -> Self {
        Self {
            arms: [
                ArmRange { low: 0.2, high: 0.6 },
                ArmRange { low: 0.4, high: 0.8 },
                ArmRange { low: 0.0, high: 1.0 },
            ],
        }
    }
}

impl RewardModel {
    pub fn new(a: ArmRange, b: ArmRange, c: ArmRange) -> Self {
        Self { arms: [a, b, c] }
    }

    pub fn range(&self, choice: Choice) -> ArmRange {
        match choice {
            Choice::A => self.arms[0],
            Choice::B => self.arms[1],
            Choice::C => self.arms[2],
        }
    }

    pub fn draw<R: Rng + ?Sized>(&self, choice: Choice, rng: &mut R) -> f64 {
        let ArmRange { low, high } = self.range(choice);
        if high <= low {
            return round_cents(low);
        }
        round_cents(rng.gen_range(low..=high))
    }
}

/// Uniformly random arm, used when no choices are scripted.
pub fn random_choice<R: Rng + ?Sized>(rng: &mut R) -> Choice {
    Choice::ALL[rng.gen_range(0..Choice::ALL.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn draws_stay_in_range_with_two_decimals() {
        let model = RewardModel::default();
        let mut rng = StdRng::seed_from_u64(7);
        for choice in Choice::ALL {
            let ArmRange { low, high } = model.range(choice);
            for _ in 0..200 {
                let r = model.draw(choice, &mut rng);
                assert!(r >= low && r <= high, "{r} outside {low}..={high}");
                assert!(((r * 100.0).round() - r * 100.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn degenerate_range_is_constant() {
        let fixed = ArmRange { low: 0.5, high: 0.5 };
        let model = RewardModel::new(fixed, fixed, fixed);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(model.draw(Choice::B, &mut rng), 0.5);
    }

    #[test]
    fn random_choice_covers_all_arms() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            seen.insert(random_choice(&mut rng));
        }
        assert_eq!(seen.len(), 3);
    }
}
