//! Random policy for testing and baselines.

use rand::Rng;

use super::trait_::{Policy, PolicyOutput};
use crate::experiment::action::{BoxSpace, ACTION_DIM};
use crate::experiment::observation::Observation;

/// Samples every action component uniformly within the action box.
///
/// Used for smoke runs and as a lower-bound baseline.
pub struct RandomPolicy {
    space: BoxSpace,
}

impl RandomPolicy {
    pub fn new(space: BoxSpace) -> Self {
        Self { space }
    }
}

impl Policy for RandomPolicy {
    fn act(&mut self, _observation: &Observation) -> PolicyOutput {
        let mut rng = rand::thread_rng();
        let mut action = [0.0; ACTION_DIM];
        let mut log_prob = 0.0;
        for (i, a) in action.iter_mut().enumerate() {
            let (low, high) = (self.space.low[i], self.space.high[i]);
            *a = rng.gen_range(low..=high);
            log_prob -= ((high - low) as f64).ln();
        }
        PolicyOutput {
            action,
            log_prob,
            value: 0.0,
        }
    }

    fn name(&self) -> &str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_actions_stay_in_box() {
        let space = BoxSpace::driving();
        let mut policy = RandomPolicy::new(space);
        let obs = Observation::zeros([4, 4, 9]);
        for _ in 0..200 {
            let out = policy.act(&obs);
            assert!(space.contains(&out.action));
            assert_eq!(out.value, 0.0);
        }
    }

    #[test]
    fn log_prob_is_uniform_density() {
        let mut policy = RandomPolicy::new(BoxSpace::driving());
        let out = policy.act(&Observation::zeros([1, 1, 9]));
        // widths 1, 2, 1
        assert!((out.log_prob + 2.0_f64.ln()).abs() < 1e-12);
        assert_eq!(policy.name(), "random");
    }
}
