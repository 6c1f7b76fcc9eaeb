//! Policy trait for the driving environment.

use crate::experiment::action::Action;
use crate::experiment::observation::Observation;

/// What a policy produced for one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyOutput {
    /// Raw action; the environment clips it into its action box.
    pub action: Action,
    /// Log-density of `action` under the policy.
    pub log_prob: f64,
    /// State value estimate, `0` for policies without a critic.
    pub value: f64,
}

/// A policy that maps observations to continuous actions.
pub trait Policy: Send {
    /// Selects an action for `observation`.
    fn act(&mut self, observation: &Observation) -> PolicyOutput;

    /// Value estimate for `observation`, used to bootstrap truncated rollouts.
    fn value(&mut self, _observation: &Observation) -> f64 {
        0.0
    }

    /// Returns a human-readable name for this policy.
    fn name(&self) -> &str;
}
