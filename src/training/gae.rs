//! Generalized Advantage Estimation over one worker's sample batch.

/// Returns `(advantages, returns)` for a batch of consecutive steps.
///
/// `last_value` is the critic's estimate for the observation following the
/// final step; it is only used when that step did not end its episode, so a
/// batch cut in the middle of an episode still bootstraps correctly. A
/// `done` step never propagates advantage from later steps.
pub fn compute_gae(
    rewards: &[f64],
    values: &[f64],
    dones: &[bool],
    last_value: f64,
    gamma: f64,
    lambda: f64,
) -> (Vec<f64>, Vec<f64>) {
    debug_assert_eq!(values.len(), rewards.len());
    debug_assert_eq!(dones.len(), rewards.len());

    let next_values = values.iter().skip(1).copied().chain(std::iter::once(last_value));
    let steps: Vec<(f64, f64, bool, f64)> = rewards
        .iter()
        .zip(values)
        .zip(dones)
        .zip(next_values)
        .map(|(((&r, &v), &d), next)| (r, v, d, next))
        .collect();

    let mut advantages = Vec::with_capacity(steps.len());
    let mut running = 0.0;
    for &(reward, value, done, next_value) in steps.iter().rev() {
        let continues = if done { 0.0 } else { 1.0 };
        let td_error = reward + gamma * continues * next_value - value;
        running = td_error + gamma * lambda * continues * running;
        advantages.push(running);
    }
    advantages.reverse();

    let returns = advantages.iter().zip(values).map(|(a, v)| a + v).collect();
    (advantages, returns)
}
