//! Neural network policy using tch-rs (PyTorch bindings).
//!
//! A small CNN encodes the stacked camera observation. The actor outputs
//! the mean of a diagonal Gaussian over `[throttle, steer, brake]` with a
//! learned state-independent log standard deviation; the critic has its
//! own encoder and outputs a scalar value.
//! This module is only available with the `rl-nn` feature.

use std::path::Path;

use tch::{nn, nn::Module, Device, Kind, Tensor};

use super::trait_::{Policy, PolicyOutput};
use crate::error::ExperimentError;
use crate::experiment::action::ACTION_DIM;
use crate::experiment::observation::Observation;

/// Width of the encoder's output features.
const FEATURES: i64 = 256;

/// Initial log standard deviation of the action distribution.
const INITIAL_LOG_STD: f64 = -0.5;

const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

fn conv_out(size: usize, kernel: usize, stride: usize) -> usize {
    if size >= kernel {
        (size - kernel) / stride + 1
    } else {
        0
    }
}

/// Conv encoder over `[batch, channels, height, width]` inputs.
///
/// Architecture: `conv5x5/2(16) → conv3x3/2(32) → flatten → 256`, ReLU after
/// every layer.
fn encoder(p: &nn::Path, shape: [usize; 3]) -> Result<nn::Sequential, ExperimentError> {
    let [width, height, channels] = shape;
    let out_w = conv_out(conv_out(width, 5, 2), 3, 2);
    let out_h = conv_out(conv_out(height, 5, 2), 3, 2);
    if out_w == 0 || out_h == 0 {
        return Err(ExperimentError::InvalidConfig(format!(
            "camera images of {}x{} are too small for the policy encoder (need at least 9x9)",
            width, height
        )));
    }
    let stride2 = nn::ConvConfig {
        stride: 2,
        ..Default::default()
    };
    Ok(nn::seq()
        .add(nn::conv2d(p / "c1", channels as i64, 16, 5, stride2))
        .add_fn(|x| x.relu())
        .add(nn::conv2d(p / "c2", 16, 32, 3, stride2))
        .add_fn(|x| x.relu())
        .add_fn(|x| x.flat_view())
        .add(nn::linear(
            p / "fc",
            (32 * out_w * out_h) as i64,
            FEATURES,
            Default::default(),
        ))
        .add_fn(|x| x.relu()))
}

/// Stacks observations into a float tensor `[batch, channels, height, width]`
/// scaled to `[0, 1]`.
pub fn batch_observations(observations: &[&Observation], device: Device) -> Tensor {
    let Some(first) = observations.first() else {
        return Tensor::zeros([0], (Kind::Float, device));
    };
    let [width, height, channels] = first.shape;
    let flat: Vec<f32> = observations.iter().flat_map(|o| o.to_f32()).collect();
    Tensor::from_slice(&flat)
        .reshape([
            observations.len() as i64,
            width as i64,
            height as i64,
            channels as i64,
        ])
        .permute([0, 3, 2, 1])
        .contiguous()
        .to_device(device)
}

/// Gaussian actor network.
pub struct ActorNetwork {
    vs: nn::VarStore,
    encoder: nn::Sequential,
    mean: nn::Linear,
    log_std: Tensor,
}

impl ActorNetwork {
    /// Creates an actor for observations of `shape = [x, y, channels]`.
    pub fn new(shape: [usize; 3], device: Device) -> Result<Self, ExperimentError> {
        let vs = nn::VarStore::new(device);
        let p = &vs.root();
        let encoder = encoder(&(p / "encoder"), shape)?;
        let mean = nn::linear(p / "mean", FEATURES, ACTION_DIM as i64, Default::default());
        let log_std = p.var(
            "log_std",
            &[ACTION_DIM as i64],
            nn::Init::Const(INITIAL_LOG_STD),
        );
        Ok(Self {
            vs,
            encoder,
            mean,
            log_std,
        })
    }

    /// Forward pass: returns the action mean `[batch, ACTION_DIM]`.
    pub fn forward(&self, obs: &Tensor) -> Tensor {
        self.mean.forward(&self.encoder.forward(obs))
    }

    /// Samples actions, or takes the mean when `explore` is false.
    ///
    /// Returns `(actions, log_probs)`.
    pub fn sample_actions(&self, obs: &Tensor, explore: bool) -> (Tensor, Tensor) {
        let mean = self.forward(obs);
        let actions = if explore {
            &mean + mean.randn_like() * self.log_std.exp()
        } else {
            mean.shallow_clone()
        };
        let log_probs = self.gaussian_log_prob(&mean, &actions);
        (actions, log_probs)
    }

    /// Log-density of `actions` under the current policy, `[batch]`.
    pub fn log_prob(&self, obs: &Tensor, actions: &Tensor) -> Tensor {
        let mean = self.forward(obs);
        self.gaussian_log_prob(&mean, actions)
    }

    /// Entropy of the (state independent) action distribution.
    pub fn entropy(&self) -> Tensor {
        (&self.log_std + 0.5 + LOG_SQRT_2PI).sum(Kind::Float)
    }

    fn gaussian_log_prob(&self, mean: &Tensor, actions: &Tensor) -> Tensor {
        let var = (&self.log_std * 2.0).exp();
        let per_dim = -(actions - mean).pow_tensor_scalar(2) / (var * 2.0) - &self.log_std - LOG_SQRT_2PI;
        per_dim.sum_dim_intlist([-1i64].as_slice(), false, Kind::Float)
    }

    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }
}

/// Value network with its own encoder.
pub struct CriticNetwork {
    vs: nn::VarStore,
    net: nn::Sequential,
}

impl CriticNetwork {
    pub fn new(shape: [usize; 3], device: Device) -> Result<Self, ExperimentError> {
        let vs = nn::VarStore::new(device);
        let p = &vs.root();
        let net = encoder(&(p / "encoder"), shape)?.add(nn::linear(
            p / "value",
            FEATURES,
            1,
            Default::default(),
        ));
        Ok(Self { vs, net })
    }

    /// Forward pass: returns the state value estimate `[batch]`.
    pub fn forward(&self, obs: &Tensor) -> Tensor {
        self.net.forward(obs).squeeze_dim(-1)
    }

    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }
}

/// Actor-critic policy implementing [`Policy`].
///
/// Samples from the Gaussian while exploring, otherwise returns its mean.
pub struct NeuralPolicy {
    actor: ActorNetwork,
    critic: CriticNetwork,
    explore: bool,
    device: Device,
}

impl NeuralPolicy {
    /// Creates a freshly initialised policy for observations of `shape`.
    pub fn new(shape: [usize; 3], device: Device) -> Result<Self, ExperimentError> {
        Ok(Self {
            actor: ActorNetwork::new(shape, device)?,
            critic: CriticNetwork::new(shape, device)?,
            explore: true,
            device,
        })
    }

    pub fn set_explore(&mut self, explore: bool) {
        self.explore = explore;
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn actor(&self) -> &ActorNetwork {
        &self.actor
    }

    pub fn actor_mut(&mut self) -> &mut ActorNetwork {
        &mut self.actor
    }

    pub fn critic(&self) -> &CriticNetwork {
        &self.critic
    }

    pub fn critic_mut(&mut self) -> &mut CriticNetwork {
        &mut self.critic
    }

    /// Writes actor and critic weights as `actor.ot` and `critic.ot` in `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), ExperimentError> {
        self.actor.var_store().save(dir.join("actor.ot"))?;
        self.critic.var_store().save(dir.join("critic.ot"))?;
        Ok(())
    }

    /// Loads weights written by [`NeuralPolicy::save`], or a bare actor
    /// weights file such as an exported state dict.
    pub fn load(&mut self, path: &Path) -> Result<(), ExperimentError> {
        if path.is_dir() {
            self.actor.var_store_mut().load(path.join("actor.ot"))?;
            let critic = path.join("critic.ot");
            if critic.exists() {
                self.critic.var_store_mut().load(critic)?;
            }
        } else {
            self.actor.var_store_mut().load(path)?;
        }
        Ok(())
    }

    /// Writes the actor weights alone, for inference elsewhere.
    pub fn export_actor(&self, path: &Path) -> Result<(), ExperimentError> {
        self.actor.var_store().save(path)?;
        Ok(())
    }
}

impl Policy for NeuralPolicy {
    fn act(&mut self, observation: &Observation) -> PolicyOutput {
        let obs = batch_observations(&[observation], self.device);
        tch::no_grad(|| {
            let (actions, log_probs) = self.actor.sample_actions(&obs, self.explore);
            let value = self.critic.forward(&obs).double_value(&[0]);
            let mut action = [0.0; ACTION_DIM];
            for (i, a) in action.iter_mut().enumerate() {
                *a = actions.double_value(&[0, i as i64]) as f32;
            }
            PolicyOutput {
                action,
                log_prob: log_probs.double_value(&[0]),
                value,
            }
        })
    }

    fn value(&mut self, observation: &Observation) -> f64 {
        let obs = batch_observations(&[observation], self.device);
        tch::no_grad(|| self.critic.forward(&obs).double_value(&[0]))
    }

    fn name(&self) -> &str {
        "neural"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPE: [usize; 3] = [16, 12, 18];

    #[test]
    fn actor_forward_shape() {
        let actor = ActorNetwork::new(SHAPE, Device::Cpu).unwrap();
        let obs = Tensor::rand([4, 18, 12, 16], (Kind::Float, Device::Cpu));
        assert_eq!(actor.forward(&obs).size(), &[4, 3]);
        let (actions, log_probs) = actor.sample_actions(&obs, true);
        assert_eq!(actions.size(), &[4, 3]);
        assert_eq!(log_probs.size(), &[4]);
    }

    #[test]
    fn critic_forward_shape() {
        let critic = CriticNetwork::new(SHAPE, Device::Cpu).unwrap();
        let obs = Tensor::rand([5, 18, 12, 16], (Kind::Float, Device::Cpu));
        assert_eq!(critic.forward(&obs).size(), &[5]);
    }

    #[test]
    fn batch_layout_is_channels_first() {
        let mut obs = Observation::zeros(SHAPE);
        // x = 2, y = 1, channel = 4
        let idx = (2 * 12 + 1) * 18 + 4;
        obs.data[idx] = 255;
        let t = batch_observations(&[&obs], Device::Cpu);
        assert_eq!(t.size(), &[1, 18, 12, 16]);
        assert!((t.double_value(&[0, 4, 1, 2]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn deterministic_policy_repeats_itself() {
        let mut policy = NeuralPolicy::new(SHAPE, Device::Cpu).unwrap();
        policy.set_explore(false);
        let obs = Observation::zeros(SHAPE);
        let a = policy.act(&obs);
        let b = policy.act(&obs);
        assert_eq!(a.action, b.action);
    }

    #[test]
    fn tiny_images_are_rejected() {
        assert!(ActorNetwork::new([4, 4, 9], Device::Cpu).is_err());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let policy = NeuralPolicy::new(SHAPE, Device::Cpu).unwrap();
        policy.save(dir.path()).unwrap();
        let mut restored = NeuralPolicy::new(SHAPE, Device::Cpu).unwrap();
        restored.load(dir.path()).unwrap();
        restored.set_explore(false);
        let mut original = policy;
        original.set_explore(false);
        let obs = Observation::zeros(SHAPE);
        assert_eq!(original.act(&obs).action, restored.act(&obs).action);
    }
}
