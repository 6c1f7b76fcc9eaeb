//! Policy trait and implementations.

#[cfg(feature = "rl-nn")]
pub mod network;
pub mod random;
pub mod trait_;

#[cfg(feature = "rl-nn")]
pub use network::{ActorNetwork, CriticNetwork, NeuralPolicy};
pub use random::RandomPolicy;
pub use trait_::{Policy, PolicyOutput};
