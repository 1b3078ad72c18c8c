//! Reward distribution: applying quest and step rewards to the player
//! economy, with per-reward failure tracking and retries.

pub mod distributor;
pub mod history;
pub mod result;
pub mod validation;

pub use distributor::{RewardDistributor, RollFn};
pub use history::FailureRecord;
pub use result::{DistributedReward, FailedReward, RewardDistributionResult};
pub use validation::validate_reward;
