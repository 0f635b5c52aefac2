mod goal;
mod version;

pub use goal::{GoalOptions, cmd_goal};
pub use version::cmd_version;
