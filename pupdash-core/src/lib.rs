pub mod config;
pub mod model;

// Fetching and presentation seams
pub mod render;
pub mod source;
pub mod store;

// Pure view logic
pub mod filter;
pub mod projector;

// Live sync: timers, actions, and the session that ties them together
pub mod dispatcher;
pub mod scheduler;
pub mod session;

#[cfg(test)]
mod testing;

pub use config::DashConfig;
pub use dispatcher::DispatchOutcome;
pub use session::{Dashboard, Intervals};
