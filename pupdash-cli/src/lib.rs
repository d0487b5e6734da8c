//! Backends and process plumbing shared by the `pupdash` binary and its tests.

pub mod client;
pub mod demo;
pub mod logging;

use std::sync::Arc;
use std::time::Duration;

use pupdash_core::DashConfig;
use pupdash_core::source::Api;

/// Chatter rate of the `--demo` backend.
pub const DEMO_TICK: Duration = Duration::from_millis(700);

/// The HTTP client for `config.base_url`, or the simulated supervisor.
pub fn connect(config: &DashConfig, demo: bool) -> anyhow::Result<Arc<dyn Api>> {
    if demo {
        return Ok(demo::DemoApi::spawn(DEMO_TICK));
    }
    let api = client::HttpApi::new(&config.base_url, config.request_timeout())?;
    Ok(Arc::new(api))
}
