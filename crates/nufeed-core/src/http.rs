//! Shared HTTP agent for remote feed access.

use std::sync::LazyLock;
use std::time::Duration;

use ureq::Agent;

/// Process-wide agent with bounded timeouts so a hung upstream cannot block
/// its caller indefinitely.
pub(crate) static SHARED_AGENT: LazyLock<Agent> = LazyLock::new(|| {
    Agent::config_builder()
        .user_agent(concat!("nufeed/", env!("CARGO_PKG_VERSION")))
        .timeout_connect(Some(Duration::from_secs(5)))
        .timeout_global(Some(Duration::from_secs(30)))
        // Non-2xx responses surface through the status code, so a 404 can
        // read as "not found" instead of a transport error.
        .http_status_as_error(false)
        .build()
        .into()
});
