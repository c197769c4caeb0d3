//! Shared HTTP client
//!
//! One `reqwest::Client` serves both the caption API and the OAuth token
//! endpoint:
//! - TLS via rustls
//! - Brotli and Gzip compression (auto-negotiated)
//! - Connection pooling with keep-alive
//! - Bounded connect and request timeouts

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::{CaptionError, Result};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("capgrab/", env!("CARGO_PKG_VERSION"));

/// Build the client used for all upstream calls.
pub fn build_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        // Keep connections alive for the list -> download sequence
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .use_rustls_tls()
        .brotli(true)
        .gzip(true)
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(startup_error)?;

    debug!(user_agent = USER_AGENT, "HTTP client ready");
    Ok(client)
}

/// A client that cannot be built is a startup fault, not a network one.
fn startup_error(err: reqwest::Error) -> CaptionError {
    CaptionError::config(format!("failed to initialize HTTP client: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_carries_version() {
        assert!(USER_AGENT.starts_with("capgrab/"));
        assert!(USER_AGENT.len() > "capgrab/".len());
    }

    #[test]
    fn builder_failure_is_fatal_configuration_error() {
        let builder_err = Client::new().get("not a url").build().unwrap_err();
        let err = startup_error(builder_err);

        assert!(err.is_fatal());
        assert!(matches!(err, CaptionError::Configuration(_)));
        assert!(err.to_string().starts_with("configuration error: failed to initialize HTTP client"));
    }

    #[test]
    fn client_builds_offline() {
        assert!(build_client().is_ok());
    }
}
