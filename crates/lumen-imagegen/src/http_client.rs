use std::{sync::OnceLock, time::Duration};

use reqwest::{Client, header};

/// Upper bound for a single provider call
///
/// Each status check is its own call, so this never eats into the
/// overall polling budget of an async task.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Common HTTP client to reuse connections across generation providers
pub fn http_client() -> Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();

    CLIENT
        .get_or_init(|| {
            let mut headers = header::HeaderMap::new();
            headers.insert(header::CONNECTION, header::HeaderValue::from_static("keep-alive"));

            Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .pool_idle_timeout(Some(Duration::from_secs(30)))
                .tcp_nodelay(true)
                .tcp_keepalive(Some(Duration::from_secs(60)))
                .default_headers(headers)
                .build()
                .expect("Failed to build default HTTP client")
        })
        .clone()
}
