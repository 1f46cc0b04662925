//! Fetches the raw CRL bytes from the distribution point.
//!
//! One bounded GET per invocation, no retries; the scheduler decides the
//! cadence. Errors are classified so the reporter can name the failure
//! kind, and every URL rendered into an error is scrubbed of userinfo
//! first.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use log::debug;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use thiserror::Error;

use crate::config::{CheckConfig, scrub_url};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("proxy could not be configured: {detail}")]
    Proxy { detail: String },
    #[error("request timed out after {timeout_secs}s: {url}")]
    TimedOut { url: String, timeout_secs: u64 },
    #[error("TLS failure while fetching {url}: {detail}")]
    Tls { url: String, detail: String },
    #[error("connection to {url} failed: {detail}")]
    Connection { url: String, detail: String },
    #[error("fetching {url} failed: {detail}")]
    Transport { url: String, detail: String },
    #[error("{url} answered with HTTP {status}")]
    HttpStatus { url: String, status: StatusCode },
}

/// Raw payload plus the transport metadata of the request that carried it.
pub struct FetchedCrl {
    pub bytes: Vec<u8>,
    pub http_status: u16,
    pub elapsed: Duration,
}

/// Issue the GET against the configured distribution point.
pub fn fetch_crl(config: &CheckConfig) -> Result<FetchedCrl, FetchError> {
    let url = scrub_url(&config.url);

    let mut builder = Client::builder()
        .connect_timeout(config.timeout)
        .timeout(config.timeout)
        .user_agent(concat!("check_crl_url/", env!("CARGO_PKG_VERSION")));
    if let Some(proxy) = &config.proxy {
        debug!("routing through proxy {}", scrub_url(proxy));
        let proxy = reqwest::Proxy::all(proxy.as_str()).map_err(|err| FetchError::Proxy {
            detail: report(&err.without_url()),
        })?;
        builder = builder.proxy(proxy);
    }
    let client = builder.build().map_err(|err| FetchError::Transport {
        url: url.clone(),
        detail: report(&err.without_url()),
    })?;

    let start = Instant::now();
    let response = client
        .get(config.url.as_str())
        .send()
        .map_err(|err| classify_send_error(err, &url, config.timeout))?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus { url, status });
    }

    let bytes = response
        .bytes()
        .map_err(|err| classify_send_error(err, &url, config.timeout))?
        .to_vec();
    let elapsed = start.elapsed();
    debug!(
        "fetched {} bytes with HTTP {} in {:.3}s",
        bytes.len(),
        status.as_u16(),
        elapsed.as_secs_f64()
    );

    Ok(FetchedCrl {
        bytes,
        http_status: status.as_u16(),
        elapsed,
    })
}

fn classify_send_error(err: reqwest::Error, url: &str, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        return FetchError::TimedOut {
            url: url.to_string(),
            timeout_secs: timeout.as_secs(),
        };
    }
    let is_connect = err.is_connect();
    let detail = report(&err.without_url());
    if is_tls_failure(&detail) {
        FetchError::Tls {
            url: url.to_string(),
            detail,
        }
    } else if is_connect {
        FetchError::Connection {
            url: url.to_string(),
            detail,
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            detail,
        }
    }
}

// reqwest folds TLS problems into its generic error kinds; the source
// chain is the only place the distinction survives.
fn is_tls_failure(detail: &str) -> bool {
    let detail = detail.to_ascii_lowercase();
    ["tls", "certificate", "handshake"]
        .iter()
        .any(|needle| detail.contains(needle))
}

fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(source) = err.source() {
        let _ = write!(s, ": {}", source);
        err = source;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_failures_are_recognised_in_source_chains() {
        assert!(is_tls_failure(
            "error trying to connect: invalid peer certificate: Expired"
        ));
        assert!(is_tls_failure("TLS handshake failed"));
        assert!(!is_tls_failure("connection refused"));
    }

    #[test]
    fn report_joins_the_source_chain() {
        use std::fmt;

        #[derive(Debug)]
        struct Inner;
        impl fmt::Display for Inner {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("connection refused")
            }
        }
        impl std::error::Error for Inner {}

        #[derive(Debug)]
        struct Outer(Inner);
        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("error sending request")
            }
        }
        impl std::error::Error for Outer {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        assert_eq!(
            report(&Outer(Inner)),
            "error sending request: connection refused"
        );
    }

    #[test]
    fn fetch_errors_render_one_line() {
        let err = FetchError::TimedOut {
            url: "https://pki.example.com/ca.crl".to_string(),
            timeout_secs: 10,
        };
        assert_eq!(
            err.to_string(),
            "request timed out after 10s: https://pki.example.com/ca.crl"
        );
    }
}
