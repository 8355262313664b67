//! Shared request/retry plumbing for marketplace clients.

use super::DataSourceError;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use rand::Rng;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Per-request client timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound on time spent retrying one request.
pub const MAX_RETRY_ELAPSED: Duration = Duration::from_secs(60);

pub fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Send a request and decode its JSON body, retrying transient failures.
///
/// `make_request` is called once per attempt so signed requests can pick
/// up a fresh nonce. 429 and 5xx responses are retried with exponential
/// backoff; other non-success statuses and decode failures are not.
pub async fn send_json<T, F>(make_request: F) -> Result<T, DataSourceError>
where
    T: DeserializeOwned,
    F: Fn() -> Result<RequestBuilder, DataSourceError>,
{
    let backoff = ExponentialBackoff {
        initial_interval: Duration::from_secs(1),
        max_elapsed_time: Some(MAX_RETRY_ELAPSED),
        ..Default::default()
    };

    retry(backoff, || async {
        let request = make_request().map_err(backoff::Error::permanent)?;
        let response = request.send().await.map_err(|e| {
            backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
        })?;

        let status = response.status();
        if status == 429 {
            return Err(backoff::Error::transient(DataSourceError::RateLimited));
        }
        if status.is_server_error() {
            return Err(backoff::Error::transient(DataSourceError::HttpError {
                status: status.as_u16(),
                message: "Server error".to_string(),
            }));
        }
        if status == 401 || status == 403 {
            return Err(backoff::Error::permanent(DataSourceError::Auth(format!(
                "rejected with status {}",
                status.as_u16()
            ))));
        }
        if !status.is_success() {
            return Err(backoff::Error::permanent(DataSourceError::HttpError {
                status: status.as_u16(),
                message: "Client error".to_string(),
            }));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
    })
    .await
}

/// Apply configured header pairs to a request.
pub fn with_headers(mut request: RequestBuilder, headers: &HashMap<String, String>) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

/// Render a cookie map as a `Cookie` header value, sorted by name.
pub fn cookie_header(cookies: &HashMap<String, String>) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    let mut pairs: Vec<_> = cookies.iter().collect();
    pairs.sort();
    Some(
        pairs
            .into_iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Apply headers and cookies to a request.
pub fn with_session(
    request: RequestBuilder,
    headers: &HashMap<String, String>,
    cookies: &HashMap<String, String>,
) -> RequestBuilder {
    let request = with_headers(request, headers);
    match cookie_header(cookies) {
        Some(cookie) => request.header(reqwest::header::COOKIE, cookie),
        None => request,
    }
}

/// Delay between history pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDelay {
    pub base: Duration,
    pub jitter: Duration,
}

impl PageDelay {
    pub const fn fixed(base: Duration) -> Self {
        Self {
            base,
            jitter: Duration::ZERO,
        }
    }

    pub const fn jittered(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    pub const fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn next(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base;
        }
        self.base + Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    }

    pub async fn sleep(&self) {
        let delay = self.next();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// A JSON scalar some APIs send as a number on one endpoint and a string
/// on another.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FlexScalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FlexScalar {
    pub fn to_id_string(&self) -> String {
        match self {
            FlexScalar::Int(v) => v.to_string(),
            FlexScalar::Float(v) => v.to_string(),
            FlexScalar::Text(v) => v.clone(),
        }
    }

    /// Numeric value; blank text is `None`.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            FlexScalar::Int(v) => Some(*v as f64),
            FlexScalar::Float(v) => Some(*v),
            FlexScalar::Text(v) if v.trim().is_empty() => None,
            FlexScalar::Text(v) => v.trim().parse().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_header_sorted() {
        let mut cookies = HashMap::new();
        cookies.insert("session".to_string(), "abc".to_string());
        cookies.insert("csrf".to_string(), "xyz".to_string());
        assert_eq!(cookie_header(&cookies).unwrap(), "csrf=xyz; session=abc");
        assert_eq!(cookie_header(&HashMap::new()), None);
    }

    #[test]
    fn test_flex_scalar_accepts_numbers_and_strings() {
        let values: Vec<FlexScalar> =
            serde_json::from_str(r#"[123, "456", 0.25, "0.5", ""]"#).unwrap();
        assert_eq!(values[0].to_id_string(), "123");
        assert_eq!(values[1].to_id_string(), "456");
        assert_eq!(values[2].to_f64(), Some(0.25));
        assert_eq!(values[3].to_f64(), Some(0.5));
        assert_eq!(values[4].to_f64(), None);
    }

    #[test]
    fn test_page_delay_jitter_bounds() {
        let delay = PageDelay::jittered(Duration::from_millis(3000), Duration::from_millis(1500));
        for _ in 0..50 {
            let d = delay.next();
            assert!(d >= Duration::from_millis(3000));
            assert!(d < Duration::from_millis(4500));
        }
        assert_eq!(PageDelay::none().next(), Duration::ZERO);
    }
}
