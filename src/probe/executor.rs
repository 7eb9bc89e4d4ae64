use super::{Executor, ProbeOutcome, ProbeSettings};
use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONNECTION, USER_AGENT};
use reqwest::{Client, StatusCode, redirect};
use std::fmt::Write;
use std::time::{Duration, Instant};
use tokio::time::sleep;

pub const BACKOFF_UNIT: Duration = Duration::from_millis(1000);

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGES: &str = "zh-CN,zh;q=0.9,en;q=0.8";

/// Delay before the `retry`-th retry (1-indexed). Linear in the retry number.
pub fn backoff_delay(retry: u32, unit: Duration) -> Duration {
    unit * retry
}

/// GET prober built on reqwest. Redirects are not followed, so a 3xx is a
/// failed probe like any other non-2xx status.
pub struct HttpExecutor {
    client: Client,
    backoff_unit: Duration,
}

impl HttpExecutor {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            backoff_unit: BACKOFF_UNIT,
        })
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// One request. The timeout covers everything up to the end of the body.
    async fn attempt(&self, url: &str, settings: &ProbeSettings) -> reqwest::Result<(StatusCode, usize)> {
        let res = self
            .client
            .get(url)
            .timeout(settings.timeout)
            .header(USER_AGENT, settings.user_agent.as_str())
            .header(ACCEPT, ACCEPT_HTML)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGES)
            .header(CONNECTION, "keep-alive")
            .send()
            .await?;

        let status = res.status();
        let body = res.bytes().await?;
        log::debug!("{} answered {} with {} bytes", url, status, body.len());

        Ok((status, body.len()))
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(&self, url: &str, settings: &ProbeSettings) -> ProbeOutcome {
        let mut elapsed = Duration::ZERO;
        let mut retries = 0;

        loop {
            let start = Instant::now();
            let result = self.attempt(url, settings).await;
            elapsed += start.elapsed();

            match result {
                Ok((status, length)) => {
                    return ProbeOutcome::completed(url, status.as_u16(), length, elapsed, retries + 1);
                }
                Err(e) if retries < settings.max_retries => {
                    retries += 1;
                    let delay = backoff_delay(retries, self.backoff_unit);
                    log::warn!(
                        "Request to {} failed, retry {}/{} in {}ms: {}",
                        url,
                        retries,
                        settings.max_retries,
                        delay.as_millis(),
                        describe(&e)
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    return ProbeOutcome::unreachable(url, describe(&e), elapsed, retries + 1);
                }
            }
        }
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return "Request timeout".to_string();
    }

    let mut s = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let _ = write!(s, ": {}", cause);
        source = cause.source();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeResult;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(timeout_ms: u64, max_retries: u32) -> ProbeSettings {
        ProbeSettings {
            timeout: Duration::from_millis(timeout_ms),
            max_retries,
            user_agent: "keepalive-test/1.0".to_string(),
        }
    }

    fn executor() -> HttpExecutor {
        HttpExecutor::new()
            .unwrap()
            .with_backoff_unit(Duration::from_millis(5))
    }

    #[test]
    fn backoff_grows_linearly() {
        assert_eq!(backoff_delay(1, BACKOFF_UNIT), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2, BACKOFF_UNIT), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3, BACKOFF_UNIT), Duration::from_millis(3000));
        assert!((1..10).all(|k| backoff_delay(k, BACKOFF_UNIT) < backoff_delay(k + 1, BACKOFF_UNIT)));
    }

    #[tokio::test]
    async fn success_drains_body_and_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("user-agent", "keepalive-test/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/", server.uri());
        let outcome = executor().execute(&url, &settings(1_000, 3)).await;

        assert_eq!(
            outcome.result,
            ProbeResult::Success {
                status: 200,
                response_length: 5
            }
        );
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.url, url);

        let requests = server.received_requests().await.unwrap();
        let headers = &requests[0].headers;
        assert_eq!(headers.get("accept").unwrap().to_str().unwrap(), ACCEPT_HTML);
        assert_eq!(headers.get("accept-language").unwrap().to_str().unwrap(), ACCEPT_LANGUAGES);
    }

    #[tokio::test]
    async fn error_status_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = executor().execute(&server.uri(), &settings(1_000, 3)).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.status(), Some(500));
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn redirect_is_a_failed_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/elsewhere"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = executor().execute(&server.uri(), &settings(1_000, 3)).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.status(), Some(302));
    }

    #[tokio::test]
    async fn timeouts_are_retried_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .expect(3)
            .mount(&server)
            .await;

        let outcome = executor().execute(&server.uri(), &settings(50, 2)).await;

        assert_eq!(
            outcome.result,
            ProbeResult::Failure {
                status: None,
                error: "Request timeout".to_string()
            }
        );
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.duration_ms >= 150);
    }

    #[tokio::test]
    async fn connection_errors_use_max_retries_plus_one_attempts() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{}/", addr);
        let unit = Duration::from_millis(20);
        let executor = HttpExecutor::new().unwrap().with_backoff_unit(unit);

        let started = Instant::now();
        let outcome = executor.execute(&url, &settings(1_000, 3)).await;
        let wall = started.elapsed();

        assert!(!outcome.is_success());
        assert_eq!(outcome.status(), None);
        assert_eq!(outcome.attempts, 4);
        assert!(!outcome.error().unwrap().is_empty());
        // sleeps of 1, 2 and 3 units between the four attempts
        assert!(wall >= unit * 6, "finished after {:?}", wall);
    }

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = executor().execute(&server.uri(), &settings(50, 0)).await;

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.error(), Some("Request timeout"));
    }
}
