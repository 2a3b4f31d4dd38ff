use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use b2_config::b2_config;
use reqwest::{Response, StatusCode};
use reqwest_retry::{default_on_request_failure, default_on_request_success, Retryable};
use tokio_retry::strategy::{jitter, ExponentialBackoff, FixedInterval};
use tokio_retry::RetryIf;
use tracing::{error, info};

use crate::error::{B2ClientError, Result};
use crate::types::ApiErrorBody;

const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum RetryableRequestError {
    FatalError(B2ClientError),
    RetryableError(B2ClientError),
}

/// Runs one API call, retrying on transient failures.
///
/// Each attempt's outcome is classified as fatal or retryable; retryable
/// outcomes (rate limiting, request timeouts, temporary unavailability,
/// dropped connections) are retried after a backoff delay until the attempt
/// budget runs out, fatal ones are surfaced immediately. JSON API calls use
/// the exponential backoff defaults from configuration; part uploads use a
/// fixed delay with a single retry.
///
/// The backoff wait is an asynchronous sleep: dropping the returned future
/// during the wait abandons the retry.
pub struct RetryWrapper {
    max_attempts: usize,
    base_delay: Duration,
    fixed_delay: bool,
    api_tag: &'static str,
}

impl RetryWrapper {
    pub fn new(api_tag: &'static str) -> Self {
        Self {
            max_attempts: b2_config().client.retry_max_attempts,
            base_delay: b2_config().client.retry_base_delay,
            fixed_delay: false,
            api_tag,
        }
    }

    /// Number of retries allowed after the first attempt.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Wait exactly `delay` between attempts instead of backing off
    /// exponentially.
    pub fn with_fixed_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self.fixed_delay = true;
        self
    }

    /// Disable retries entirely; the first failure is final.
    pub fn no_retries(mut self) -> Self {
        self.max_attempts = 0;
        self
    }

    fn classify_request_error(&self, try_idx: usize, err: reqwest_middleware::Error) -> RetryableRequestError {
        let api = self.api_tag;
        let retriability = default_on_request_failure(&err);
        let client_err = B2ClientError::from(err);

        match retriability {
            Some(Retryable::Transient) => {
                info!("Retryable error: {api} api call failed (attempt {}): {client_err}", try_idx + 1);
                RetryableRequestError::RetryableError(client_err)
            },
            _ => {
                error!("Fatal error: {api} api call failed (attempt {}): {client_err}", try_idx + 1);
                RetryableRequestError::FatalError(client_err)
            },
        }
    }

    /// Check the response status, extracting the service's error body on
    /// failure. Reading the body consumes the response, so the response
    /// comes back only on success.
    async fn check_response(&self, try_idx: usize, resp: Response) -> std::result::Result<Response, RetryableRequestError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let retriability = default_on_request_success(&resp);

        let body = resp.bytes().await.unwrap_or_default();
        let (code, message) = match serde_json::from_slice::<ApiErrorBody>(&body) {
            Ok(parsed) => (parsed.code, parsed.message),
            Err(_) => ("unknown".to_string(), String::from_utf8_lossy(&body).into_owned()),
        };

        let api = self.api_tag;
        let client_err = B2ClientError::Api {
            api,
            status,
            code,
            message,
        };

        match retriability {
            Some(Retryable::Transient) => {
                info!("Retryable error: {api} api call failed (attempt {}): {client_err}", try_idx + 1);
                Err(RetryableRequestError::RetryableError(client_err))
            },
            _ => {
                error!("Fatal error: {api} api call failed (attempt {}): {client_err}", try_idx + 1);
                Err(RetryableRequestError::FatalError(client_err))
            },
        }
    }

    fn strategy(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        if self.fixed_delay {
            Box::new(FixedInterval::new(self.base_delay).take(self.max_attempts))
        } else {
            let base_ms = self.base_delay.as_millis().min(u64::MAX as u128) as u64;
            Box::new(
                ExponentialBackoff::from_millis(base_ms)
                    .max_delay(MAX_BACKOFF_DELAY)
                    .map(jitter)
                    .take(self.max_attempts),
            )
        }
    }

    /// Run a connection and process the result, retrying the whole request
    /// on transient errors or when `process_fn` reports a retryable one.
    ///
    /// `make_request` returns the future for one attempt; it is invoked once
    /// per attempt, so the request body it builds must be replayable.
    /// `process_fn` receives a success-status response and evaluates it into
    /// the final value, or into a `RetryableRequestError` deciding whether
    /// the whole request is retried from the start.
    pub async fn run_and_process<T, ReqFn, ReqFut, ProcFn, ProcFut>(
        self,
        make_request: ReqFn,
        process_fn: ProcFn,
    ) -> Result<T>
    where
        ReqFn: Fn() -> ReqFut + Send + Sync,
        ReqFut: Future<Output = std::result::Result<Response, reqwest_middleware::Error>> + Send,
        ProcFn: Fn(Response) -> ProcFut + Send + Sync,
        ProcFut: Future<Output = std::result::Result<T, RetryableRequestError>> + Send,
    {
        let strategy = self.strategy();

        info!(
            max_attempts = self.max_attempts,
            base_delay = ?self.base_delay,
            fixed_delay = self.fixed_delay,
            api = self.api_tag,
            "Retry strategy",
        );

        // Move self (which is consumable) into an arc that the per-attempt
        // closure can share.
        let self_ = Arc::new(self);
        let try_count = AtomicUsize::new(0);

        let retry_info = Arc::new((make_request, process_fn, try_count, self_.clone()));

        let result = RetryIf::spawn(
            strategy,
            move || {
                let retry_info = retry_info.clone();

                async move {
                    let (make_request, process_fn, try_count, self_) = retry_info.as_ref();

                    let resp_result = make_request().await;
                    let try_idx = try_count.fetch_add(1, Ordering::Relaxed);

                    // Check status codes for error conditions before handing
                    // the response to the processing function.
                    let checked_result = match resp_result {
                        Err(e) => Err(self_.classify_request_error(try_idx, e)),
                        Ok(resp) => self_.check_response(try_idx, resp).await,
                    };

                    match checked_result {
                        Ok(resp) => process_fn(resp).await,
                        Err(e) => Err(e),
                    }
                }
            },
            |err: &RetryableRequestError| matches!(err, RetryableRequestError::RetryableError(_)),
        )
        .await;

        match result {
            Ok(r) => Ok(r),
            Err(RetryableRequestError::FatalError(e)) => {
                // Already logged at classification time.
                Err(e)
            },
            Err(RetryableRequestError::RetryableError(e)) => {
                error!("No more retries; aborting: {e}");
                Err(e)
            },
        }
    }

    /// Run a connection and extract the final result as a JSON blob,
    /// retrying the whole request on transient errors or on an incomplete
    /// response body.
    pub async fn run_and_extract_json<JsonDest, ReqFn, ReqFut>(self, make_request: ReqFn) -> Result<JsonDest>
    where
        JsonDest: for<'de> serde::Deserialize<'de> + Send,
        ReqFn: Fn() -> ReqFut + Send + Sync,
        ReqFut: Future<Output = std::result::Result<Response, reqwest_middleware::Error>> + Send,
    {
        self.run_and_process(make_request, |resp: Response| async move {
            match resp.json::<JsonDest>().await {
                Ok(v) => Ok(v),
                Err(e) => {
                    if e.is_connect() || e.is_decode() || e.is_body() || e.is_timeout() {
                        // An incomplete or corrupted response, possibly a
                        // dropped connection. Presumably transient.
                        Err(RetryableRequestError::RetryableError(e.into()))
                    } else {
                        Err(RetryableRequestError::FatalError(e.into()))
                    }
                },
            }
        })
        .await
    }

    /// Run a connection and return the raw response, retrying on transient
    /// errors.
    pub async fn run<ReqFn, ReqFut>(self, make_request: ReqFn) -> Result<Response>
    where
        ReqFn: Fn() -> ReqFut + Send + Sync,
        ReqFut: Future<Output = std::result::Result<Response, reqwest_middleware::Error>> + Send,
    {
        self.run_and_process(make_request, |resp| async move { Ok(resp) }).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
    use serde::{Deserialize, Serialize};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn connection_wrapper(api: &'static str) -> RetryWrapper {
        RetryWrapper::new(api)
            .with_base_delay(Duration::from_millis(5))
            .with_max_attempts(3)
    }

    fn make_client() -> ClientWithMiddleware {
        ClientBuilder::new(reqwest::Client::new()).build()
    }

    async fn check_success_first_try(server: &MockServer) {
        let _guard = Mock::given(method("GET"))
            .and(path("/success"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let result = connection_wrapper("check_success_first_try")
            .run(move || {
                let url = format!("{}/success", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(&url).send()
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    async fn check_retry_then_success(server: &MockServer) {
        // First two return 500
        let _guard1 = Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount_as_scoped(server)
            .await;

        // Third returns 200
        let _guard2 = Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Recovered"))
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let result = connection_wrapper("check_retry_then_success")
            .run(move || {
                let url = format!("{}/flaky", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(url).send()
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(&result.unwrap().bytes().await.unwrap()[..], b"Recovered");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    async fn check_retry_limit_exceeded(server: &MockServer) {
        // Always return 503
        let _guard = Mock::given(method("GET"))
            .and(path("/fail"))
            .respond_with(ResponseTemplate::new(503))
            .expect(4) // 1 initial + 3 retries
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let result = connection_wrapper("check_retry_limit_exceeded")
            .with_max_attempts(3)
            .run(move || {
                let url = format!("{}/fail", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(&url).send()
            })
            .await;

        assert!(result.is_err());
        assert!(result.unwrap_err().is_transient());
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    async fn check_non_retryable_status(server: &MockServer) {
        // A 400 carrying a service error body; no retries.
        let _guard = Mock::given(method("GET"))
            .and(path("/bad_request"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "status": 400,
                "code": "bad_request",
                "message": "part number out of range"
            })))
            .expect(1)
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let result = connection_wrapper("check_non_retryable_status")
            .run(move || {
                let url = format!("{}/bad_request", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(&url).send()
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        match err {
            B2ClientError::Api { code, message, .. } => {
                assert_eq!(code, "bad_request");
                assert_eq!(message, "part number out of range");
            },
            other => panic!("unexpected error {other:?}"),
        }
    }

    async fn check_auth_failure_is_fatal(server: &MockServer) {
        let _guard = Mock::given(method("GET"))
            .and(path("/expired"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "status": 401,
                "code": "expired_auth_token",
                "message": "auth token expired"
            })))
            .expect(1)
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let result = connection_wrapper("check_auth_failure_is_fatal")
            .run(move || {
                let url = format!("{}/expired", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(&url).send()
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(err.is_auth());
        assert!(!err.is_transient());
    }

    async fn check_single_fixed_retry_bound(server: &MockServer) {
        // Always rate limited; a single fixed-delay retry means exactly two
        // attempts happen before the terminal error.
        let _guard = Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let result = RetryWrapper::new("check_single_fixed_retry_bound")
            .with_fixed_delay(Duration::from_millis(5))
            .with_max_attempts(1)
            .run(move || {
                let url = format!("{}/rate_limit", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(&url).send()
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    async fn check_no_retries(server: &MockServer) {
        let _guard = Mock::given(method("GET"))
            .and(path("/rate_limit_no_retry"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let result = RetryWrapper::new("check_no_retries")
            .no_retries()
            .run(move || {
                let url = format!("{}/rate_limit_no_retry", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(&url).send()
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct JsonData {
        text: String,
        number: u64,
    }

    async fn check_json_extraction(server: &MockServer) {
        let data = JsonData {
            text: "test".into(),
            number: 42,
        };

        let _guard = Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_json(&data))
            .expect(1)
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let ret_data: JsonData = connection_wrapper("check_json_extraction")
            .run_and_extract_json(move || {
                let url = format!("{}/json", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(&url).send()
            })
            .await
            .unwrap();

        assert_eq!(ret_data, data);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    async fn check_json_unexpected_eof_retry(server: &MockServer) {
        let data = JsonData {
            text: "test".into(),
            number: 42,
        };

        let json_data = serde_json::to_string(&data).unwrap();

        // First response truncated to simulate unexpected EOF
        let _guard1 = Mock::given(method("GET"))
            .and(path("/json_flaky"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_string(&json_data[..json_data.len() - 5]))
            .up_to_n_times(1)
            .mount_as_scoped(server)
            .await;

        // Second response with full data
        let _guard2 = Mock::given(method("GET"))
            .and(path("/json_flaky"))
            .respond_with(ResponseTemplate::new(StatusCode::OK).set_body_string(&json_data))
            .expect(1)
            .mount_as_scoped(server)
            .await;

        let client = make_client();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_ = counter.clone();
        let server_uri = server.uri();

        let ret_data: JsonData = connection_wrapper("check_json_unexpected_eof_retry")
            .run_and_extract_json(move || {
                let url = format!("{}/json_flaky", server_uri);
                counter_.fetch_add(1, Ordering::Relaxed);
                client.clone().get(&url).send()
            })
            .await
            .unwrap();

        assert_eq!(ret_data, data);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_wrapper() {
        let server = MockServer::start().await;

        // One server for every check below, with scoped mocks, to avoid
        // sporadic "Too many open files" errors from repeated server
        // startup.

        check_success_first_try(&server).await;
        check_retry_then_success(&server).await;
        check_retry_limit_exceeded(&server).await;
        check_non_retryable_status(&server).await;
        check_auth_failure_is_fatal(&server).await;
        check_single_fixed_retry_bound(&server).await;
        check_no_retries(&server).await;
        check_json_extraction(&server).await;
        check_json_unexpected_eof_retry(&server).await;
    }
}
