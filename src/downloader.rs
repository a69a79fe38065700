//! Download orchestration: proxy selection, bounded attempts, retries.

use crate::config::DownloaderConfig;
use crate::error::FetchError;
use crate::pool::ProxyPool;
use crate::request::{FetchOptions, FetchRequest, FetchResponse, RequestForm};
use crate::retry::Retrier;
use crate::source::ProxySource;

use log::{debug, error, warn};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::redirect;
use reqwest::{Client, Method, Proxy, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

const TIMEOUT_DEFAULT: Duration = Duration::from_secs(30);
const TIMEOUT_MAX: Duration = Duration::from_secs(120);
/// Slack on the outer guard so the transport's own deadline fires first in
/// the normal case; the guard only bounds pathological hangs.
const GUARD_SLACK: Duration = Duration::from_secs(1);
/// Connection-pool sizing for the shared client. The transport performs no
/// retries of its own; retries belong to the retrier alone.
const MAX_IDLE_PER_HOST: usize = 100;

/// Resilient download executor: rotates proxies from a bounded pool, bounds
/// every attempt with a cancellable timeout, and retries failures with
/// multiplicative backoff.
pub struct Downloader {
    client: Client,
    pool: Option<Arc<ProxyPool>>,
    timeout: Duration,
    default_headers: HeaderMap,
    retrier: Retrier,
    cookie_enabled: bool,
    allow_redirects: bool,
}

impl Downloader {
    /// Build the shared transport and, in proxy mode, prime the pool with an
    /// initial batch from `source`.
    pub async fn new(
        config: DownloaderConfig,
        source: Arc<dyn ProxySource>,
    ) -> Result<Self, FetchError> {
        let timeout = clamp_timeout(config.timeout);
        let mut default_headers = HeaderMap::new();
        if let Ok(agent) = HeaderValue::from_str(&config.user_agent) {
            default_headers.insert(USER_AGENT, agent);
        }
        let client =
            client_builder(config.cookie_enabled, config.allow_redirects, timeout).build()?;
        let pool = if config.proxy_enabled {
            let pool = Arc::new(ProxyPool::new(
                config.pool_capacity,
                config.max_reuse,
                source,
            ));
            pool.prime().await;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            client,
            pool,
            timeout,
            default_headers,
            retrier: Retrier::new(config.retry_tries, config.retry_delay, config.retry_backoff),
            cookie_enabled: config.cookie_enabled,
            allow_redirects: config.allow_redirects,
        })
    }

    /// Perform one logical download. Failures are retried per the configured
    /// policy; once the budget is spent the error is logged and the call
    /// resolves to `None`. Callers needing the failure kind use
    /// [`try_download`](Self::try_download).
    pub async fn download(
        &self,
        request: impl Into<FetchRequest>,
        options: FetchOptions,
    ) -> Option<FetchResponse> {
        match self.try_download(request, options).await {
            Ok(response) => Some(response),
            Err(err) => {
                error!("download failed after retries: {}", err);
                None
            }
        }
    }

    /// Like [`download`](Self::download), but surfaces the final error.
    pub async fn try_download(
        &self,
        request: impl Into<FetchRequest>,
        options: FetchOptions,
    ) -> Result<FetchResponse, FetchError> {
        let request = request.into();
        self.retrier
            .run(|| self.attempt(&request, &options))
            .await
    }

    /// One attempt: acquire a proxy, execute under the timeout guard,
    /// classify, and settle the proxy's fate.
    async fn attempt(
        &self,
        request: &FetchRequest,
        options: &FetchOptions,
    ) -> Result<FetchResponse, FetchError> {
        let mut record = None;
        let mut proxy_identity = None;
        if let Some(pool) = &self.pool {
            let mut acquired = pool.acquire().await;
            match acquired.try_use() {
                Some((scheme, endpoint)) if !endpoint.is_empty() => {
                    proxy_identity = Some((scheme, endpoint));
                }
                _ => debug!("no proxy available, connecting directly"),
            }
            record = Some(acquired);
        }

        let timeout = clamp_timeout(options.timeout.unwrap_or(self.timeout));
        let result = self
            .execute(request, options, proxy_identity.as_ref(), timeout)
            .await;

        match result {
            Ok(mut response) => {
                if let (Some(pool), Some(used)) = (&self.pool, record) {
                    pool.release(used);
                }
                response.proxy = proxy_identity;
                Ok(response)
            }
            Err(err) => {
                // A failed attempt condemns the proxy that served it: the
                // record is dropped, the endpoint lands in the blacklist,
                // and a substitute goes into the store for the next try.
                if let Some(pool) = &self.pool {
                    if let Some((_, endpoint)) = &proxy_identity {
                        let replacement = pool.blacklist(endpoint).await;
                        pool.release(replacement);
                    }
                }
                Err(err)
            }
        }
    }

    /// Send the request and drain the body under the outer guard, then
    /// classify the status code.
    async fn execute(
        &self,
        request: &FetchRequest,
        options: &FetchOptions,
        proxy: Option<&(String, String)>,
        timeout: Duration,
    ) -> Result<FetchResponse, FetchError> {
        let keep_status_code = keep_status_code(request, options);
        let builder = self.build_request(request, options, proxy, timeout)?;

        // Expiry cancels the in-flight call by dropping it; on every other
        // path the guard unwinds with the future.
        let outcome = time::timeout(timeout + GUARD_SLACK, async {
            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?.to_vec();
            Ok::<_, FetchError>((status, headers, body))
        })
        .await;

        let (status, headers, body) = match outcome {
            Ok(result) => result?,
            Err(_) => {
                warn!("attempt against {} exceeded the outer guard", request.url());
                return Err(FetchError::Timeout);
            }
        };

        classify_status(status, request.url(), keep_status_code)?;

        Ok(FetchResponse {
            status,
            headers,
            body,
            proxy: None,
        })
    }

    fn build_request(
        &self,
        request: &FetchRequest,
        options: &FetchOptions,
        proxy: Option<&(String, String)>,
        timeout: Duration,
    ) -> Result<reqwest::RequestBuilder, FetchError> {
        let client = match proxy {
            Some((scheme, endpoint)) => self.proxied_client(scheme, endpoint, timeout)?,
            None => self.client.clone(),
        };

        let form: Option<&RequestForm> = match request {
            FetchRequest::Form(form) => Some(form),
            FetchRequest::Url(_) => None,
        };

        // Structured request fields win over option fields.
        let params = form
            .and_then(|f| f.params.as_ref())
            .or(options.params.as_ref());
        let data = form.and_then(|f| f.data.as_ref()).or(options.data.as_ref());
        let json = form.and_then(|f| f.json.as_ref()).or(options.json.as_ref());

        let method = resolve_method(
            form.and_then(|f| f.method.clone()),
            data.is_some() || json.is_some(),
        );

        let mut headers = self.default_headers.clone();
        if let Some(extra) = &options.headers {
            merge_headers(&mut headers, extra);
        }
        if let Some(form) = form {
            merge_headers(&mut headers, &form.headers);
        }

        let mut builder = client
            .request(method, request.url())
            .headers(headers)
            .timeout(timeout);
        if let Some(params) = params {
            builder = builder.query(params);
        }
        if let Some(data) = data {
            builder = builder.form(data);
        }
        if let Some(json) = json {
            builder = builder.json(json);
        }
        Ok(builder)
    }

    /// Per-attempt client routing through the given proxy. The proxy applies
    /// to targets of its own scheme, matching the crawler's scheme-keyed
    /// proxy map; socks and friends apply to everything.
    fn proxied_client(
        &self,
        scheme: &str,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Client, FetchError> {
        let proxy_url = format!("{}://{}", scheme, endpoint);
        let proxy = match scheme {
            "http" => Proxy::http(&proxy_url),
            "https" => Proxy::https(&proxy_url),
            _ => Proxy::all(&proxy_url),
        }
        .map_err(|e| {
            warn!("failed to attach proxy {}: {}", proxy_url, e);
            FetchError::Unclassified(format!("invalid proxy {}: {}", proxy_url, e))
        })?;
        Ok(
            client_builder(self.cookie_enabled, self.allow_redirects, timeout)
                .proxy(proxy)
                .build()?,
        )
    }
}

fn client_builder(
    cookie_enabled: bool,
    allow_redirects: bool,
    timeout: Duration,
) -> reqwest::ClientBuilder {
    let mut builder = Client::builder()
        .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
        .timeout(timeout);
    if !allow_redirects {
        builder = builder.redirect(redirect::Policy::none());
    }
    if cookie_enabled {
        builder = builder.cookie_store(true);
    }
    builder
}

/// Per-request override wins, then the call options, then off.
fn keep_status_code(request: &FetchRequest, options: &FetchOptions) -> bool {
    match request {
        FetchRequest::Form(form) => form.keep_status_code,
        FetchRequest::Url(_) => None,
    }
    .or(options.keep_status_code)
    .unwrap_or(false)
}

/// Values outside (0, 120] seconds reset to the 30s default.
fn clamp_timeout(timeout: Duration) -> Duration {
    if timeout.is_zero() || timeout > TIMEOUT_MAX {
        TIMEOUT_DEFAULT
    } else {
        timeout
    }
}

/// Explicit method wins; otherwise POST when a body is present, else GET.
fn resolve_method(explicit: Option<Method>, has_body: bool) -> Method {
    match explicit {
        Some(method) => method,
        None if has_body => Method::POST,
        None => Method::GET,
    }
}

/// 200, 404 and 410 complete the attempt; everything else raises unless the
/// caller asked to keep the status.
fn classify_status(status: StatusCode, url: &str, keep_status_code: bool) -> Result<(), FetchError> {
    match status {
        StatusCode::OK => Ok(()),
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            warn!("download returned {} for {}", status, url);
            Ok(())
        }
        other => {
            warn!("download returned {} for {}", other, url);
            if keep_status_code {
                Ok(())
            } else {
                Err(FetchError::HttpStatus(other))
            }
        }
    }
}

fn merge_headers(base: &mut HeaderMap, extra: &HeaderMap) {
    for (name, value) in extra {
        base.insert(name, value.clone());
    }
}
