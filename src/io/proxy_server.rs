//! Same-origin lookup proxy
//!
//! Keeps the ABR GUID server-side and shares one in-memory cache between
//! all callers. Endpoints:
//! - `GET /api/search?q=` - ABR match-then-detail, record JSON
//! - `GET /api/geocode?address=` - Nominatim, `{lat, lon, label}`
//! - `GET /health`, `GET /metrics` (Prometheus text)
//!
//! Every response carries open CORS headers.

use crate::infra::cache::{cache_key, DEFAULT_TTL, TtlCache};
use crate::infra::metrics::{Endpoint, Metrics, MetricsSummary};
use crate::io::error::LookupError;
use crate::io::geocode::GeocodeClient;
use crate::io::http::{FetchText, RetryPolicy};
use crate::io::registry::abr::{self, AbrSettings, COURTESY_DELAY};
use crate::services::lookup::build_record;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use reqwest::Url;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const DEFAULT_PORT: u16 = 8788;

/// Error text of the 500 reply to a search when no GUID is configured
pub const GUID_MISSING: &str = "ABR_GUID missing on server";

const JSON: &str = "application/json";
const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Startup settings for the proxy
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    pub abr_base: String,
    pub abr_guid: Option<String>,
    pub nominatim_base: String,
    pub territory_keyword: String,
    pub cache_ttl: Duration,
    pub search_retry: RetryPolicy,
    pub geocode_retry: RetryPolicy,
    pub courtesy_delay: Duration,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            abr_base: "https://abr.business.gov.au/json".to_string(),
            abr_guid: None,
            nominatim_base: "https://nominatim.openstreetmap.org".to_string(),
            territory_keyword: String::new(),
            cache_ttl: DEFAULT_TTL,
            search_retry: RetryPolicy::with_base_delay(Duration::from_millis(600)),
            geocode_retry: RetryPolicy::with_base_delay(Duration::from_millis(800)),
            courtesy_delay: COURTESY_DELAY,
        }
    }
}

/// Shared by every connection
pub struct ProxyState {
    fetcher: Arc<dyn FetchText>,
    abr: AbrSettings,
    geocoder: GeocodeClient,
    cache: TtlCache,
    metrics: Arc<Metrics>,
    territory_keyword: String,
}

impl ProxyState {
    pub fn new(fetcher: Arc<dyn FetchText>, options: ProxyOptions, metrics: Arc<Metrics>) -> Self {
        Self {
            fetcher,
            abr: AbrSettings {
                base: options.abr_base,
                guid: options.abr_guid.filter(|g| !g.trim().is_empty()),
                retry: options.search_retry,
                courtesy_delay: options.courtesy_delay,
            },
            geocoder: GeocodeClient::Nominatim {
                base: options.nominatim_base,
                retry: options.geocode_retry,
            },
            cache: TtlCache::in_memory(options.cache_ttl),
            metrics,
            territory_keyword: options.territory_keyword,
        }
    }

    pub fn has_guid(&self) -> bool {
        self.abr.guid.is_some()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

fn respond(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    if !content_type.is_empty() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, OPTIONS"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(bytes) => respond(status, JSON, bytes),
        Err(e) => {
            error!(error = %e, "proxy_response_encode_failed");
            respond(StatusCode::INTERNAL_SERVER_ERROR, JSON, r#"{"error":"Server error"}"#)
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &json!({ "error": message }))
}

/// First value of a query-string parameter, percent-decoded
fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let url = Url::parse(&format!("http://proxy.local/?{}", uri.query()?)).ok()?;
    url.query_pairs().find(|(key, _)| key == name).map(|(_, value)| value.into_owned())
}

async fn handle_search(state: &ProxyState, query: &str) -> Response<Full<Bytes>> {
    state.metrics.record_request(Endpoint::Search);
    if !state.has_guid() {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, GUID_MISSING);
    }

    let key = cache_key("abr", query);
    if let Some(record) = state.cache.get(&key) {
        state.metrics.record_cache_hit(Endpoint::Search);
        debug!(key = %key, "proxy_search_cache_hit");
        return json_response(StatusCode::OK, &record);
    }

    match abr::lookup(state.fetcher.as_ref(), &state.abr, query).await {
        Ok(entity) => {
            let record = build_record(entity, &state.territory_keyword, None);
            match serde_json::to_value(&record) {
                Ok(value) => {
                    state.cache.set(&key, value.clone());
                    info!(query = %query, name = %record.name(), "proxy_search_ok");
                    json_response(StatusCode::OK, &value)
                }
                Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
            }
        }
        Err(e @ LookupError::NoMatch(_)) => {
            state.metrics.record_not_found(Endpoint::Search);
            error_response(StatusCode::NOT_FOUND, &e.to_string())
        }
        Err(LookupError::MissingCredential(_)) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, GUID_MISSING)
        }
        Err(e) => {
            state.metrics.record_upstream_error(Endpoint::Search);
            warn!(query = %query, error = %e, kind = %e.kind(), "proxy_search_failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn handle_geocode(state: &ProxyState, address: &str) -> Response<Full<Bytes>> {
    state.metrics.record_request(Endpoint::Geocode);
    let key = cache_key("geo", address);
    if let Some(point) = state.cache.get(&key) {
        state.metrics.record_cache_hit(Endpoint::Geocode);
        debug!(key = %key, "proxy_geocode_cache_hit");
        return json_response(StatusCode::OK, &point);
    }

    match state.geocoder.geocode(state.fetcher.as_ref(), address).await {
        Ok(Some(point)) => {
            state.cache.set_as(&key, &point);
            json_response(StatusCode::OK, &point)
        }
        Ok(None) => {
            state.metrics.record_not_found(Endpoint::Geocode);
            error_response(StatusCode::NOT_FOUND, "No geocode result")
        }
        Err(e) => {
            state.metrics.record_upstream_error(Endpoint::Geocode);
            warn!(address = %address, error = %e, kind = %e.kind(), "proxy_geocode_failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// Route one request. Split from `handle_request` so it can be driven without a socket.
async fn route(method: &Method, uri: &Uri, state: &ProxyState) -> Response<Full<Bytes>> {
    if method == Method::OPTIONS {
        return respond(StatusCode::NO_CONTENT, "", Bytes::new());
    }

    match uri.path() {
        "/api/search" => match query_param(uri, "q").filter(|q| !q.trim().is_empty()) {
            Some(q) => handle_search(state, q.trim()).await,
            None => {
                state.metrics.record_bad_request();
                error_response(StatusCode::BAD_REQUEST, "Missing q")
            }
        },
        "/api/geocode" => match query_param(uri, "address").filter(|a| !a.trim().is_empty()) {
            Some(address) => handle_geocode(state, address.trim()).await,
            None => {
                state.metrics.record_bad_request();
                error_response(StatusCode::BAD_REQUEST, "Missing address")
            }
        },
        "/health" => respond(StatusCode::OK, "text/plain", "ok"),
        "/metrics" => respond(
            StatusCode::OK,
            PROMETHEUS_TEXT,
            format_prometheus_metrics(&state.metrics.report()),
        ),
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<ProxyState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = route(req.method(), req.uri(), &state).await;
    debug!(
        method = %req.method(),
        path = %req.uri().path(),
        status = response.status().as_u16(),
        "proxy_request"
    );
    Ok(response)
}

enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write one metric with a sample per endpoint
fn write_endpoint_metric(output: &mut String, name: &str, help: &str, samples: [(Endpoint, u64); 2]) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", MetricType::Counter.as_str());
    for (endpoint, val) in samples {
        let _ = writeln!(output, "{name}{{endpoint=\"{}\"}} {val}", endpoint.as_str());
    }
}

fn write_metric(output: &mut String, name: &str, help: &str, typ: MetricType, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name} {val}");
}

/// Format counters in Prometheus text exposition format
fn format_prometheus_metrics(summary: &MetricsSummary) -> String {
    let (s, g) = (&summary.search, &summary.geocode);
    let mut output = String::with_capacity(2048);

    write_endpoint_metric(
        &mut output,
        "office_locator_requests_total",
        "Valid lookup requests",
        [(Endpoint::Search, s.requests), (Endpoint::Geocode, g.requests)],
    );
    write_endpoint_metric(
        &mut output,
        "office_locator_cache_hits_total",
        "Lookups served from cache",
        [(Endpoint::Search, s.cache_hits), (Endpoint::Geocode, g.cache_hits)],
    );
    write_endpoint_metric(
        &mut output,
        "office_locator_cache_misses_total",
        "Lookups that went upstream",
        [
            (Endpoint::Search, s.requests.saturating_sub(s.cache_hits)),
            (Endpoint::Geocode, g.requests.saturating_sub(g.cache_hits)),
        ],
    );
    write_endpoint_metric(
        &mut output,
        "office_locator_not_found_total",
        "Lookups with no upstream match",
        [(Endpoint::Search, s.not_found), (Endpoint::Geocode, g.not_found)],
    );
    write_endpoint_metric(
        &mut output,
        "office_locator_upstream_errors_total",
        "Lookups failed by upstream status, transport or reply shape",
        [(Endpoint::Search, s.upstream_errors), (Endpoint::Geocode, g.upstream_errors)],
    );
    write_metric(
        &mut output,
        "office_locator_bad_requests_total",
        "Requests missing a required parameter",
        MetricType::Counter,
        summary.bad_requests,
    );
    write_metric(
        &mut output,
        "office_locator_uptime_seconds",
        "Seconds since startup",
        MetricType::Gauge,
        summary.uptime_secs,
    );

    output
}

/// Serve connections from `listener` until `shutdown` flips to true
pub async fn serve(
    listener: TcpListener,
    state: Arc<ProxyState>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let state = state.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move { handle_request(req, state).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "proxy_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "proxy_accept_error");
                    }
                }
            }
            changed = shutdown.changed() => {
                // A dropped sender also ends the server
                if changed.is_err() || *shutdown.borrow() {
                    info!("proxy_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

/// Bind `0.0.0.0:port` and serve until shutdown
pub async fn start_proxy_server(
    port: u16,
    state: Arc<ProxyState>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = %port, guid_configured = state.has_guid(), "proxy_server_started");
    if !state.has_guid() {
        warn!("abr_guid_missing_search_disabled");
    }

    serve(listener, state, shutdown).await?;
    Ok(())
}
