//! Address geocoding via Nominatim, directly or through the proxy

use crate::domain::company::GeoPoint;
use crate::infra::config::Config;
use crate::io::error::LookupError;
use crate::io::http::{build_url, parse_json, str_field, FetchText, RetryPolicy, TextRequest};
use serde_json::Value;

const NOMINATIM_ENDPOINT: &str = "nominatim_search";
const PROXY_ENDPOINT: &str = "proxy_geocode";

#[derive(Debug, Clone)]
pub enum GeocodeClient {
    Nominatim { base: String, retry: RetryPolicy },
    Proxied { base: String, retry: RetryPolicy },
}

impl GeocodeClient {
    /// Geocode through the proxy when one is configured, else Nominatim directly
    pub fn from_config(config: &Config) -> Self {
        let retry = RetryPolicy::with_base_delay(config.retry_base());
        match config.proxy_base() {
            Some(base) => GeocodeClient::Proxied { base: base.to_string(), retry },
            None => GeocodeClient::Nominatim { base: config.nominatim_base().to_string(), retry },
        }
    }

    /// `Ok(None)` for an empty address or an empty result set
    pub async fn geocode(
        &self,
        fetcher: &dyn FetchText,
        address: &str,
    ) -> Result<Option<GeoPoint>, LookupError> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(None);
        }

        match self {
            GeocodeClient::Nominatim { base, retry } => {
                let url = build_url(
                    base,
                    "/search",
                    &[("format", "json"), ("q", address), ("limit", "1")],
                )?;
                let request = TextRequest::new(NOMINATIM_ENDPOINT, url, *retry)
                    .header("Accept-Language", "en");
                let body = fetcher.get_text(&request).await?;
                parse_nominatim(&parse_json(NOMINATIM_ENDPOINT, &body)?)
            }
            GeocodeClient::Proxied { base, retry } => {
                let url = build_url(base, "/api/geocode", &[("address", address)])?;
                let request = TextRequest::new(PROXY_ENDPOINT, url, *retry);
                match fetcher.get_text(&request).await {
                    Ok(body) => parse_point(PROXY_ENDPOINT, &parse_json(PROXY_ENDPOINT, &body)?).map(Some),
                    Err(LookupError::Status { status: 404, .. }) => Ok(None),
                    Err(e) => Err(e),
                }
            }
        }
    }
}

/// First hit of a Nominatim `search` reply
pub fn parse_nominatim(reply: &Value) -> Result<Option<GeoPoint>, LookupError> {
    let Some(hits) = reply.as_array() else {
        return Err(LookupError::shape(NOMINATIM_ENDPOINT, "reply is not an array"));
    };
    let Some(hit) = hits.first() else {
        return Ok(None);
    };

    let lat = coordinate(hit, "lat")
        .ok_or_else(|| LookupError::shape(NOMINATIM_ENDPOINT, "unparseable lat"))?;
    let lon = coordinate(hit, "lon")
        .ok_or_else(|| LookupError::shape(NOMINATIM_ENDPOINT, "unparseable lon"))?;
    let label = str_field(hit, "display_name").unwrap_or_default().to_string();
    Ok(Some(GeoPoint { lat, lon, label }))
}

/// `{lat, lon, label}` as served by the proxy
fn parse_point(endpoint: &'static str, value: &Value) -> Result<GeoPoint, LookupError> {
    let lat = coordinate(value, "lat").ok_or_else(|| LookupError::shape(endpoint, "unparseable lat"))?;
    let lon = coordinate(value, "lon").ok_or_else(|| LookupError::shape(endpoint, "unparseable lon"))?;
    let label = str_field(value, "label").unwrap_or_default().to_string();
    Ok(GeoPoint { lat, lon, label })
}

/// Coordinates arrive as strings from Nominatim and as numbers from the proxy
fn coordinate(value: &Value, key: &str) -> Option<f64> {
    let parsed = match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::http::fake::ScriptedFetcher;
    use serde_json::json;
    use std::time::Duration;

    fn no_retry() -> RetryPolicy {
        RetryPolicy { attempts: 1, base_delay: Duration::ZERO, max_jitter: Duration::ZERO }
    }

    #[test]
    fn test_parse_nominatim_first_hit() {
        let reply = json!([
            { "lat": "-33.8688", "lon": "151.2093", "display_name": "Sydney, NSW, Australia" },
            { "lat": "0", "lon": "0" }
        ]);
        let point = parse_nominatim(&reply).unwrap().unwrap();
        assert!((point.lat + 33.8688).abs() < 1e-9);
        assert!((point.lon - 151.2093).abs() < 1e-9);
        assert_eq!(point.label, "Sydney, NSW, Australia");
    }

    #[test]
    fn test_parse_nominatim_empty_is_none() {
        assert_eq!(parse_nominatim(&json!([])).unwrap(), None);
    }

    #[test]
    fn test_parse_nominatim_bad_coordinates() {
        let err = parse_nominatim(&json!([{ "lat": "north", "lon": "1" }])).unwrap_err();
        assert!(err.is_upstream());
        assert!(parse_nominatim(&json!({ "error": "x" })).is_err());
    }

    #[tokio::test]
    async fn test_empty_address_skips_request() {
        let fetcher = ScriptedFetcher::new();
        let client = GeocodeClient::Nominatim { base: "http://geo.test".to_string(), retry: no_retry() };
        assert_eq!(client.geocode(&fetcher, "   ").await.unwrap(), None);
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_nominatim_request_shape() {
        let fetcher = ScriptedFetcher::new().reply("/search", r#"[{"lat":"1.5","lon":"2.5","display_name":"X"}]"#);
        let client = GeocodeClient::Nominatim { base: "http://geo.test/".to_string(), retry: no_retry() };

        let point = client.geocode(&fetcher, "10 George St").await.unwrap().unwrap();
        assert_eq!(point.lat, 1.5);
        assert_eq!(fetcher.requests()[0].query(), Some("format=json&q=10+George+St&limit=1"));
    }

    #[tokio::test]
    async fn test_proxied_404_is_none() {
        let fetcher = ScriptedFetcher::new()
            .fail("/api/geocode", LookupError::status(PROXY_ENDPOINT, 404));
        let client = GeocodeClient::Proxied { base: "http://proxy.test".to_string(), retry: no_retry() };
        assert_eq!(client.geocode(&fetcher, "nowhere").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_proxied_numbers_parse() {
        let fetcher = ScriptedFetcher::new()
            .reply("/api/geocode", r#"{"lat":-37.81,"lon":144.96,"label":"Melbourne"}"#);
        let client = GeocodeClient::Proxied { base: "http://proxy.test".to_string(), retry: no_retry() };
        let point = client.geocode(&fetcher, "Melbourne").await.unwrap().unwrap();
        assert_eq!(point.label, "Melbourne");
        assert_eq!(point.lon, 144.96);
    }
}
