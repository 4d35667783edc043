//! Registry search through the same-origin proxy (`/api/search`)

use crate::domain::company::{Entity, Source};
use crate::io::error::LookupError;
use crate::io::http::{build_url, parse_json, FetchText, RetryPolicy, TextRequest};
use crate::io::proxy_server::GUID_MISSING;
use serde_json::Value;

const ENDPOINT: &str = "proxy_search";

#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub base: String,
    pub retry: RetryPolicy,
}

pub async fn lookup(
    fetcher: &dyn FetchText,
    settings: &ProxySettings,
    query: &str,
) -> Result<Entity, LookupError> {
    let url = build_url(&settings.base, "/api/search", &[("q", query)])?;
    let body = match fetcher.get_text(&TextRequest::new(ENDPOINT, url, settings.retry)).await {
        Ok(body) => body,
        Err(LookupError::Status { status: 404, .. }) => {
            return Err(LookupError::NoMatch("No matching company found.".to_string()))
        }
        Err(LookupError::Status { status: 500, detail: Some(detail), .. }) if detail == GUID_MISSING => {
            return Err(LookupError::MissingCredential("ABR_GUID"))
        }
        Err(e) => return Err(e),
    };
    parse_record(&parse_json(ENDPOINT, &body)?)
}

/// Read the entity part of a proxy record. Signals in the payload are ignored;
/// they are derived again on this side with the local territory keyword.
pub fn parse_record(value: &Value) -> Result<Entity, LookupError> {
    let mut value = value.clone();
    let Some(object) = value.as_object_mut() else {
        return Err(LookupError::shape(ENDPOINT, "record is not an object"));
    };
    if !object.get("name").is_some_and(Value::is_string) {
        return Err(LookupError::shape(ENDPOINT, "record has no name"));
    }
    object.entry("source").or_insert_with(|| Value::String(Source::Proxy.as_str().to_string()));

    serde_json::from_value(value).map_err(|e| LookupError::shape(ENDPOINT, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::http::fake::ScriptedFetcher;
    use serde_json::json;
    use std::time::Duration;

    fn settings() -> ProxySettings {
        ProxySettings {
            base: "http://localhost:8788".to_string(),
            retry: RetryPolicy { attempts: 1, base_delay: Duration::ZERO, max_jitter: Duration::ZERO },
        }
    }

    #[test]
    fn test_parse_record_defaults_source() {
        let entity = parse_record(&json!({ "name": "Acme", "address": "1 Main St" })).unwrap();
        assert_eq!(entity.source, Source::Proxy);
        assert_eq!(entity.address(), Some("1 Main St"));

        let abr = parse_record(&json!({ "name": "Acme", "source": "abr" })).unwrap();
        assert_eq!(abr.source, Source::Abr);
    }

    #[test]
    fn test_parse_record_rejects_nameless() {
        assert!(parse_record(&json!({ "error": "boom" })).unwrap_err().is_upstream());
        assert!(parse_record(&json!([1, 2])).unwrap_err().is_upstream());
    }

    #[tokio::test]
    async fn test_404_is_no_match() {
        let fetcher = ScriptedFetcher::new()
            .fail("/api/search", LookupError::status(ENDPOINT, 404));
        let err = lookup(&fetcher, &settings(), "nobody").await.unwrap_err();
        assert!(err.is_no_match());
    }

    #[tokio::test]
    async fn test_guid_missing_reply_is_config_error() {
        let fetcher = ScriptedFetcher::new().fail(
            "/api/search",
            LookupError::Status {
                endpoint: ENDPOINT,
                status: 500,
                detail: Some(GUID_MISSING.to_string()),
            },
        );
        let err = lookup(&fetcher, &settings(), "acme").await.unwrap_err();
        assert_eq!(err, LookupError::MissingCredential("ABR_GUID"));
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_500_stays_upstream_error() {
        let fetcher = ScriptedFetcher::new()
            .fail("/api/search", LookupError::status(ENDPOINT, 500));
        let err = lookup(&fetcher, &settings(), "acme").await.unwrap_err();
        assert!(err.is_upstream());
    }
}
