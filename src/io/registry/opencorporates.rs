//! OpenCorporates company search (single request, first hit wins)

use crate::domain::company::{Entity, Source};
use crate::io::error::LookupError;
use crate::io::http::{build_url, parse_json, str_field, FetchText, RetryPolicy, TextRequest};
use serde_json::Value;
use tracing::debug;

const ENDPOINT: &str = "opencorporates_search";

#[derive(Debug, Clone)]
pub struct OpenCorporatesSettings {
    pub base: String,
    pub api_token: Option<String>,
    pub retry: RetryPolicy,
}

pub async fn lookup(
    fetcher: &dyn FetchText,
    settings: &OpenCorporatesSettings,
    query: &str,
) -> Result<Entity, LookupError> {
    let mut params = vec![("q", query), ("per_page", "1")];
    if let Some(token) = settings.api_token.as_deref() {
        params.push(("api_token", token));
    }
    let url = build_url(&settings.base, "/companies/search", &params)?;

    let body = fetcher.get_text(&TextRequest::new(ENDPOINT, url, settings.retry)).await?;
    let reply = parse_json(ENDPOINT, &body)?;
    let entity = normalize_company(query, &reply)?;
    debug!(name = %entity.name, number = ?entity.company_number, "opencorporates_match");
    Ok(entity)
}

/// Normalize a search reply. The first company of `results.companies` is used.
pub fn normalize_company(query: &str, reply: &Value) -> Result<Entity, LookupError> {
    if reply.get("results").is_none() {
        return Err(LookupError::shape(ENDPOINT, "missing results"));
    }
    let company = reply
        .pointer("/results/companies/0/company")
        .filter(|c| c.is_object())
        .ok_or_else(|| LookupError::NoMatch("No matching company found.".to_string()))?;

    let mut entity = Entity::named(str_field(company, "name").unwrap_or(query), Source::OpenCorporates);
    entity.address = registered_address(company);
    entity.jurisdiction = str_field(company, "jurisdiction_code").map(str::to_string);
    entity.incorporation_date = str_field(company, "incorporation_date").map(str::to_string);
    entity.company_number = str_field(company, "company_number").map(str::to_string);
    entity.company_status = str_field(company, "current_status")
        .or_else(|| str_field(company, "status"))
        .map(str::to_string);
    entity.company_type = str_field(company, "company_type").map(str::to_string);
    entity.branch_status = str_field(company, "branch_status").map(str::to_string);
    entity.raw = company.clone();
    Ok(entity)
}

fn join_strings(values: &[Value]) -> Option<String> {
    let parts: Vec<&str> =
        values.iter().filter_map(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Full address, else the structured or list forms joined by ", "
fn registered_address(company: &Value) -> Option<String> {
    if let Some(full) = str_field(company, "registered_address_in_full") {
        return Some(full.to_string());
    }

    match company.get("registered_address") {
        Some(Value::Array(lines)) => {
            if let Some(joined) = join_strings(lines) {
                return Some(joined);
            }
        }
        Some(obj @ Value::Object(_)) => {
            let parts: Vec<&str> = ["street_address", "locality", "region", "postal_code", "country"]
                .iter()
                .filter_map(|key| str_field(obj, key))
                .collect();
            if !parts.is_empty() {
                return Some(parts.join(", "));
            }
        }
        _ => {}
    }

    if let Some(Value::Array(lines)) = company.get("registered_address_lines") {
        return join_strings(lines);
    }
    str_field(company, "address").map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::http::fake::ScriptedFetcher;
    use serde_json::json;
    use std::time::Duration;

    fn settings(token: Option<&str>) -> OpenCorporatesSettings {
        OpenCorporatesSettings {
            base: "https://api.opencorporates.com".to_string(),
            api_token: token.map(str::to_string),
            retry: RetryPolicy { attempts: 1, base_delay: Duration::ZERO, max_jitter: Duration::ZERO },
        }
    }

    #[test]
    fn test_normalize_first_company() {
        let reply = json!({
            "results": { "companies": [
                { "company": {
                    "name": "ACME FRANCHISING LIMITED",
                    "company_number": "01234567",
                    "jurisdiction_code": "gb",
                    "incorporation_date": "1999-03-01",
                    "current_status": "Active",
                    "company_type": "Private Limited Company",
                    "registered_address_in_full": "1 High Street, London, EC1A 1BB"
                }},
                { "company": { "name": "Second" } }
            ]}
        });

        let entity = normalize_company("acme", &reply).unwrap();
        assert_eq!(entity.name, "ACME FRANCHISING LIMITED");
        assert_eq!(entity.address(), Some("1 High Street, London, EC1A 1BB"));
        assert_eq!(entity.jurisdiction.as_deref(), Some("gb"));
        assert_eq!(entity.company_status.as_deref(), Some("Active"));
        assert_eq!(entity.source, Source::OpenCorporates);
        assert_eq!(entity.raw["company_number"], "01234567");
    }

    #[test]
    fn test_address_falls_back_to_structured_parts() {
        let reply = json!({ "results": { "companies": [ { "company": {
            "name": "Kiwi Ltd",
            "status": "Registered",
            "registered_address": {
                "street_address": "5 Queen St",
                "locality": "Auckland",
                "country": "New Zealand"
            }
        }}]}});

        let entity = normalize_company("kiwi", &reply).unwrap();
        assert_eq!(entity.address(), Some("5 Queen St, Auckland, New Zealand"));
        assert_eq!(entity.company_status.as_deref(), Some("Registered"));
    }

    #[test]
    fn test_address_lines_are_joined() {
        let reply = json!({ "results": { "companies": [ { "company": {
            "registered_address_lines": ["Level 2", "", "10 George St", "Sydney"]
        }}]}});

        let entity = normalize_company("fallback name", &reply).unwrap();
        assert_eq!(entity.name, "fallback name");
        assert_eq!(entity.address(), Some("Level 2, 10 George St, Sydney"));
    }

    #[test]
    fn test_empty_results_is_no_match() {
        let reply = json!({ "results": { "companies": [] } });
        assert!(normalize_company("x", &reply).unwrap_err().is_no_match());
    }

    #[test]
    fn test_unexpected_shape_is_upstream_error() {
        let err = normalize_company("x", &json!({ "error": "rate limited" })).unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_lookup_sends_token_and_page_size() {
        let fetcher = ScriptedFetcher::new().reply(
            "/companies/search",
            r#"{"results":{"companies":[{"company":{"name":"Acme"}}]}}"#,
        );

        let entity = lookup(&fetcher, &settings(Some("secret")), "Acme & Co").await.unwrap();
        assert_eq!(entity.name, "Acme");

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query(), Some("q=Acme+%26+Co&per_page=1&api_token=secret"));
    }
}
