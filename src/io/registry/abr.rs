//! Australian Business Register (ABN Lookup) two-step search
//!
//! 1. `MatchingNames.aspx` resolves a free-text name to the best ABN match
//! 2. courtesy pause (not retried)
//! 3. `AbnDetails.aspx` fetches the entity record for that ABN
//!
//! Both endpoints may answer in JSONP form; the callback wrapper is stripped.

use crate::domain::company::{Entity, Source};
use crate::io::error::LookupError;
use crate::io::http::{build_url, parse_jsonp, str_field, text_field, FetchText, RetryPolicy, TextRequest};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const MATCH_ENDPOINT: &str = "abr_match";
const DETAIL_ENDPOINT: &str = "abr_details";

/// Pause between the match and detail calls
pub const COURTESY_DELAY: Duration = Duration::from_millis(300);

/// Message used when ABN Lookup has no match for a name
pub const NO_MATCH_MESSAGE: &str = "No matching Australian company found via ABN Lookup.";

const ADDRESS_FIELDS: [&str; 6] =
    ["StreetNumber", "StreetName", "StreetType", "Suburb", "StateCode", "Postcode"];

const COUNTRY_SUFFIX: &str = "Australia";

#[derive(Debug, Clone)]
pub struct AbrSettings {
    pub base: String,
    pub guid: Option<String>,
    pub retry: RetryPolicy,
    pub courtesy_delay: Duration,
}

pub async fn lookup(
    fetcher: &dyn FetchText,
    settings: &AbrSettings,
    query: &str,
) -> Result<Entity, LookupError> {
    let guid = settings
        .guid
        .as_deref()
        .filter(|g| !g.is_empty())
        .ok_or(LookupError::MissingCredential("ABR_GUID"))?;

    let match_url = build_url(
        &settings.base,
        "/MatchingNames.aspx",
        &[("name", query), ("maxResults", "1"), ("guid", guid)],
    )?;
    let body = fetcher.get_text(&TextRequest::new(MATCH_ENDPOINT, match_url, settings.retry)).await?;
    let match_reply = parse_jsonp(MATCH_ENDPOINT, &body)?;

    let matched = extract_abr_match(&match_reply)
        .ok_or_else(|| LookupError::NoMatch(NO_MATCH_MESSAGE.to_string()))?
        .clone();
    let Some(abn) = text_field(&matched, "Abn") else {
        return Err(LookupError::NoMatch(NO_MATCH_MESSAGE.to_string()));
    };
    info!(abn = %abn, name = ?str_field(&matched, "Name"), "abr_name_matched");

    tokio::time::sleep(settings.courtesy_delay).await;

    let detail_url =
        build_url(&settings.base, "/AbnDetails.aspx", &[("abn", abn.as_str()), ("guid", guid)])?;
    let body =
        fetcher.get_text(&TextRequest::new(DETAIL_ENDPOINT, detail_url, settings.retry)).await?;
    let details = parse_jsonp(DETAIL_ENDPOINT, &body)?;
    if !details.is_object() {
        return Err(LookupError::shape(DETAIL_ENDPOINT, "details is not an object"));
    }

    let entity = normalize_details(query, &abn, &matched, &details);
    debug!(abn = %abn, name = %entity.name, address = ?entity.address, "abr_details_normalized");
    Ok(entity)
}

/// Best match from a `MatchingNames` reply: the first element of `Names`
/// (or `names`) when non-empty, else the reply itself when it carries a `Name`.
pub fn extract_abr_match(reply: &Value) -> Option<&Value> {
    let names = reply.get("Names").or_else(|| reply.get("names"));
    if let Some(first) = names.and_then(Value::as_array).and_then(|list| list.first()) {
        return Some(first);
    }
    reply.get("Name").is_some_and(|n| !n.is_null()).then_some(reply)
}

/// Assemble a one-line address from `MainBusinessPhysicalAddress`.
///
/// Sub-fields are taken in fixed order, missing ones skipped, and the country
/// suffix appended whenever at least one sub-field is present. A plain string
/// address is returned as-is. Without a physical address block the top-level
/// `AddressState`/`AddressPostcode` pair is used.
pub fn build_abr_address(details: &Value) -> String {
    let block = details.get("MainBusinessPhysicalAddress").and_then(|addr| {
        let addr = match addr {
            Value::Array(items) => items.first()?,
            other => other,
        };
        Some(addr.get("_").filter(|inner| !inner.is_null()).unwrap_or(addr))
    });

    let parts: Vec<String> = match block {
        Some(Value::String(s)) => return s.trim().to_string(),
        Some(obj @ Value::Object(_)) => {
            ADDRESS_FIELDS.iter().filter_map(|field| text_field(obj, field)).collect()
        }
        _ => ["AddressState", "AddressPostcode"]
            .iter()
            .filter_map(|field| text_field(details, field))
            .collect(),
    };

    if parts.is_empty() {
        return String::new();
    }
    let mut address = parts.join(" ");
    address.push(' ');
    address.push_str(COUNTRY_SUFFIX);
    address
}

/// Normalize an `AbnDetails` reply into an entity
pub fn normalize_details(query: &str, abn: &str, matched: &Value, details: &Value) -> Entity {
    let name = str_field(details, "EntityName").or_else(|| str_field(matched, "Name")).unwrap_or(query);

    let mut entity = Entity::named(name, Source::Abr);
    let address = build_abr_address(details);
    entity.address = (!address.is_empty()).then_some(address);
    entity.jurisdiction = Some("au".to_string());
    entity.incorporation_date = details
        .get("Gst")
        .and_then(|gst| match gst {
            Value::Object(_) => str_field(gst, "EffectiveFrom"),
            Value::String(s) => Some(s.as_str()).filter(|s| !s.trim().is_empty()),
            _ => None,
        })
        .or_else(|| str_field(details, "AbnStatusEffectiveFrom"))
        .map(str::to_string);
    entity.company_number = Some(abn.to_string());
    entity.company_status = Some(str_field(details, "AbnStatus").unwrap_or("Unknown").to_string());
    entity.company_type =
        Some(str_field(details, "EntityTypeName").unwrap_or("Australian Entity").to_string());
    entity.raw = json!({ "match": matched, "details": details });
    entity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::http::fake::ScriptedFetcher;

    fn settings(guid: Option<&str>) -> AbrSettings {
        AbrSettings {
            base: "https://abr.business.gov.au/json".to_string(),
            guid: guid.map(str::to_string),
            retry: RetryPolicy { attempts: 1, base_delay: Duration::ZERO, max_jitter: Duration::ZERO },
            courtesy_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_extract_match_prefers_first_name() {
        let reply = json!({ "Names": [ { "Abn": "123", "Name": "Example" }, { "Abn": "456" } ] });
        assert_eq!(extract_abr_match(&reply).unwrap()["Abn"], "123");

        let lower = json!({ "names": [ { "Abn": "789" } ] });
        assert_eq!(extract_abr_match(&lower).unwrap()["Abn"], "789");
    }

    #[test]
    fn test_extract_match_single_shape_and_none() {
        let single = json!({ "Abn": "111", "Name": "Solo Pty Ltd" });
        assert_eq!(extract_abr_match(&single).unwrap()["Abn"], "111");

        assert!(extract_abr_match(&json!({ "Names": [] })).is_none());
        assert!(extract_abr_match(&json!({ "Message": "Search text is not valid" })).is_none());
    }

    #[test]
    fn test_build_address_in_fixed_order() {
        let details = json!({ "MainBusinessPhysicalAddress": {
            "Postcode": "2000",
            "StateCode": "NSW",
            "StreetName": "George",
            "Suburb": "Sydney",
            "StreetType": "St",
            "StreetNumber": "10"
        }});
        assert_eq!(build_abr_address(&details), "10 George St Sydney NSW 2000 Australia");
    }

    #[test]
    fn test_build_address_skips_missing_fields() {
        let details = json!({ "MainBusinessPhysicalAddress": {
            "_": { "Suburb": "Parramatta", "Postcode": 2150 }
        }});
        assert_eq!(build_abr_address(&details), "Parramatta 2150 Australia");
    }

    #[test]
    fn test_build_address_edge_cases() {
        let plain = json!({ "MainBusinessPhysicalAddress": " 1 Main Rd Hobart TAS " });
        assert_eq!(build_abr_address(&plain), "1 Main Rd Hobart TAS");

        assert_eq!(build_abr_address(&json!({ "MainBusinessPhysicalAddress": {} })), "");
        assert_eq!(build_abr_address(&json!({})), "");

        let summary = json!({ "AddressState": "VIC", "AddressPostcode": "3000" });
        assert_eq!(build_abr_address(&summary), "VIC 3000 Australia");
    }

    #[test]
    fn test_normalize_details_defaults() {
        let matched = json!({ "Abn": "51824753556", "Name": "Matched Name" });
        let details = json!({ "AbnStatusEffectiveFrom": "2000-01-01" });

        let entity = normalize_details("query", "51824753556", &matched, &details);
        assert_eq!(entity.name, "Matched Name");
        assert_eq!(entity.company_status.as_deref(), Some("Unknown"));
        assert_eq!(entity.company_type.as_deref(), Some("Australian Entity"));
        assert_eq!(entity.incorporation_date.as_deref(), Some("2000-01-01"));
        assert_eq!(entity.jurisdiction.as_deref(), Some("au"));
        assert_eq!(entity.address, None);
        assert_eq!(entity.raw["match"]["Abn"], "51824753556");
    }

    #[tokio::test]
    async fn test_lookup_requires_guid() {
        let fetcher = ScriptedFetcher::new();
        let err = lookup(&fetcher, &settings(None), "Acme").await.unwrap_err();
        assert_eq!(err, LookupError::MissingCredential("ABR_GUID"));
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_two_step() {
        let fetcher = ScriptedFetcher::new()
            .reply(
                "MatchingNames.aspx",
                r#"callback({"Message":"","Names":[{"Abn":"51824753556","Name":"ACME PTY LTD"}]})"#,
            )
            .reply(
                "AbnDetails.aspx",
                r#"callback({"Abn":"51824753556","AbnStatus":"Active","EntityName":"ACME PTY LTD",
                   "EntityTypeName":"Australian Private Company","Gst":{"EffectiveFrom":"2001-07-01"},
                   "MainBusinessPhysicalAddress":{"StreetNumber":"10","StreetName":"George",
                   "StreetType":"St","Suburb":"Sydney","StateCode":"NSW","Postcode":"2000"}})"#,
            );

        let entity = lookup(&fetcher, &settings(Some("guid-1")), "acme").await.unwrap();
        assert_eq!(entity.name, "ACME PTY LTD");
        assert_eq!(entity.company_number.as_deref(), Some("51824753556"));
        assert_eq!(entity.incorporation_date.as_deref(), Some("2001-07-01"));
        assert_eq!(entity.address(), Some("10 George St Sydney NSW 2000 Australia"));

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].query(), Some("name=acme&maxResults=1&guid=guid-1"));
        assert_eq!(requests[1].query(), Some("abn=51824753556&guid=guid-1"));
    }

    #[tokio::test]
    async fn test_match_without_abn_is_no_match() {
        let fetcher =
            ScriptedFetcher::new().reply("MatchingNames.aspx", r#"{"Names":[{"Name":"No ABN"}]}"#);
        let err = lookup(&fetcher, &settings(Some("g")), "x").await.unwrap_err();
        assert_eq!(err, LookupError::NoMatch(NO_MATCH_MESSAGE.to_string()));
        assert_eq!(fetcher.requests().len(), 1);
    }
}
