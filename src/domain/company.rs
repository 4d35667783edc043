//! Company record - the normalized shape every registry provider produces

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which provider path produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    OpenCorporates,
    Abr,
    Proxy,
    Mock,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::OpenCorporates => "opencorporates",
            Source::Abr => "abr",
            Source::Proxy => "proxy",
            Source::Mock => "mock",
        }
    }

    /// Human readable label for the info panel
    pub fn label(&self) -> &'static str {
        match self {
            Source::OpenCorporates => "OpenCorporates",
            Source::Abr => "ABN Lookup",
            Source::Proxy => "Proxy",
            Source::Mock => "mock",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Franchise {
    Yes,
    Likely,
    Unknown,
    No,
}

impl Franchise {
    pub fn as_str(&self) -> &'static str {
        match self {
            Franchise::Yes => "Yes",
            Franchise::Likely => "Likely",
            Franchise::Unknown => "Unknown",
            Franchise::No => "No",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FranchiseSignal {
    pub value: Franchise,
    pub reason: String,
}

impl FranchiseSignal {
    pub fn new(value: Franchise, reason: impl Into<String>) -> Self {
        Self { value, reason: reason.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Territory {
    Inside,
    Outside,
    Unknown,
}

impl Territory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Territory::Inside => "Inside",
            Territory::Outside => "Outside",
            Territory::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritorySignal {
    pub status: Territory,
    pub reason: String,
}

impl TerritorySignal {
    pub fn new(status: Territory, reason: impl Into<String>) -> Self {
        Self { status, reason: reason.into() }
    }
}

/// Geocoded position of a head office
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub label: String,
}

/// Registry fields as normalized from a provider reply.
///
/// Signals are not part of this: they are derived by the lookup service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incorporation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_status: Option<String>,
    pub source: Source,
    #[serde(default)]
    pub raw: Value,
}

impl Entity {
    /// Entity with only a name and source, everything else absent
    pub fn named(name: impl Into<String>, source: Source) -> Self {
        Self {
            name: name.into(),
            address: None,
            jurisdiction: None,
            incorporation_date: None,
            company_number: None,
            company_status: None,
            company_type: None,
            branch_status: None,
            source,
            raw: Value::Null,
        }
    }

    /// Address with blank values treated as absent
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}

/// One search result, ready to render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRecord {
    #[serde(flatten)]
    pub entity: Entity,
    pub franchise: FranchiseSignal,
    pub sales_territory: TerritorySignal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoPoint>,
}

impl CompanyRecord {
    pub fn name(&self) -> &str {
        &self.entity.name
    }

    pub fn address(&self) -> Option<&str> {
        self.entity.address()
    }

    pub fn source(&self) -> Source {
        self.entity.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_camel_case() {
        let mut entity = Entity::named("Acme Pty Ltd", Source::Abr);
        entity.company_number = Some("123".to_string());
        entity.incorporation_date = Some("2001-01-01".to_string());
        let record = CompanyRecord {
            entity,
            franchise: FranchiseSignal::new(Franchise::Unknown, "n/a"),
            sales_territory: TerritorySignal::new(Territory::Inside, "ok"),
            geo: None,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["name"], "Acme Pty Ltd");
        assert_eq!(value["companyNumber"], "123");
        assert_eq!(value["incorporationDate"], "2001-01-01");
        assert_eq!(value["source"], "abr");
        assert_eq!(value["franchise"]["value"], "Unknown");
        assert_eq!(value["salesTerritory"]["status"], "Inside");
        assert!(value.get("geo").is_none());
    }

    #[test]
    fn test_record_parses_proxy_payload() {
        let payload = json!({
            "name": "Acme Pty Ltd",
            "address": "10 George St Sydney NSW 2000 Australia",
            "jurisdiction": "au",
            "companyNumber": "51824753556",
            "companyStatus": "Active",
            "companyType": "Australian Private Company",
            "source": "abr",
            "franchise": { "value": "Unknown", "reason": "Franchise data not provided." },
            "salesTerritory": { "status": "Unknown", "reason": "No territory configured." },
            "raw": { "match": {} }
        });

        let record: CompanyRecord = serde_json::from_value(payload).unwrap();
        assert_eq!(record.name(), "Acme Pty Ltd");
        assert_eq!(record.entity.company_number.as_deref(), Some("51824753556"));
        assert_eq!(record.source(), Source::Abr);
        assert!(record.geo.is_none());
    }

    #[test]
    fn test_blank_address_is_absent() {
        let mut entity = Entity::named("X", Source::Mock);
        entity.address = Some("   ".to_string());
        assert_eq!(entity.address(), None);
    }
}
