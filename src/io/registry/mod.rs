//! Registry clients - one provider path per configuration
//!
//! - `opencorporates` - direct OpenCorporates search
//! - `abr` - ABN Lookup match-then-detail
//! - `proxied` - the same-origin proxy's `/api/search`
//!
//! `ProviderClient` selects exactly one of them (or the mock record). It is
//! not a failover chain: a failed lookup is reported to the caller, which
//! decides whether to substitute the mock record.

pub mod abr;
pub mod opencorporates;
pub mod proxied;

use crate::domain::company::{Entity, Source};
use crate::infra::config::{Config, ProviderKind};
use crate::io::error::LookupError;
use crate::io::http::{FetchText, RetryPolicy};
use serde_json::json;

pub use abr::AbrSettings;
pub use opencorporates::OpenCorporatesSettings;
pub use proxied::ProxySettings;

pub const MOCK_ADDRESS: &str = "321 Sample Street, Sydney NSW, Australia";

/// Fixed record shown when no registry data is available
pub fn mock_entity(name: &str) -> Entity {
    let mut entity = Entity::named(name, Source::Mock);
    entity.address = Some(MOCK_ADDRESS.to_string());
    entity.jurisdiction = Some("au".to_string());
    entity.incorporation_date = Some("2019-07-12".to_string());
    entity.company_number = Some("MOCK-0001".to_string());
    entity.company_status = Some("Active".to_string());
    entity.company_type = Some("Proprietary".to_string());
    entity.raw = json!({ "source": "mock" });
    entity
}

#[derive(Debug, Clone)]
pub enum ProviderClient {
    DirectRegistry(OpenCorporatesSettings),
    TwoStepRegistry(AbrSettings),
    ProxiedRegistry(ProxySettings),
    Mock { name: String },
}

impl ProviderClient {
    pub fn from_config(config: &Config) -> Self {
        let retry = RetryPolicy::with_base_delay(config.retry_base());
        match config.provider() {
            ProviderKind::OpenCorporates => ProviderClient::DirectRegistry(OpenCorporatesSettings {
                base: config.opencorporates_base().to_string(),
                api_token: config.opencorporates_api_token().map(str::to_string),
                retry,
            }),
            ProviderKind::Abr => ProviderClient::TwoStepRegistry(AbrSettings {
                base: config.abr_base().to_string(),
                guid: config.abr_guid().map(str::to_string),
                retry,
                courtesy_delay: abr::COURTESY_DELAY,
            }),
            // An empty base is reported at lookup time as a configuration error
            ProviderKind::Proxy => ProviderClient::ProxiedRegistry(ProxySettings {
                base: config.proxy_base().unwrap_or_default().to_string(),
                retry,
            }),
            ProviderKind::Mock => ProviderClient::Mock { name: config.mock_company_name().to_string() },
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderClient::DirectRegistry(_) => ProviderKind::OpenCorporates,
            ProviderClient::TwoStepRegistry(_) => ProviderKind::Abr,
            ProviderClient::ProxiedRegistry(_) => ProviderKind::Proxy,
            ProviderClient::Mock { .. } => ProviderKind::Mock,
        }
    }

    /// Prefix for cache keys; the mock record is never cached
    pub fn cache_prefix(&self) -> Option<&'static str> {
        match self {
            ProviderClient::DirectRegistry(_) => Some("oc"),
            ProviderClient::TwoStepRegistry(_) => Some("abr"),
            ProviderClient::ProxiedRegistry(_) => Some("proxy"),
            ProviderClient::Mock { .. } => None,
        }
    }

    pub async fn lookup(&self, fetcher: &dyn FetchText, query: &str) -> Result<Entity, LookupError> {
        match self {
            ProviderClient::DirectRegistry(settings) => opencorporates::lookup(fetcher, settings, query).await,
            ProviderClient::TwoStepRegistry(settings) => abr::lookup(fetcher, settings, query).await,
            ProviderClient::ProxiedRegistry(settings) => {
                if settings.base.is_empty() {
                    return Err(LookupError::InvalidConfig("PROXY_BASE is not set".to_string()));
                }
                proxied::lookup(fetcher, settings, query).await
            }
            ProviderClient::Mock { name } => Ok(mock_entity(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::http::fake::ScriptedFetcher;

    #[test]
    fn test_from_config_selects_provider() {
        let mut config = Config::default();
        assert_eq!(ProviderClient::from_config(&config).kind(), ProviderKind::OpenCorporates);

        config.apply_setting("REGISTRY_PROVIDER", "abr");
        config.apply_setting("ABR_GUID", "g");
        let client = ProviderClient::from_config(&config);
        assert_eq!(client.kind(), ProviderKind::Abr);
        assert_eq!(client.cache_prefix(), Some("abr"));

        config.apply_setting("REGISTRY_PROVIDER", "mock");
        assert_eq!(ProviderClient::from_config(&config).cache_prefix(), None);
    }

    #[tokio::test]
    async fn test_mock_provider_needs_no_network() {
        let fetcher = ScriptedFetcher::new();
        let client = ProviderClient::Mock { name: "Sample Pty Ltd".to_string() };
        let entity = client.lookup(&fetcher, "Example Pty Ltd").await.unwrap();
        assert_eq!(entity.name, "Sample Pty Ltd");
        assert_eq!(entity.address(), Some(MOCK_ADDRESS));
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_proxy_without_base_is_config_error() {
        let mut config = Config::default();
        config.apply_setting("REGISTRY_PROVIDER", "proxy");
        let client = ProviderClient::from_config(&config);
        let err = client.lookup(&ScriptedFetcher::new(), "x").await.unwrap_err();
        assert!(err.is_config());
    }
}
