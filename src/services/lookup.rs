//! Lookup service - one search from query to renderable record
//!
//! sanitize → registry (cached) → mock fallback per policy → geocode (cached)
//! → franchise/territory inference. All calls within a search run
//! sequentially.

use crate::domain::company::{CompanyRecord, Entity, GeoPoint};
use crate::domain::inference::{infer_franchise, infer_territory, safe_query};
use crate::infra::cache::{cache_key, FileStore, TtlCache};
use crate::infra::config::{Config, FallbackPolicy};
use crate::infra::metrics::{Endpoint, Metrics};
use crate::io::error::LookupError;
use crate::io::geocode::GeocodeClient;
use crate::io::http::{FetchText, HttpClient};
use crate::io::registry::{mock_entity, ProviderClient};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Derive franchise/territory signals and attach the geocode
pub fn build_record(entity: Entity, territory_keyword: &str, geo: Option<GeoPoint>) -> CompanyRecord {
    let franchise = infer_franchise(entity.company_type.as_deref(), entity.branch_status.as_deref());
    let sales_territory = infer_territory(entity.address(), Some(territory_keyword));
    CompanyRecord { entity, franchise, sales_territory, geo }
}

/// Whether a failed registry lookup is replaced by the mock record
pub fn should_fallback(policy: FallbackPolicy, error: &LookupError) -> bool {
    match policy {
        FallbackPolicy::Always => !matches!(error, LookupError::EmptyQuery),
        FallbackPolicy::Upstream => error.is_upstream(),
        FallbackPolicy::Never => false,
    }
}

pub struct LookupService {
    provider: ProviderClient,
    geocoder: GeocodeClient,
    fetcher: Arc<dyn FetchText>,
    cache: TtlCache,
    territory_keyword: String,
    fallback: FallbackPolicy,
    mock_name: String,
    metrics: Arc<Metrics>,
}

impl LookupService {
    pub fn new(config: &Config, fetcher: Arc<dyn FetchText>, cache: TtlCache) -> Self {
        Self {
            provider: ProviderClient::from_config(config),
            geocoder: GeocodeClient::from_config(config),
            fetcher,
            cache,
            territory_keyword: config.territory_keyword().to_string(),
            fallback: config.fallback(),
            mock_name: config.mock_company_name().to_string(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Real HTTP client plus the configured cache file (in-memory when unset)
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = HttpClient::new(config.http_timeout())?;
        let cache = match config.cache_file() {
            Some(path) => TtlCache::new(FileStore::new(path), config.cache_ttl()),
            None => TtlCache::in_memory(config.cache_ttl()),
        };
        Ok(Self::new(config, Arc::new(client), cache))
    }

    pub fn provider(&self) -> &ProviderClient {
        &self.provider
    }

    pub fn territory_keyword(&self) -> &str {
        &self.territory_keyword
    }

    /// Run one search. Errors are user-facing: their Display is the status line.
    pub async fn search(&self, raw_query: &str) -> Result<CompanyRecord, LookupError> {
        let query = safe_query(raw_query);
        if query.is_empty() {
            return Err(LookupError::EmptyQuery);
        }
        let start = Instant::now();
        self.metrics.record_request(Endpoint::Search);

        let entity = match self.find_entity(&query).await {
            Ok(entity) => entity,
            Err(e) if should_fallback(self.fallback, &e) => {
                self.metrics.record_mock_fallback();
                warn!(
                    query = %query,
                    provider = %self.provider.kind().as_str(),
                    error = %e,
                    kind = %e.kind(),
                    "registry_lookup_failed_using_mock"
                );
                mock_entity(&self.mock_name)
            }
            Err(e) => {
                info!(query = %query, error = %e, kind = %e.kind(), "registry_lookup_failed");
                return Err(e);
            }
        };

        let geo = self.locate(entity.address()).await;
        let record = build_record(entity, &self.territory_keyword, geo);
        info!(
            query = %query,
            name = %record.name(),
            source = %record.source().as_str(),
            franchise = %record.franchise.value.as_str(),
            territory = %record.sales_territory.status.as_str(),
            geocoded = record.geo.is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search_completed"
        );
        Ok(record)
    }

    async fn find_entity(&self, query: &str) -> Result<Entity, LookupError> {
        let key = self.provider.cache_prefix().map(|prefix| cache_key(prefix, query));
        if let Some(key) = key.as_deref() {
            if let Some(entity) = self.cache.get_as::<Entity>(key) {
                self.metrics.record_cache_hit(Endpoint::Search);
                debug!(key = %key, "registry_cache_hit");
                return Ok(entity);
            }
        }

        let entity = match self.provider.lookup(self.fetcher.as_ref(), query).await {
            Ok(entity) => entity,
            Err(e) => {
                if e.is_no_match() {
                    self.metrics.record_not_found(Endpoint::Search);
                } else if e.is_upstream() {
                    self.metrics.record_upstream_error(Endpoint::Search);
                }
                return Err(e);
            }
        };
        if let Some(key) = key.as_deref() {
            self.cache.set_as(key, &entity);
        }
        Ok(entity)
    }

    /// Geocode an address. Failures are logged and yield no map, never an error.
    pub async fn locate(&self, address: Option<&str>) -> Option<GeoPoint> {
        let address = address?.trim();
        if address.is_empty() {
            return None;
        }

        self.metrics.record_request(Endpoint::Geocode);
        let key = cache_key("geo", address);
        if let Some(point) = self.cache.get_as::<GeoPoint>(&key) {
            self.metrics.record_cache_hit(Endpoint::Geocode);
            debug!(key = %key, "geocode_cache_hit");
            return Some(point);
        }

        match self.geocoder.geocode(self.fetcher.as_ref(), address).await {
            Ok(Some(point)) => {
                self.cache.set_as(&key, &point);
                Some(point)
            }
            Ok(None) => {
                self.metrics.record_not_found(Endpoint::Geocode);
                info!(address = %address, "geocode_no_result");
                None
            }
            Err(e) => {
                self.metrics.record_upstream_error(Endpoint::Geocode);
                warn!(address = %address, error = %e, "geocode_failed");
                None
            }
        }
    }
}
