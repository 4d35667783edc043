//! Configuration loading from `KEY=VALUE` env files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: first of `.env.local`, `env.local` that exists
//!
//! Missing files are not an error: built-in defaults apply.

use anyhow::Context;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default env file candidates, in lookup order
pub const DEFAULT_CONFIG_CANDIDATES: [&str; 2] = [".env.local", "env.local"];

/// Registry provider path used for searches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenCorporates,
    Abr,
    Proxy,
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenCorporates => "opencorporates",
            ProviderKind::Abr => "abr",
            ProviderKind::Proxy => "proxy",
            ProviderKind::Mock => "mock",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opencorporates" | "oc" => Ok(ProviderKind::OpenCorporates),
            "abr" => Ok(ProviderKind::Abr),
            "proxy" => Ok(ProviderKind::Proxy),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(format!("unknown registry provider '{other}'")),
        }
    }
}

/// When a failed registry lookup is replaced by the mock record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Any failure, including no match and missing credentials
    Always,
    /// Upstream HTTP, network and response-shape failures only
    Upstream,
    /// Never; every failure is reported
    Never,
}

impl FallbackPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackPolicy::Always => "always",
            FallbackPolicy::Upstream => "upstream",
            FallbackPolicy::Never => "never",
        }
    }
}

impl FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" | "true" | "yes" => Ok(FallbackPolicy::Always),
            "upstream" => Ok(FallbackPolicy::Upstream),
            "never" | "false" | "no" => Ok(FallbackPolicy::Never),
            other => Err(format!("unknown fallback policy '{other}'")),
        }
    }
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    territory_keyword: String,
    opencorporates_base: String,
    opencorporates_api_token: Option<String>,
    abr_base: String,
    abr_guid: Option<String>,
    proxy_base: Option<String>,
    nominatim_base: String,
    osm_tile_url: String,
    provider: Option<ProviderKind>,
    fallback: FallbackPolicy,
    mock_company_name: String,
    cache_ttl_secs: u64,
    cache_file: Option<PathBuf>,
    retry_base_ms: u64,
    http_timeout_ms: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            territory_keyword: "Australia".to_string(),
            opencorporates_base: "https://api.opencorporates.com".to_string(),
            opencorporates_api_token: None,
            abr_base: "https://abr.business.gov.au/json".to_string(),
            abr_guid: None,
            proxy_base: None,
            nominatim_base: "https://nominatim.openstreetmap.org".to_string(),
            osm_tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            provider: None,
            fallback: FallbackPolicy::Upstream,
            mock_company_name: "Sample Pty Ltd".to_string(),
            cache_ttl_secs: 30 * 60,
            cache_file: Some(PathBuf::from(".office-locator-cache.json")),
            retry_base_ms: 400,
            http_timeout_ms: 10_000,
            config_file: "default".to_string(),
        }
    }
}

fn trim_base(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> Option<String> {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return Some(path.clone());
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return Some(path.to_string());
            }
        }

        env::var("CONFIG_FILE").ok().filter(|p| !p.is_empty())
    }

    /// Load configuration from an env file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config = Self::default();
        let applied = config.apply_env_text(&content);
        config.config_file = path.display().to_string();
        debug!(file = %path.display(), applied = applied, "config_file_parsed");
        Ok(config)
    }

    /// Load configuration from an explicit path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Load configuration - explicit path if given, else the first default
    /// candidate that exists, else built-in defaults
    pub fn load(args: &[String]) -> Self {
        if let Some(path) = Self::resolve_config_path(args) {
            return Self::load_from_path(&path);
        }

        for candidate in DEFAULT_CONFIG_CANDIDATES {
            if !Path::new(candidate).exists() {
                continue;
            }
            match Self::from_file(candidate) {
                Ok(config) => return config,
                Err(e) => warn!(file = %candidate, error = %e, "config_candidate_skipped"),
            }
        }

        info!("config_defaults_used");
        Self::default()
    }

    /// Apply `KEY=VALUE` lines. Blank lines and `#` comments are skipped,
    /// values may themselves contain `=`. Returns the number of settings applied.
    pub fn apply_env_text(&mut self, text: &str) -> usize {
        let mut applied = 0;
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            if self.apply_setting(key.trim(), value.trim()) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply one recognized setting. Empty values and unknown keys are ignored.
    /// `CACHE_FILE=` with no value is the one exception: it disables the file cache.
    pub fn apply_setting(&mut self, key: &str, value: &str) -> bool {
        if key == "CACHE_FILE" && value.is_empty() {
            self.cache_file = None;
            return true;
        }
        if value.is_empty() {
            return false;
        }

        match key {
            "TERRITORY_KEYWORD" => self.territory_keyword = value.to_string(),
            "OPENCORPORATES_BASE" => self.opencorporates_base = trim_base(value),
            "OPENCORPORATES_API_TOKEN" => self.opencorporates_api_token = Some(value.to_string()),
            "ABR_JSON_BASE" => self.abr_base = trim_base(value),
            "ABR_GUID" => self.abr_guid = Some(value.to_string()),
            "PROXY_BASE" => self.proxy_base = Some(trim_base(value)),
            "NOMINATIM_BASE" => self.nominatim_base = trim_base(value),
            "OSM_TILE_URL" => self.osm_tile_url = value.to_string(),
            "REGISTRY_PROVIDER" => match value.parse() {
                Ok(provider) => self.provider = Some(provider),
                Err(e) => {
                    warn!(key = %key, error = %e, "config_value_rejected");
                    return false;
                }
            },
            "MOCK_FALLBACK" => match value.parse() {
                Ok(policy) => self.fallback = policy,
                Err(e) => {
                    warn!(key = %key, error = %e, "config_value_rejected");
                    return false;
                }
            },
            "MOCK_COMPANY_NAME" => self.mock_company_name = value.to_string(),
            "CACHE_TTL_SECS" => return self.apply_number(key, value, |c, n| c.cache_ttl_secs = n),
            "CACHE_FILE" => self.cache_file = Some(PathBuf::from(value)),
            "RETRY_BASE_MS" => return self.apply_number(key, value, |c, n| c.retry_base_ms = n),
            "HTTP_TIMEOUT_MS" => {
                return self.apply_number(key, value, |c, n| c.http_timeout_ms = n)
            }
            _ => {
                debug!(key = %key, "config_key_ignored");
                return false;
            }
        }
        true
    }

    fn apply_number(&mut self, key: &str, value: &str, set: impl FnOnce(&mut Self, u64)) -> bool {
        match value.parse::<u64>() {
            Ok(n) => {
                set(self, n);
                true
            }
            Err(e) => {
                warn!(key = %key, value = %value, error = %e, "config_value_rejected");
                false
            }
        }
    }

    /// Disable the on-disk client cache
    pub fn without_cache_file(mut self) -> Self {
        self.cache_file = None;
        self
    }

    // Getters for all config fields
    pub fn territory_keyword(&self) -> &str {
        &self.territory_keyword
    }

    pub fn opencorporates_base(&self) -> &str {
        &self.opencorporates_base
    }

    pub fn opencorporates_api_token(&self) -> Option<&str> {
        self.opencorporates_api_token.as_deref()
    }

    pub fn abr_base(&self) -> &str {
        &self.abr_base
    }

    pub fn abr_guid(&self) -> Option<&str> {
        self.abr_guid.as_deref()
    }

    pub fn proxy_base(&self) -> Option<&str> {
        self.proxy_base.as_deref()
    }

    pub fn nominatim_base(&self) -> &str {
        &self.nominatim_base
    }

    pub fn osm_tile_url(&self) -> &str {
        &self.osm_tile_url
    }

    /// Explicit provider, else proxy when a proxy base is set, else OpenCorporates
    pub fn provider(&self) -> ProviderKind {
        match (self.provider, &self.proxy_base) {
            (Some(provider), _) => provider,
            (None, Some(_)) => ProviderKind::Proxy,
            (None, None) => ProviderKind::OpenCorporates,
        }
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    pub fn mock_company_name(&self) -> &str {
        &self.mock_company_name
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_file(&self) -> Option<&Path> {
        self.cache_file.as_deref()
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}
