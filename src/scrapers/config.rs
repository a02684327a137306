//! Site profile configuration.
//!
//! `SiteConfig` is the file shape of a `[sites.<id>]` table; every field is
//! optional so a table can override a single knob of a built-in profile.
//! `SiteProfile` is the resolved, immutable form the pipeline runs with.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{ConfigError, Settings};
use crate::models::Category;

/// Headers sent to every retailer site unless a profile overrides them.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
    ("Accept-Language", "it-IT,it;q=0.9,en;q=0.8"),
];

/// Site configuration from a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Display name (defaults to the site id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Seed pages fetched at the start of discovery.
    #[serde(default)]
    pub seeds: Vec<String>,
    /// Domain secondary pages must belong to (defaults to the first seed's root domain).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_domain: Option<String>,
    /// Store name used when inference finds nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    /// Category paired with `store`, as a catalog label or short key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Fixed location capcode. When unset, a location is sampled per upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// User agent configuration.
    /// - None: use the global setting
    /// - "impersonate": pick a real browser user agent
    /// - any other string: use as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Minimum interval between requests to the same host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_secondary_pages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_secondary_pages: Option<bool>,
    /// Extra store patterns, tried before the built-in table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub store_patterns: Vec<StorePatternConfig>,
    /// Extra CSS selectors for selector probing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectors: Vec<String>,
}

/// A case-insensitive regex mapped to a store name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorePatternConfig {
    pub pattern: String,
    pub store: String,
}

impl StorePatternConfig {
    fn new(pattern: &str, store: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            store: store.to_string(),
        }
    }
}

/// Resolved site profile. Built once per run and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteProfile {
    pub id: String,
    pub name: String,
    pub seeds: Vec<String>,
    pub allowed_domain: String,
    pub default_store: Option<String>,
    pub default_category: Option<Category>,
    pub default_cap: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub user_agent: Option<String>,
    pub request_delay: Duration,
    pub max_secondary_pages: usize,
    pub follow_secondary_pages: bool,
    pub store_patterns: Vec<StorePatternConfig>,
    pub selectors: Vec<String>,
}

impl SiteConfig {
    /// Resolve this table into a profile, filling gaps from global settings.
    pub fn into_profile(self, id: &str, settings: &Settings) -> Result<SiteProfile, ConfigError> {
        if self.seeds.is_empty() {
            return Err(ConfigError::Invalid(format!("site '{}' has no seeds", id)));
        }
        for seed in &self.seeds {
            let parsed = Url::parse(seed).map_err(|e| {
                ConfigError::Invalid(format!("site '{}' seed '{}': {}", id, seed, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!(
                    "site '{}' seed '{}' is not http(s)",
                    id, seed
                )));
            }
        }

        let default_category = match self.category.as_deref() {
            Some(label) => Some(Category::from_label(label).ok_or_else(|| {
                ConfigError::Invalid(format!("site '{}' has unknown category '{}'", id, label))
            })?),
            None => None,
        };

        let allowed_domain = self
            .allowed_domain
            .clone()
            .unwrap_or_else(|| root_domain(&self.seeds[0]));

        let mut headers: BTreeMap<String, String> = DEFAULT_HEADERS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        headers.extend(self.headers);

        Ok(SiteProfile {
            id: id.to_string(),
            name: self.name.unwrap_or_else(|| id.to_string()),
            seeds: self.seeds,
            allowed_domain,
            default_store: self.store,
            default_category,
            default_cap: self.cap,
            headers,
            user_agent: self.user_agent.or_else(|| settings.user_agent.clone()),
            request_delay: self
                .request_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(settings.request_delay),
            max_secondary_pages: self
                .max_secondary_pages
                .unwrap_or(settings.max_secondary_pages),
            follow_secondary_pages: self.follow_secondary_pages.unwrap_or(true),
            store_patterns: self.store_patterns,
            selectors: self.selectors,
        })
    }
}

/// Root domain of a URL (last two host labels), used for subdomain matching.
pub fn root_domain(url: &str) -> String {
    url.parse::<Url>()
        .map(|u| match u.host() {
            Some(url::Host::Domain(host)) => {
                let parts: Vec<&str> = host.split('.').collect();
                if parts.len() >= 2 {
                    parts[parts.len() - 2..].join(".")
                } else {
                    host.to_string()
                }
            }
            Some(ip) => ip.to_string(),
            None => String::new(),
        })
        .unwrap_or_default()
}

fn site(
    name: &str,
    seeds: &[&str],
    store: Option<&str>,
    category: Option<&str>,
    cap: Option<&str>,
) -> SiteConfig {
    SiteConfig {
        name: Some(name.to_string()),
        seeds: seeds.iter().map(|s| s.to_string()).collect(),
        store: store.map(str::to_string),
        category: category.map(str::to_string),
        cap: cap.map(str::to_string),
        user_agent: Some("impersonate".to_string()),
        ..Default::default()
    }
}

/// Retailer sites known out of the box. Config tables with the same id replace these.
pub fn builtin_sites() -> BTreeMap<String, SiteConfig> {
    let mut sites = BTreeMap::new();

    let mut aggregator = site(
        "UltimiVolantini",
        &[
            "https://ultimivolantini.it/",
            "https://ultimivolantini.it/volantini",
            "https://ultimivolantini.it/offerte",
            "https://ultimivolantini.it/supermercati",
            "https://ultimivolantini.it/discount",
        ],
        None,
        None,
        None,
    );
    aggregator.request_delay_ms = Some(1000);
    sites.insert("ultimivolantini".to_string(), aggregator);

    let mut mersi = site(
        "MerSi Supermercati",
        &["https://www.mersisupermercati.com/volantino/"],
        Some("MerSi"),
        Some("Supermercato"),
        Some("00000"),
    );
    mersi.selectors = vec![".elementor-image".to_string()];
    sites.insert("mersi".to_string(), mersi);

    let mut deco = site(
        "Supermercati Decò",
        &["https://supermercatideco.gruppoarena.it/volantini/"],
        Some("Supermercato Decò"),
        Some("Supermercato"),
        Some("90100"),
    );
    deco.store_patterns = vec![
        StorePatternConfig::new(r"iperstore|superstore", "Iperstore/Superstore Decò"),
        StorePatternConfig::new(r"gourmet", "Decò Gourmet"),
        StorePatternConfig::new(r"lipari", "Decò Lipari"),
    ];
    sites.insert("deco".to_string(), deco);

    let mut eurospin = site(
        "Eurospin",
        &[
            "https://www.eurospin.it/",
            "https://www.eurospin.it/volantino/",
            // Aggregators carry the flyer when the retailer site hides it
            "https://www.volantinofacile.it/eurospin/volantino-eurospin",
            "https://www.scontrinofelice.it/volantini/anteprima-nuovo-volantino-eurospin/",
            "https://www.trovaprezzi.it/volantini/eurospin",
        ],
        Some("Eurospin"),
        Some("Discount"),
        Some("00100"),
    );
    eurospin.selectors = [
        ".volantino-container",
        ".leaflet-container",
        ".promo-container",
        ".flyer-container",
        ".volantino-item",
        ".flyer-item",
        ".leaflet-item",
        ".card-volantino",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    sites.insert("eurospin".to_string(), eurospin);

    sites.insert(
        "lidl".to_string(),
        site(
            "Lidl Italia",
            &["https://www.lidl.it/"],
            Some("Lidl"),
            Some("Discount"),
            Some("00000"),
        ),
    );

    sites.insert(
        "md".to_string(),
        site(
            "MD",
            &["https://www.mdspa.it/volantino/"],
            Some("MD"),
            Some("Discount"),
            Some("00000"),
        ),
    );

    let mut ipercoop = site(
        "Ipercoop Radenza",
        &["https://volantini.coopgrupporadenza.it/"],
        Some("Ipercoop"),
        Some("Supermercato"),
        Some("00000"),
    );
    ipercoop.selectors = vec![".volantino-inner".to_string(), ".col-volantino".to_string()];
    ipercoop.store_patterns = vec![StorePatternConfig::new(r"radenza", "Ipercoop")];
    sites.insert("ipercoop".to_string(), ipercoop);

    sites
}
