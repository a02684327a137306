//! Best-effort store, category and location inference.
//!
//! Inference looks only at the file name and source URL. It never fails:
//! every input yields a `StoreInfo`, falling back to the site defaults and
//! finally to a label derived from the file name.

use std::sync::LazyLock;

use rand::Rng;
use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::models::{Category, StoreInfo};
use crate::scrapers::{SiteProfile, StorePatternConfig};

/// A city and its Italian postal code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub city: &'static str,
    pub cap: &'static str,
}

/// Fallback locations sampled when a site has no fixed capcode.
pub const ITALIAN_LOCATIONS: [Location; 15] = [
    Location { city: "Milano", cap: "20100" },
    Location { city: "Roma", cap: "00100" },
    Location { city: "Napoli", cap: "80100" },
    Location { city: "Torino", cap: "10100" },
    Location { city: "Palermo", cap: "90100" },
    Location { city: "Genova", cap: "16100" },
    Location { city: "Bologna", cap: "40100" },
    Location { city: "Firenze", cap: "50100" },
    Location { city: "Bari", cap: "70100" },
    Location { city: "Catania", cap: "95100" },
    Location { city: "Venezia", cap: "30100" },
    Location { city: "Verona", cap: "37100" },
    Location { city: "Messina", cap: "98100" },
    Location { city: "Padova", cap: "35100" },
    Location { city: "Trieste", cap: "34100" },
];

/// Wraps a short name so it only matches as a whole token.
macro_rules! token {
    ($name:literal) => {
        concat!(r"(?:^|[^\p{L}\p{N}])", $name, r"(?:[^\p{L}\p{N}]|$)")
    };
}

/// Built-in store table. Order matters: first match wins.
const STORE_PATTERNS: &[(&str, &str)] = &[
    (r"ipercoop|iper[\s_-]coop", "Ipercoop"),
    (r"conad", "Conad"),
    (r"coop", "Coop"),
    (r"esselunga", "Esselunga"),
    (r"carrefour", "Carrefour"),
    (r"lidl", "Lidl"),
    (r"eurospin", "Eurospin"),
    (token!("md"), "MD"),
    (r"md[\s_-]?discount|mdspa", "MD"),
    (token!("dec[oò]"), "Decò"),
    (r"supermercatideco", "Decò"),
    (r"mersi", "MerSi"),
    (token!("pam"), "Pam"),
    (r"panorama", "Pam"),
    (r"tigot[aà]", "Tigotà"),
    (r"acqua[\s_-]*(?:e|&)?[\s_-]*sapone", "Acqua e Sapone"),
    (r"media[\s_-]?world", "MediaWorld"),
    (r"unieuro", "Unieuro"),
    (r"trony", "Trony"),
    (r"expert", "Expert"),
    (r"decathlon", "Decathlon"),
    (r"leroy[\s_-]?merlin", "Leroy Merlin"),
    (r"ikea", "IKEA"),
    (token!("obi"), "OBI"),
];

/// Keywords on the store name that decide its category, checked in order.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Supermarket,
        &["ipercoop", "conad", "coop", "esselunga", "carrefour", "pam", "decò", "deco", "mersi", "iper"],
    ),
    (Category::Discount, &["lidl", "eurospin", "md", "discount"]),
    (Category::Electronics, &["mediaworld", "unieuro", "trony", "expert"]),
    (Category::Sport, &["decathlon"]),
    (Category::HomeAndGarden, &["leroy", "merlin", "ikea", "obi"]),
    (Category::Pharmacy, &["tigotà", "tigota", "acqua e sapone", "farmacia"]),
];

static BUILTIN_PATTERNS: LazyLock<Vec<StorePattern>> = LazyLock::new(|| {
    STORE_PATTERNS
        .iter()
        .filter_map(|(pattern, store)| StorePattern::new(pattern, store))
        .collect()
});

/// Words dropped when turning a file name into a store label.
const FILENAME_NOISE: &[&str] = &["volantino", "volantini", "flyer", "offerte", "pdf"];

/// A compiled case-insensitive store pattern.
#[derive(Debug, Clone)]
pub struct StorePattern {
    regex: Regex,
    store: String,
}

impl StorePattern {
    pub fn new(pattern: &str, store: &str) -> Option<Self> {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => Some(Self {
                regex,
                store: store.to_string(),
            }),
            Err(e) => {
                warn!("Ignoring invalid store pattern '{}': {}", pattern, e);
                None
            }
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// How the location capcode is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationPolicy {
    Fixed(String),
    Sampled,
}

/// Infers `StoreInfo` for one site.
#[derive(Debug, Clone)]
pub struct MetadataInferencer {
    site_patterns: Vec<StorePattern>,
    default_store: Option<String>,
    default_category: Option<Category>,
    location: LocationPolicy,
}

impl MetadataInferencer {
    /// Built-in table only, sampled locations, no site defaults.
    pub fn new() -> Self {
        Self {
            site_patterns: Vec::new(),
            default_store: None,
            default_category: None,
            location: LocationPolicy::Sampled,
        }
    }

    pub fn for_profile(profile: &SiteProfile) -> Self {
        Self {
            site_patterns: compile_patterns(&profile.store_patterns),
            default_store: profile.default_store.clone(),
            default_category: profile.default_category,
            location: match &profile.default_cap {
                Some(cap) => LocationPolicy::Fixed(cap.clone()),
                None => LocationPolicy::Sampled,
            },
        }
    }

    pub fn with_location(mut self, location: LocationPolicy) -> Self {
        self.location = location;
        self
    }

    /// Infer metadata, sampling locations from the thread RNG.
    pub fn infer(&self, filename: &str, source_url: &str) -> StoreInfo {
        self.infer_with(filename, source_url, &mut rand::rng())
    }

    /// Infer metadata with an explicit sampler.
    pub fn infer_with<R: Rng>(&self, filename: &str, source_url: &str, rng: &mut R) -> StoreInfo {
        let text = format!("{} {}", filename, source_url);

        let (name, category) = match self.match_store(&text) {
            Some(store) => {
                let category = category_for_store(&store);
                (store, category)
            }
            None => match &self.default_store {
                Some(store) => (
                    store.clone(),
                    self.default_category
                        .unwrap_or_else(|| category_for_store(store)),
                ),
                None => {
                    let label = label_from_filename(filename);
                    let category = category_for_store(&label);
                    (label, category)
                }
            },
        };

        let cap = match &self.location {
            LocationPolicy::Fixed(cap) => cap.clone(),
            LocationPolicy::Sampled => {
                let idx = rng.random_range(0..ITALIAN_LOCATIONS.len());
                ITALIAN_LOCATIONS[idx].cap.to_string()
            }
        };

        StoreInfo {
            name,
            category,
            cap,
        }
    }

    /// First matching store name: site patterns, then the built-in table.
    pub fn match_store(&self, text: &str) -> Option<String> {
        self.site_patterns
            .iter()
            .chain(BUILTIN_PATTERNS.iter())
            .find(|p| p.matches(text))
            .map(|p| p.store.clone())
    }
}

impl Default for MetadataInferencer {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_patterns(configs: &[StorePatternConfig]) -> Vec<StorePattern> {
    configs
        .iter()
        .filter_map(|c| StorePattern::new(&c.pattern, &c.store))
        .collect()
}

/// Category from keywords in the store name. Keywords of three letters or
/// fewer must be whole words.
pub fn category_for_store(store: &str) -> Category {
    let lower = store.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    for (category, keywords) in CATEGORY_KEYWORDS {
        let hit = keywords.iter().any(|k| {
            if k.chars().count() <= 3 {
                words.contains(k)
            } else {
                lower.contains(k)
            }
        });
        if hit {
            return *category;
        }
    }
    Category::Other
}

/// Title-cased label from a file name, e.g. `super_store-bari.pdf` -> `Super Store Bari`.
pub fn label_from_filename(filename: &str) -> String {
    let stem = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let stem = match stem.rsplit_once('.') {
        Some((s, _)) => s,
        None => stem,
    };

    let words: Vec<String> = stem
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !FILENAME_NOISE.contains(&w.to_lowercase().as_str()))
        .map(title_case)
        .collect();

    if words.is_empty() {
        "Volantino".to_string()
    } else {
        words.join(" ")
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}
