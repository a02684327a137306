//! Retailer site access: profiles, HTTP, pacing and candidate extraction.

pub mod config;
pub mod extract;
mod http_client;
pub mod rate_limiter;

pub use config::{builtin_sites, SiteConfig, SiteProfile, StorePatternConfig};
pub use extract::{CandidateExtractor, DiscoveryReport, DiscoveryState};
pub use http_client::{
    parse_content_disposition_filename, resolve_user_agent, HttpClient, HttpError, HttpResponse,
    PageFetcher,
};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
