use std::time::Duration;

use dropwatch_core::{collect_ranked, Candidate, TargetConfig};
use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

use crate::driver::{DriverError, PageDriver};

/// Listing could not be resolved through either tier.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("listing unreachable: raw fetch failed ({raw}), page load failed ({fallback})")]
    Unreachable {
        raw: DriverError,
        fallback: DriverError,
    },
    #[error("raw listing had no matches and the fallback page load failed ({fallback})")]
    FallbackFailed { fallback: DriverError },
}

/// A listing scan configuration that failed to compile.
#[derive(Debug, Error)]
pub enum ScanConfigError {
    #[error("invalid base url {url:?}: {message}")]
    BaseUrl { url: String, message: String },
    #[error("invalid listing url {url:?}")]
    ListingUrl { url: String },
    #[error("invalid link pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },
    #[error("invalid link selector {selector:?}")]
    Selector { selector: String },
}

/// Compiled shape of the listing scan, built once per run.
pub struct ListingScan {
    pub listing_url: String,
    base: Url,
    pattern: Regex,
    selector: Selector,
}

impl ListingScan {
    pub fn compile(base_url: &str, target: &TargetConfig) -> Result<Self, ScanConfigError> {
        let base = Url::parse(base_url).map_err(|err| ScanConfigError::BaseUrl {
            url: base_url.to_string(),
            message: err.to_string(),
        })?;
        let listing_url = base
            .join(&target.listing_url)
            .map_err(|_| ScanConfigError::ListingUrl {
                url: target.listing_url.clone(),
            })?
            .to_string();
        let pattern = Regex::new(&target.link_pattern).map_err(|err| ScanConfigError::Pattern {
            pattern: target.link_pattern.clone(),
            message: err.to_string(),
        })?;
        let selector =
            Selector::parse(&target.link_selector).map_err(|_| ScanConfigError::Selector {
                selector: target.link_selector.clone(),
            })?;
        Ok(Self {
            listing_url,
            base,
            pattern,
            selector,
        })
    }

    /// Base URL relative hrefs resolve against.
    pub fn base(&self) -> &Url {
        &self.base
    }
}

/// Ordered, de-duplicated candidates from the listing, capped at `cap`.
///
/// The raw transport payload is scanned first. A zero-match payload falls
/// back to enumerating anchors of the fully loaded page, which can differ
/// from the raw payload when the listing renders client-side. An empty
/// result after both tiers is legitimate; an error means the listing was
/// unreachable.
pub async fn resolve_candidates(
    driver: &dyn PageDriver,
    scan: &ListingScan,
    cap: usize,
    timeout: Duration,
) -> Result<Vec<Candidate>, ResolveError> {
    let raw_failure = match driver.fetch_raw(&scan.listing_url, timeout).await {
        Ok(payload) => {
            let candidates = scan_raw(scan, &payload, cap);
            if !candidates.is_empty() {
                return Ok(candidates);
            }
            None
        }
        Err(err) => Some(err),
    };

    match driver.navigate(&scan.listing_url, timeout).await {
        Ok(page) => Ok(scan_anchors(scan, &page.body, cap)),
        Err(fallback) => match raw_failure {
            Some(raw) => Err(ResolveError::Unreachable { raw, fallback }),
            None => Err(ResolveError::FallbackFailed { fallback }),
        },
    }
}

fn scan_raw(scan: &ListingScan, payload: &str, cap: usize) -> Vec<Candidate> {
    let hrefs = scan.pattern.captures_iter(payload).filter_map(|caps| {
        let href = caps.get(1).or_else(|| caps.get(0))?.as_str();
        absolutize(&scan.base, href)
    });
    collect_ranked(hrefs, cap)
}

fn scan_anchors(scan: &ListingScan, body: &str, cap: usize) -> Vec<Candidate> {
    let doc = Html::parse_document(body);
    let hrefs = doc
        .select(&scan.selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| absolutize(&scan.base, href));
    collect_ranked(hrefs, cap)
}

fn absolutize(base: &Url, reference: &str) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(String::from(url));
    }
    base.join(trimmed).ok().map(String::from)
}
