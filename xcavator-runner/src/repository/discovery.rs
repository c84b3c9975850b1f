//! Work discovery
//!
//! Produces a fresh list of candidates on demand. The scheduler treats any
//! error as "zero candidates this cycle".

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use xcavator_core::Candidate;

/// Repository trait for candidate discovery
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Fetches the current list of candidates
    async fn discover(&self) -> Result<Vec<Candidate>>;
}

/// CSS selectors describing a listing page
///
/// `item` selects one element per story; the other selectors are evaluated
/// inside each item.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    pub item: String,
    pub link: String,
    pub image: String,
    pub date: String,
}

impl Default for ListingSelectors {
    /// Layout of the NDTV "latest" listing
    fn default() -> Self {
        Self {
            item: ".NwsLstPg-a-li".to_string(),
            link: "h2 a".to_string(),
            image: "img".to_string(),
            date: "nav ul li".to_string(),
        }
    }
}

struct CompiledSelectors {
    item: Selector,
    link: Selector,
    image: Selector,
    date: Selector,
}

impl CompiledSelectors {
    fn compile(selectors: &ListingSelectors) -> Result<Self> {
        Ok(Self {
            item: parse_selector(&selectors.item)?,
            link: parse_selector(&selectors.link)?,
            image: parse_selector(&selectors.image)?,
            date: parse_selector(&selectors.date)?,
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow::anyhow!("invalid selector '{}': {}", selector, e))
}

/// Scrapes a listing page for story links
pub struct HtmlListingDiscoverer {
    client: Client,
    listing_url: String,
    selectors: CompiledSelectors,
}

impl HtmlListingDiscoverer {
    /// Creates a new listing discoverer
    ///
    /// # Arguments
    /// * `client` - HTTP client (timeouts and headers configured by the caller)
    /// * `listing_url` - Page listing the latest stories
    /// * `selectors` - Where stories live in the page
    pub fn new(client: Client, listing_url: String, selectors: &ListingSelectors) -> Result<Self> {
        Ok(Self {
            client,
            listing_url,
            selectors: CompiledSelectors::compile(selectors)?,
        })
    }
}

#[async_trait]
impl Discoverer for HtmlListingDiscoverer {
    async fn discover(&self) -> Result<Vec<Candidate>> {
        let response = self
            .client
            .get(&self.listing_url)
            .send()
            .await
            .context("Failed to fetch listing page")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch listing: {}", response.status());
        }

        let html = response
            .text()
            .await
            .context("Failed to read listing body")?;

        let candidates = parse_listing(&html, &self.listing_url, &self.selectors);
        debug!("Listing yielded {} candidate(s)", candidates.len());

        Ok(candidates)
    }
}

/// Extracts candidates from a listing page
///
/// Items without a link are dropped; repeated links keep their first
/// occurrence. Relative links and images resolve against `base_url`.
fn parse_listing(html: &str, base_url: &str, selectors: &CompiledSelectors) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for item in document.select(&selectors.item) {
        let Some(anchor) = item.select(&selectors.link).next() else {
            continue;
        };
        let Some(link) = anchor
            .value()
            .attr("href")
            .and_then(|href| resolve(base.as_ref(), href))
        else {
            continue;
        };

        if !seen.insert(link.clone()) {
            continue;
        }

        let title = text_of(&anchor);
        let mut candidate = Candidate::new(title, link);

        if let Some(src) = item
            .select(&selectors.image)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| resolve(base.as_ref(), src))
        {
            candidate = candidate.with_image(src);
        }

        if let Some(date) = item
            .select(&selectors.date)
            .next()
            .map(|el| text_of(&el))
            .filter(|d| !d.is_empty())
        {
            candidate = candidate.with_date(date);
        }

        candidates.push(candidate);
    }

    candidates
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Url::parse(href).ok().map(|u| u.to_string()),
    }
}

fn text_of(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body><ul>
          <li class="NwsLstPg-a-li">
            <img src="https://c.ndtvimg.com/one.jpg">
            <h2><a href="https://www.ndtv.com/india-news/story-one">Story  One</a></h2>
            <nav><ul><li>Friday, October 16, 2026</li></ul></nav>
          </li>
          <li class="NwsLstPg-a-li">
            <h2><a href="/world-news/story-two">Story Two</a></h2>
          </li>
          <li class="NwsLstPg-a-li">
            <h2>No link here</h2>
          </li>
          <li class="NwsLstPg-a-li">
            <h2><a href="https://www.ndtv.com/india-news/story-one">Duplicate</a></h2>
          </li>
        </ul></body></html>
    "#;

    fn selectors() -> CompiledSelectors {
        CompiledSelectors::compile(&ListingSelectors::default()).unwrap()
    }

    #[test]
    fn test_parse_listing_extracts_candidates() {
        let candidates = parse_listing(LISTING, "https://www.ndtv.com/latest", &selectors());

        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.title, "Story One");
        assert_eq!(first.key, "https://www.ndtv.com/india-news/story-one");
        assert_eq!(first.image.as_deref(), Some("https://c.ndtvimg.com/one.jpg"));
        assert_eq!(first.date.as_deref(), Some("Friday, October 16, 2026"));

        let second = &candidates[1];
        assert_eq!(second.link, "https://www.ndtv.com/world-news/story-two");
        assert!(second.image.is_none());
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let selectors = ListingSelectors {
            item: "[[".to_string(),
            ..ListingSelectors::default()
        };
        assert!(HtmlListingDiscoverer::new(Client::new(), "https://x".into(), &selectors).is_err());
    }
}
