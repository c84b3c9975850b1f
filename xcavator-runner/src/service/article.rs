//! Article fetching
//!
//! Downloads a story page and extracts its headline, body text and lead image.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use xcavator_core::Article;

/// Service trait for fetching an article's content
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Fetches and parses the article at `url`
    async fn fetch(&self, url: &str) -> Result<Article>;
}

/// Fetches story pages over HTTP and parses them with CSS selectors
pub struct HtmlArticleFetcher {
    client: Client,
}

impl HtmlArticleFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArticleFetcher for HtmlArticleFetcher {
    async fn fetch(&self, url: &str) -> Result<Article> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch article {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP {} for {}", response.status(), url);
        }

        let html = response
            .text()
            .await
            .context("Failed to read article body")?;

        parse_article(&html, url)
    }
}

/// Extracts the article from a story page
///
/// Headline comes from `h1[itemprop=headline]`, text from the paragraphs of
/// `div[itemprop=articleBody]` and media from the first image in that body.
fn parse_article(html: &str, url: &str) -> Result<Article> {
    let document = Html::parse_document(html);

    let headline_sel = selector("h1[itemprop='headline']")?;
    let body_sel = selector("div[itemprop='articleBody']")?;
    let paragraph_sel = selector("p")?;
    let image_sel = selector("img")?;

    let headline = document
        .select(&headline_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "No headline found".to_string());

    let body = document.select(&body_sel).next();

    let text = body
        .map(|body| {
            body.select(&paragraph_sel)
                .map(|p| p.text().collect::<String>())
                .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    let base = Url::parse(url).ok();
    let media = body
        .and_then(|body| body.select(&image_sel).next())
        .and_then(|img| img.value().attr("src"))
        .map(|src| match &base {
            Some(base) => base
                .join(src)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| src.to_string()),
            None => src.to_string(),
        });

    Ok(Article {
        headline,
        text,
        media,
    })
}

fn selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| anyhow::anyhow!("invalid selector '{}': {}", s, e))
}
