use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use tracing::debug;
use xcavator_core::{Task, TaskError, Xcom, XcomValue, keys};

use crate::service::ArticleFetcher;

/// Fetches the story behind the seeded `url` and derives its hashtags
pub struct FetchArticleTask {
    fetcher: Arc<dyn ArticleFetcher>,
    /// Listing image, used when the story page has none
    fallback_image: Option<String>,
}

impl FetchArticleTask {
    pub fn new(fetcher: Arc<dyn ArticleFetcher>, fallback_image: Option<String>) -> Self {
        Self {
            fetcher,
            fallback_image,
        }
    }
}

#[async_trait]
impl Task for FetchArticleTask {
    fn name(&self) -> &str {
        "fetch_article"
    }

    async fn run(&self, xcom: &mut Xcom) -> Result<Option<XcomValue>, TaskError> {
        let url = xcom.require_text(keys::URL)?.clone();

        let mut article = self.fetcher.fetch(&url).await?;
        if article.media.is_none() {
            article.media = self.fallback_image.clone();
        }
        debug!(url = %url, "Fetched '{}'", article.headline);

        let mut tags = match xcom.tags(keys::TAGS)? {
            Some(tags) => tags.clone(),
            None => vec!["#news".to_string()],
        };
        if is_sports(&url) && !tags.iter().any(|t| t == "#sports") {
            tags.push("#sports".to_string());
        }

        xcom.insert(keys::ARTICLE, article);
        xcom.insert(keys::TAGS, XcomValue::Tags(tags));

        Ok(None)
    }
}

fn is_sports(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.starts_with("sports.")))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::fakes::FakeFetcher;

    fn seeded(url: &str) -> Xcom {
        let mut xcom = Xcom::new();
        xcom.insert(keys::URL, url);
        xcom
    }

    #[tokio::test]
    async fn test_writes_article_and_news_tag() {
        let task = FetchArticleTask::new(Arc::new(FakeFetcher::with_text("Body")), None);
        let mut xcom = seeded("https://www.ndtv.com/india-news/story");

        let result = task.run(&mut xcom).await.unwrap();

        assert!(result.is_none());
        assert_eq!(xcom.require_article(keys::ARTICLE).unwrap().text, "Body");
        assert_eq!(xcom.require_tags(keys::TAGS).unwrap(), &vec!["#news".to_string()]);
    }

    #[tokio::test]
    async fn test_sports_host_adds_sports_tag() {
        let task = FetchArticleTask::new(Arc::new(FakeFetcher::with_text("Body")), None);
        let mut xcom = seeded("https://sports.ndtv.com/cricket/story");

        task.run(&mut xcom).await.unwrap();

        assert_eq!(
            xcom.require_tags(keys::TAGS).unwrap(),
            &vec!["#news".to_string(), "#sports".to_string()]
        );
    }

    #[tokio::test]
    async fn test_listing_image_fills_missing_media() {
        let task = FetchArticleTask::new(
            Arc::new(FakeFetcher::with_text("Body")),
            Some("https://c.ndtvimg.com/one.jpg".to_string()),
        );
        let mut xcom = seeded("https://www.ndtv.com/india-news/story");

        task.run(&mut xcom).await.unwrap();

        assert_eq!(
            xcom.require_article(keys::ARTICLE).unwrap().media.as_deref(),
            Some("https://c.ndtvimg.com/one.jpg")
        );
    }

    #[tokio::test]
    async fn test_missing_url_fails() {
        let task = FetchArticleTask::new(Arc::new(FakeFetcher::with_text("Body")), None);
        let err = task.run(&mut Xcom::new()).await.unwrap_err();
        assert!(matches!(err, TaskError::MissingKey(_)));
    }

    #[tokio::test]
    async fn test_fetch_error_fails_task() {
        let fetcher = FakeFetcher {
            fail: true,
            ..FakeFetcher::with_text("")
        };
        let task = FetchArticleTask::new(Arc::new(fetcher), None);
        let mut xcom = seeded("https://www.ndtv.com/india-news/story");

        assert!(task.run(&mut xcom).await.is_err());
        assert!(!xcom.contains(keys::ARTICLE));
    }
}
