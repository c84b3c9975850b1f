use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use xcavator_core::{Task, TaskError, Xcom, XcomValue, keys};

use crate::service::Summarizer;

/// Condenses the fetched article text
pub struct SummarizeTask {
    summarizer: Arc<dyn Summarizer>,
}

impl SummarizeTask {
    pub fn new(summarizer: Arc<dyn Summarizer>) -> Self {
        Self { summarizer }
    }
}

#[async_trait]
impl Task for SummarizeTask {
    fn name(&self) -> &str {
        "summarize"
    }

    async fn run(&self, xcom: &mut Xcom) -> Result<Option<XcomValue>, TaskError> {
        let text = match xcom.article(keys::ARTICLE)? {
            Some(article) if !article.text.trim().is_empty() => article.text.clone(),
            _ => {
                info!("No article text, skipping summary");
                return Ok(None);
            }
        };

        let summary = self.summarizer.summarize(&text);
        if summary.is_empty() {
            info!("Summary came out empty");
            return Ok(None);
        }

        xcom.insert(keys::SUMMARY, summary);
        Ok(None)
    }
}
