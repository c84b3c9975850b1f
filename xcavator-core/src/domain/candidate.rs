//! Candidate domain types

use serde::{Deserialize, Serialize};

/// A discovered work item not yet known to be processed
///
/// `key` is the identity used for deduplication. It must be stable across
/// discovery calls for the same real-world item, which is why it defaults to
/// the item's link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub key: String,
    pub title: String,
    pub link: String,
    pub image: Option<String>,
    pub date: Option<String>,
}

impl Candidate {
    /// Creates a candidate keyed by its link
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        let link = link.into();
        Self {
            key: link.clone(),
            title: title.into(),
            link,
            image: None,
            date: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Whether the candidate carries the identity and locator a pipeline needs
    pub fn is_dispatchable(&self) -> bool {
        !self.key.trim().is_empty() && !self.link.trim().is_empty()
    }
}
