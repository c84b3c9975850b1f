//! Cross-task exchange ("xcom")
//!
//! The scratch-space shared by all tasks of one pipeline execution. Values are
//! a closed set of variants so a downstream task reading the wrong shape gets a
//! typed error instead of a silent mismatch.
//!
//! Readers must tolerate missing keys: an upstream task may have been skipped
//! or produced nothing. The typed accessors return `Ok(None)` in that case and
//! only fail when a key holds a different variant.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::task::TaskError;

/// Well-known keys the standard tasks agree on
pub mod keys {
    /// Fetched article (`XcomValue::Article`)
    pub const ARTICLE: &str = "article";
    /// Source locator of the work item (`XcomValue::Text`)
    pub const URL: &str = "url";
    /// Hashtags appended to the published post (`XcomValue::Tags`)
    pub const TAGS: &str = "tags";
    /// Extractive summary of the article (`XcomValue::Text`)
    pub const SUMMARY: &str = "article_summarized";
    /// Synthesized narration (`XcomValue::Path`)
    pub const AUDIO: &str = "audio";
    /// Rendered reel (`XcomValue::Path`)
    pub const VIDEO: &str = "video";
}

/// Article fetched from a candidate's link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub headline: String,
    pub text: String,
    pub media: Option<String>,
}

/// A scratch-space value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum XcomValue {
    Text(String),
    Tags(Vec<String>),
    Path(PathBuf),
    Article(Article),
    Json(serde_json::Value),
}

impl XcomValue {
    /// Variant name, used in type mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            XcomValue::Text(_) => "text",
            XcomValue::Tags(_) => "tags",
            XcomValue::Path(_) => "path",
            XcomValue::Article(_) => "article",
            XcomValue::Json(_) => "json",
        }
    }
}

impl From<String> for XcomValue {
    fn from(value: String) -> Self {
        XcomValue::Text(value)
    }
}

impl From<&str> for XcomValue {
    fn from(value: &str) -> Self {
        XcomValue::Text(value.to_string())
    }
}

impl From<PathBuf> for XcomValue {
    fn from(value: PathBuf) -> Self {
        XcomValue::Path(value)
    }
}

impl From<Article> for XcomValue {
    fn from(value: Article) -> Self {
        XcomValue::Article(value)
    }
}

impl From<serde_json::Value> for XcomValue {
    fn from(value: serde_json::Value) -> Self {
        XcomValue::Json(value)
    }
}

/// Scratch-space for one pipeline execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Xcom {
    values: HashMap<String, XcomValue>,
}

macro_rules! typed_accessors {
    ($get:ident, $require:ident, $variant:ident, $ty:ty, $kind:literal) => {
        /// Reads a key expected to hold this variant; `Ok(None)` when absent
        pub fn $get(&self, key: &str) -> Result<Option<&$ty>, TaskError> {
            match self.values.get(key) {
                None => Ok(None),
                Some(XcomValue::$variant(value)) => Ok(Some(value)),
                Some(other) => Err(TaskError::TypeMismatch {
                    key: key.to_string(),
                    expected: $kind,
                    found: other.kind(),
                }),
            }
        }

        /// Like the optional accessor, but a missing key is an error
        pub fn $require(&self, key: &str) -> Result<&$ty, TaskError> {
            self.$get(key)?
                .ok_or_else(|| TaskError::MissingKey(key.to_string()))
        }
    };
}

impl Xcom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a value, replacing whatever the key held before
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<XcomValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&XcomValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<XcomValue> {
        self.values.remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    typed_accessors!(text, require_text, Text, String, "text");
    typed_accessors!(tags, require_tags, Tags, Vec<String>, "tags");
    typed_accessors!(article, require_article, Article, Article, "article");
    typed_accessors!(json, require_json, Json, serde_json::Value, "json");

    /// Reads a path value; `Ok(None)` when absent
    pub fn path(&self, key: &str) -> Result<Option<&Path>, TaskError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(XcomValue::Path(path)) => Ok(Some(path.as_path())),
            Some(other) => Err(TaskError::TypeMismatch {
                key: key.to_string(),
                expected: "path",
                found: other.kind(),
            }),
        }
    }

    pub fn require_path(&self, key: &str) -> Result<&Path, TaskError> {
        self.path(key)?
            .ok_or_else(|| TaskError::MissingKey(key.to_string()))
    }
}
