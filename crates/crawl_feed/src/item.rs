use serde::{Deserialize, Serialize};

use crate::FeedError;

/// One crawled record destined for the feed.
///
/// Title, link and description are expected to be present; nothing on the
/// aggregation path checks that. Call [`FeedItem::validate`] to enforce it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    #[serde(rename = "pubDate")]
    pub pub_date: String,
    pub description: String,
}

impl FeedItem {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            pub_date: String::new(),
            description: description.into(),
        }
    }

    pub fn with_pub_date(mut self, pub_date: impl Into<String>) -> Self {
        self.pub_date = pub_date.into();
        self
    }

    /// Report the first required field that is blank.
    pub fn validate(&self) -> Result<(), FeedError> {
        let required = [
            ("title", &self.title),
            ("link", &self.link),
            ("description", &self.description),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(FeedError::MissingField(name)),
            None => Ok(()),
        }
    }
}
