use crawl_logging::crawl_debug;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::{FeedError, FeedItem, Feeds};

/// Payload handed to an [`ItemAggregator`].
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValue {
    /// Keyed value for a [`MapItem`].
    Entry { key: String, value: Value },
    /// Element for a [`ListItem`].
    Element(Value),
    /// Scalar for a [`StringItem`].
    Text(String),
    /// Crawled record for [`Feeds`].
    Feed(FeedItem),
}

impl ItemValue {
    pub fn entry(key: impl Into<String>, value: impl Into<Value>) -> Self {
        ItemValue::Entry {
            key: key.into(),
            value: value.into(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ItemValue::Entry { .. } => "entry",
            ItemValue::Element(_) => "element",
            ItemValue::Text(_) => "text",
            ItemValue::Feed(_) => "feed item",
        }
    }
}

impl From<FeedItem> for ItemValue {
    fn from(item: FeedItem) -> Self {
        ItemValue::Feed(item)
    }
}

/// Capability set shared by every aggregator variant.
///
/// `add` silently drops payloads the variant does not accept.
pub trait ItemAggregator: Send + Sync {
    fn add(&self, value: ItemValue);

    fn dumps(&self) -> Result<String, FeedError>;

    fn is_empty(&self) -> bool;

    fn contains(&self, key: &str) -> bool;
}

fn ignored(variant: &str, value: &ItemValue) {
    crawl_debug!("{} ignores {} payload", variant, value.kind());
}

/// Insertion-ordered key/value collection, dumped as a JSON object.
#[derive(Debug, Default)]
pub struct MapItem {
    entries: RwLock<Map<String, Value>>,
}

impl MapItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

impl ItemAggregator for MapItem {
    fn add(&self, value: ItemValue) {
        match value {
            ItemValue::Entry { key, value } => {
                self.entries.write().insert(key, value);
            }
            other => ignored("MapItem", &other),
        }
    }

    fn dumps(&self) -> Result<String, FeedError> {
        serde_json::to_string(&*self.entries.read())
            .map_err(|err| FeedError::Serialization(err.to_string()))
    }

    fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}

/// Ordered sequence of values, dumped as a JSON array.
#[derive(Debug, Default)]
pub struct ListItem {
    elements: RwLock<Vec<Value>>,
}

impl ListItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.read().len()
    }
}

impl ItemAggregator for ListItem {
    fn add(&self, value: ItemValue) {
        match value {
            ItemValue::Element(element) => self.elements.write().push(element),
            other => ignored("ListItem", &other),
        }
    }

    fn dumps(&self) -> Result<String, FeedError> {
        serde_json::to_string(&*self.elements.read())
            .map_err(|err| FeedError::Serialization(err.to_string()))
    }

    fn is_empty(&self) -> bool {
        self.elements.read().is_empty()
    }

    /// True when some element is the string `key`.
    fn contains(&self, key: &str) -> bool {
        self.elements
            .read()
            .iter()
            .any(|element| element.as_str() == Some(key))
    }
}

/// Single scalar; every `add` replaces the previous value.
#[derive(Debug, Default)]
pub struct StringItem {
    value: RwLock<String>,
}

impl StringItem {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(value.into()),
        }
    }
}

impl ItemAggregator for StringItem {
    fn add(&self, value: ItemValue) {
        match value {
            ItemValue::Text(text) => *self.value.write() = text,
            other => ignored("StringItem", &other),
        }
    }

    fn dumps(&self) -> Result<String, FeedError> {
        Ok(self.value.read().clone())
    }

    fn is_empty(&self) -> bool {
        self.value.read().is_empty()
    }

    /// Substring match.
    fn contains(&self, key: &str) -> bool {
        self.value.read().contains(key)
    }
}

impl ItemAggregator for Feeds {
    fn add(&self, value: ItemValue) {
        match value {
            ItemValue::Feed(item) => self.add_item(item),
            other => ignored("Feeds", &other),
        }
    }

    fn dumps(&self) -> Result<String, FeedError> {
        Feeds::dumps(self)
    }

    fn is_empty(&self) -> bool {
        Feeds::is_empty(self)
    }

    /// True when an item with this link has been collected.
    fn contains(&self, key: &str) -> bool {
        self.channel().contains_link(key)
    }
}
