use std::borrow::Cow;

use chrono::{DateTime, Utc};
use crawl_logging::{crawl_error, crawl_info};
use parking_lot::RwLock;
use serde::Serialize;

use crate::{AtomicFileWriter, FeedError, FeedItem, FeedSettings};

/// Channel metadata plus the append-only item sequence.
///
/// Items appear in the order their `add_item` calls acquired the lock.
#[derive(Debug)]
pub struct Channel {
    title: String,
    link: String,
    description: String,
    last_build_date: RwLock<String>,
    items: RwLock<Vec<FeedItem>>,
}

impl Channel {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            description: description.into(),
            last_build_date: RwLock::new(String::new()),
            items: RwLock::new(Vec::new()),
        }
    }

    pub fn add_item(&self, item: FeedItem) {
        self.items.write().push(item);
    }

    pub fn add_last_pub_time(&self, pub_time: impl Into<String>) {
        *self.last_build_date.write() = pub_time.into();
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn last_build_date(&self) -> String {
        self.last_build_date.read().clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Snapshot only; a concurrent `add_item` may land right after.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn items(&self) -> Vec<FeedItem> {
        self.items.read().clone()
    }

    pub fn contains_link(&self, link: &str) -> bool {
        self.items.read().iter().any(|item| item.link == link)
    }
}

#[derive(Serialize)]
#[serde(rename = "rss")]
struct RssDocument<'a> {
    #[serde(rename = "@version")]
    version: Cow<'a, str>,
    channel: ChannelDocument<'a>,
}

#[derive(Serialize)]
struct ChannelDocument<'a> {
    title: Cow<'a, str>,
    link: Cow<'a, str>,
    description: Cow<'a, str>,
    #[serde(rename = "lastBuildDate")]
    last_build_date: Cow<'a, str>,
    item: Vec<ItemDocument<'a>>,
}

#[derive(Serialize)]
struct ItemDocument<'a> {
    title: Cow<'a, str>,
    link: Cow<'a, str>,
    #[serde(rename = "pubDate")]
    pub_date: Cow<'a, str>,
    description: Cow<'a, str>,
}

impl<'a> From<&'a FeedItem> for ItemDocument<'a> {
    fn from(item: &'a FeedItem) -> Self {
        Self {
            title: xml_text(&item.title),
            link: xml_text(&item.link),
            pub_date: xml_text(&item.pub_date),
            description: xml_text(&item.description),
        }
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}')
        || c >= '\u{10000}'
}

/// Replace characters XML 1.0 cannot carry with U+FFFD.
fn xml_text(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if is_xml_char(c) { c } else { char::REPLACEMENT_CHARACTER })
            .collect(),
    )
}

/// The aggregate RSS document shared by all crawl workers of one run.
#[derive(Debug)]
pub struct Feeds {
    settings: FeedSettings,
    channel: Channel,
}

impl Default for Feeds {
    fn default() -> Self {
        Self::new()
    }
}

impl Feeds {
    /// Empty feed with the preset channel metadata of [`FeedSettings::default`].
    pub fn new() -> Self {
        Self::with_settings(FeedSettings::default())
    }

    pub fn with_settings(settings: FeedSettings) -> Self {
        let channel = Channel::new(
            settings.title.clone(),
            settings.link.clone(),
            settings.description.clone(),
        );
        Self { settings, channel }
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn add_item(&self, item: FeedItem) {
        self.channel.add_item(item);
    }

    pub fn add_last_pub_time(&self, pub_time: impl Into<String>) {
        self.channel.add_last_pub_time(pub_time);
    }

    /// Stamp the last-build-date in RFC 2822 form.
    pub fn mark_built_at(&self, at: DateTime<Utc>) {
        self.channel.add_last_pub_time(at.to_rfc2822());
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    /// Serialize the whole document without touching the filesystem.
    pub fn to_xml(&self) -> Result<String, FeedError> {
        let last_build_date = self.channel.last_build_date.read();
        let items = self.channel.items.read();
        let document = RssDocument {
            version: xml_text(&self.settings.version),
            channel: ChannelDocument {
                title: xml_text(&self.channel.title),
                link: xml_text(&self.channel.link),
                description: xml_text(&self.channel.description),
                last_build_date: xml_text(&last_build_date),
                item: items.iter().map(ItemDocument::from).collect(),
            },
        };
        quick_xml::se::to_string(&document).map_err(|err| {
            crawl_error!("Failed to serialize feed: {}", err);
            FeedError::Serialization(err.to_string())
        })
    }

    /// Serialize the document, overwrite the configured artifact with it and
    /// return the serialized text.
    ///
    /// Safe to call repeatedly; each call re-serializes the current contents.
    pub fn dumps(&self) -> Result<String, FeedError> {
        let xml = self.to_xml()?;
        let writer = AtomicFileWriter::new(self.settings.output_dir.clone());
        let path = writer
            .write(&self.settings.output_filename, xml.as_bytes())
            .map_err(|err| {
                crawl_error!(
                    "Failed to persist feed to {:?}: {}",
                    self.settings.output_path(),
                    err
                );
                FeedError::from(err)
            })?;
        crawl_info!("Persisted feed with {} items to {:?}", self.len(), path);
        Ok(xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_feed_uses_presets_and_is_empty() {
        let feeds = Feeds::new();
        assert!(feeds.is_empty());
        assert_eq!(feeds.channel().title(), FeedSettings::default().title);
        assert_eq!(feeds.channel().last_build_date(), "");
    }

    #[test]
    fn xml_has_rss_root_with_version() {
        let feeds = Feeds::new();
        let xml = feeds.to_xml().unwrap();
        assert!(xml.starts_with(r#"<rss version="1.0.0">"#), "{xml}");
        assert!(xml.contains("<channel>"));
        assert!(!xml.contains("<item>"));
    }

    #[test]
    fn item_fields_use_rss_element_names() {
        let feeds = Feeds::new();
        feeds.add_item(FeedItem::new("T", "L", "D").with_pub_date("Mon, 01 Jan 2024"));
        let xml = feeds.to_xml().unwrap();
        assert!(
            xml.contains(concat!(
                "<item><title>T</title><link>L</link>",
                "<pubDate>Mon, 01 Jan 2024</pubDate><description>D</description></item>"
            )),
            "{xml}"
        );
    }

    #[test]
    fn markup_in_fields_is_escaped() {
        let feeds = Feeds::new();
        feeds.add_item(FeedItem::new("a < b & c", "http://x/?a=1&b=2", "<p>hi</p>"));
        let xml = feeds.to_xml().unwrap();
        assert!(xml.contains("a &lt; b &amp; c"));
        assert!(!xml.contains("<p>hi</p>"));
    }

    #[test]
    fn characters_outside_xml_are_replaced() {
        assert_eq!(xml_text("plain\ttext\n"), "plain\ttext\n");
        assert!(matches!(xml_text("plain"), Cow::Borrowed(_)));
        assert_eq!(xml_text("a\u{0}b\u{0b}c\u{FFFE}"), "a\u{FFFD}b\u{FFFD}c\u{FFFD}");
        assert_eq!(xml_text("ok \u{1F600}"), "ok \u{1F600}");
    }

    #[test]
    fn mark_built_at_formats_rfc2822() {
        let feeds = Feeds::new();
        let at = DateTime::parse_from_rfc3339("2024-03-12T10:20:30Z")
            .unwrap()
            .with_timezone(&Utc);
        feeds.mark_built_at(at);
        assert_eq!(
            feeds.channel().last_build_date(),
            "Tue, 12 Mar 2024 10:20:30 +0000"
        );
    }
}
