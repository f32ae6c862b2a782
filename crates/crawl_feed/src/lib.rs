//! Crawl feed: concurrent item aggregation and the persisted RSS document.
mod aggregate;
mod channel;
mod error;
mod item;
mod persist;
mod settings;

pub use aggregate::{ItemAggregator, ItemValue, ListItem, MapItem, StringItem};
pub use channel::{Channel, Feeds};
pub use error::FeedError;
pub use item::FeedItem;
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use settings::FeedSettings;
