use thiserror::Error;

use crate::PersistError;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to serialize feed: {0}")]
    Serialization(String),
    #[error("failed to persist feed: {0}")]
    Persistence(#[from] PersistError),
    #[error("invalid feed settings: {0}")]
    Config(String),
    #[error("feed item is missing required field `{0}`")]
    MissingField(&'static str),
}
