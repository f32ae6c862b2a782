use std::fs;
use std::path::{Path, PathBuf};

use crawl_logging::crawl_info;
use serde::{Deserialize, Serialize};

use crate::FeedError;

/// Channel presets and the location of the persisted feed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub output_dir: PathBuf,
    pub output_filename: String,
    /// Value of the `version` attribute on the `<rss>` root.
    pub version: String,
    pub title: String,
    pub link: String,
    pub description: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            output_filename: "feeds.xml".to_string(),
            version: "1.0.0".to_string(),
            title: "scrapy generated rss".to_string(),
            link: "http://testerlife.com".to_string(),
            description: "RSS page automatically generated by spider".to_string(),
        }
    }
}

impl FeedSettings {
    /// Load settings from a RON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, FeedError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                crawl_info!("No feed settings at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(FeedError::Config(format!(
                    "cannot read {}: {}",
                    path.display(),
                    err
                )))
            }
        };

        ron::from_str(&content)
            .map_err(|err| FeedError::Config(format!("cannot parse {}: {}", path.display(), err)))
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = FeedSettings::load(&temp.path().join("feed.ron")).unwrap();
        assert_eq!(settings, FeedSettings::default());
        assert_eq!(settings.output_path(), PathBuf::from("./feeds.xml"));
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("feed.ron");
        fs::write(&path, r#"(output_filename: "news.xml", title: "News")"#).unwrap();

        let settings = FeedSettings::load(&path).unwrap();
        assert_eq!(settings.output_filename, "news.xml");
        assert_eq!(settings.title, "News");
        assert_eq!(settings.version, "1.0.0");
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("feed.ron");
        fs::write(&path, "(output_filename: ").unwrap();

        let err = FeedSettings::load(&path).unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));
    }
}
