//! Store Configuration

/// Embedding store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Cache file name, created directly under the dataset root
    pub cache_file_name: String,

    /// Recognized image extensions, matched case-insensitively
    pub extensions: Vec<String>,

    /// Labels for `classify`, in tie-break order
    pub labels: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_file_name: "clip_embedding.bin".to_string(),
            extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            labels: ["cat", "dog", "bird", "fish", "horse"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl StoreConfig {
    /// Set the cache file name
    pub fn with_cache_file_name(mut self, name: impl Into<String>) -> Self {
        self.cache_file_name = name.into();
        self
    }

    /// Replace the recognized extensions
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the label set
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.cache_file_name, "clip_embedding.bin");
        assert_eq!(config.extensions, vec!["jpg", "jpeg", "png"]);
        assert_eq!(config.labels, vec!["cat", "dog", "bird", "fish", "horse"]);
    }

    #[test]
    fn test_builders() {
        let config = StoreConfig::default()
            .with_cache_file_name("vectors.bin")
            .with_extensions(["png"])
            .with_labels(vec!["car".to_string(), "bike".to_string()]);
        assert_eq!(config.cache_file_name, "vectors.bin");
        assert_eq!(config.extensions, vec!["png"]);
        assert_eq!(config.labels, vec!["car", "bike"]);
    }
}
