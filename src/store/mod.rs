//! Embedding Store
//!
//! Facade tying the embedding cache, the similarity index and the encoder
//! together for text -> images, image -> images and image -> label queries.

mod config;

pub use config::StoreConfig;

use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::encoder::{Encoder, FileImageLoader, ImageLoader};
use crate::error::{Error, Result};
use crate::persistence::CacheFile;
use crate::storage::{EmbeddingCache, ReconcileReport};
use crate::vector::{argmin, check_dimension, checked_euclidean, SimilarityIndex};

/// Queryable image embedding store over one dataset root.
///
/// Construction loads the cache, reconciles it against the files on disk,
/// saves it if anything changed, snapshots the index and embeds the labels.
/// A value of this type only exists once all of that succeeded. Later file
/// changes are not picked up; open a new store for that.
pub struct EmbeddingStore<E, L = FileImageLoader> {
    root: PathBuf,
    config: StoreConfig,
    encoder: E,
    loader: L,
    cache: EmbeddingCache,
    index: SimilarityIndex,
    label_embeddings: Vec<Vec<f32>>,
    report: ReconcileReport,
}

impl<E: Encoder> EmbeddingStore<E> {
    /// Open a store with the default configuration
    pub fn open(root: impl AsRef<Path>, encoder: E) -> Result<Self> {
        Self::with_config(root, encoder, StoreConfig::default())
    }

    /// Open a store reading images from disk
    pub fn with_config(root: impl AsRef<Path>, encoder: E, config: StoreConfig) -> Result<Self> {
        Self::with_loader(root, encoder, FileImageLoader, config)
    }
}

impl<E: Encoder, L: ImageLoader> EmbeddingStore<E, L> {
    /// Open a store with a custom image loader
    pub fn with_loader(
        root: impl AsRef<Path>,
        encoder: E,
        loader: L,
        config: StoreConfig,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let file = CacheFile::in_root(&root, &config.cache_file_name);

        let (mut cache, recovered) = match EmbeddingCache::load(&file) {
            Ok(cache) => (cache, false),
            Err(Error::CacheCorrupt { path, reason }) => {
                warn!(
                    path = %path.display(),
                    reason = %reason,
                    "Embedding cache corrupt, rebuilding from scratch"
                );
                (EmbeddingCache::new(), true)
            }
            Err(e) => return Err(e),
        };

        let report = cache.reconcile(&root, &config.extensions, &loader, &encoder)?;
        if report.changed() || recovered {
            cache.save(&file)?;
        }

        let index = SimilarityIndex::from_cache(&cache)?;
        let label_embeddings = Self::embed_labels(&encoder, &config.labels, index.dimension())?;

        info!(
            root = %root.display(),
            items = index.len(),
            labels = label_embeddings.len(),
            "Embedding store ready"
        );

        Ok(Self {
            root,
            config,
            encoder,
            loader,
            cache,
            index,
            label_embeddings,
            report,
        })
    }

    fn embed_labels(
        encoder: &E,
        labels: &[String],
        mut dimension: Option<usize>,
    ) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(labels.len());
        for label in labels {
            let embedding = encoder.encode_text(label)?;
            match dimension {
                Some(dim) => check_dimension(dim, embedding.len())?,
                None => dimension = Some(embedding.len()),
            }
            embeddings.push(embedding);
        }
        Ok(embeddings)
    }

    /// Dataset root this store was opened on
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// What the construction-time reconciliation did
    pub fn report(&self) -> &ReconcileReport {
        &self.report
    }

    /// The reconciled cache backing the index
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Indexed item identifiers, in index order
    pub fn list_items(&self) -> &[String] {
        self.index.ids()
    }

    /// Number of indexed items
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Embedding dimension, `None` for an empty dataset
    pub fn dimension(&self) -> Option<usize> {
        self.index.dimension()
    }

    pub fn labels(&self) -> &[String] {
        &self.config.labels
    }

    /// Nearest items to an already computed query vector
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<String>> {
        self.index.top_k(query, k)
    }

    /// Nearest items to `query` with their distances
    pub fn search_scored(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        self.index.top_k_scored(query, k)
    }

    /// Items whose embeddings are closest to the text embedding
    pub fn find_similar_by_text(&self, text: &str, k: usize) -> Result<Vec<String>> {
        let query = self.encoder.encode_text(text)?;
        let results = self.index.top_k(&query, k)?;
        debug!(text = %text, k, hits = results.len(), "Text query");
        Ok(results)
    }

    /// Items closest to the image at `image_path` (relative to the root).
    ///
    /// The image is always loaded and encoded again, even if it is one of
    /// the cached items.
    pub fn find_similar_by_image(
        &self,
        image_path: impl AsRef<Path>,
        k: usize,
    ) -> Result<Vec<String>> {
        let query = self.encode_image_at(image_path.as_ref())?;
        let results = self.index.top_k(&query, k)?;
        debug!(
            image = %image_path.as_ref().display(),
            k,
            hits = results.len(),
            "Image query"
        );
        Ok(results)
    }

    /// Label whose embedding is closest to the image; first label wins ties
    pub fn classify(&self, image_path: impl AsRef<Path>) -> Result<&str> {
        if self.label_embeddings.is_empty() {
            return Err(Error::NoLabels);
        }
        let query = self.encode_image_at(image_path.as_ref())?;

        let distances = self
            .label_embeddings
            .iter()
            .map(|label| checked_euclidean(&query, label))
            .collect::<Result<Vec<f32>>>()?;

        let best = argmin(&distances).ok_or(Error::NoLabels)?;
        let label = self.config.labels[best].as_str();
        debug!(image = %image_path.as_ref().display(), label, "Classified image");
        Ok(label)
    }

    fn encode_image_at(&self, image_path: &Path) -> Result<Vec<f32>> {
        let path = self.resolve(image_path)?;
        let image = self.loader.load(&path)?;
        Ok(self.encoder.encode_image(&image)?)
    }

    /// Join a root-relative path, refusing anything that escapes the root
    fn resolve(&self, image_path: &Path) -> Result<PathBuf> {
        let mut has_name = false;
        for component in image_path.components() {
            match component {
                Component::Normal(_) => has_name = true,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::ImageNotFound(image_path.to_path_buf()));
                }
            }
        }
        if !has_name {
            return Err(Error::ImageNotFound(image_path.to_path_buf()));
        }
        Ok(self.root.join(image_path))
    }
}
