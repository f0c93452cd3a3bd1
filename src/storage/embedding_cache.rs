//! Embedding Cache
//!
//! Identifier -> embedding mapping kept in sync with the files under a
//! dataset root.

use hashbrown::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::scan::{scan_images, DatasetScan, ScanFailure, ScannedImage};
use crate::encoder::{Encoder, ImageLoader};
use crate::error::{Error, Result};
use crate::persistence::{CacheFile, CacheRecord};
use crate::vector::check_dimension;

/// Image that could not be embedded during reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedImage {
    pub id: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Newly embedded items, in enumeration order
    pub added: Vec<String>,
    /// Cached items whose file is gone
    pub removed: Vec<String>,
    /// Files that could not be read or decoded
    pub failed: Vec<FailedImage>,
    /// Files deleted between the scan and their load
    pub vanished: Vec<String>,
    /// Subtrees that could not be listed; their cached items were kept
    pub unscanned: Vec<ScanFailure>,
    /// Items cached after the pass
    pub total: usize,
}

impl ReconcileReport {
    /// Whether the pass mutated the cache
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Pending work computed from a scan, without encoding anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Files on disk missing from the cache
    pub pending: Vec<ScannedImage>,
    /// Cached identifiers with no file on disk, excluding ids under
    /// subtrees the scan could not list
    pub stale: Vec<String>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.stale.is_empty()
    }
}

/// Insertion-ordered embedding cache.
///
/// Every record shares one dimension. `positions` maps each id to its
/// index in `records`.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingCache {
    records: Vec<CacheRecord>,
    positions: HashMap<String, usize>,
}

impl EmbeddingCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records in order; later duplicates replace earlier ones
    pub fn from_records(records: Vec<CacheRecord>) -> Result<Self> {
        let mut cache = Self::new();
        for record in records {
            cache.insert(record.id, record.embedding)?;
        }
        Ok(cache)
    }

    /// Load the persisted cache.
    ///
    /// A missing file yields an empty cache, as does a file that cannot be
    /// read. A file that is present but does not parse is `CacheCorrupt`.
    pub fn load(file: &CacheFile) -> Result<Self> {
        match file.load() {
            Ok(Some(records)) => {
                let cache = Self::from_records(records)?;
                info!(
                    path = %file.path().display(),
                    entries = cache.len(),
                    "Loaded embedding cache"
                );
                Ok(cache)
            }
            Ok(None) => {
                debug!(path = %file.path().display(), "No embedding cache found");
                Ok(Self::new())
            }
            Err(Error::Io(e)) => {
                warn!(
                    path = %file.path().display(),
                    error = %e,
                    "Embedding cache unreadable, starting empty"
                );
                Ok(Self::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Persist every record
    pub fn save(&self, file: &CacheFile) -> Result<()> {
        file.save(&self.records)?;
        info!(
            path = %file.path().display(),
            entries = self.len(),
            "Saved embedding cache"
        );
        Ok(())
    }

    /// Get number of cached embeddings
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Shared embedding dimension, `None` while empty
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(|r| r.embedding.len())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Get just the vector
    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.positions
            .get(id)
            .map(|&pos| self.records[pos].embedding.as_slice())
    }

    /// Identifiers in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.id.as_str())
    }

    /// `(id, vector)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.records
            .iter()
            .map(|r| (r.id.as_str(), r.embedding.as_slice()))
    }

    pub fn records(&self) -> &[CacheRecord] {
        &self.records
    }

    /// Insert or replace an embedding.
    ///
    /// Replacing keeps the item's position. Returns `true` for a new id.
    pub fn insert(&mut self, id: impl Into<String>, embedding: Vec<f32>) -> Result<bool> {
        if let Some(dim) = self.dimension() {
            check_dimension(dim, embedding.len())?;
        }

        let id = id.into();
        if let Some(&pos) = self.positions.get(&id) {
            self.records[pos].embedding = embedding;
            return Ok(false);
        }

        self.positions.insert(id.clone(), self.records.len());
        self.records.push(CacheRecord { id, embedding });
        Ok(true)
    }

    /// Delete an embedding, returns true if it existed
    pub fn remove(&mut self, id: &str) -> bool {
        self.remove_all(std::slice::from_ref(&id)) == 1
    }

    /// Delete every listed id, keeping the order of the survivors
    pub fn remove_all<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let doomed: HashSet<&str> = ids
            .iter()
            .map(|s| s.as_ref())
            .filter(|id| self.positions.contains_key(*id))
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        let before = self.records.len();
        self.records.retain(|r| !doomed.contains(r.id.as_str()));
        self.reindex();
        before - self.records.len()
    }

    fn reindex(&mut self) {
        self.positions.clear();
        for (pos, record) in self.records.iter().enumerate() {
            self.positions.insert(record.id.clone(), pos);
        }
    }

    /// Compare the cache with a scan of the dataset
    pub fn plan(&self, scan: &DatasetScan) -> ReconcilePlan {
        let on_disk: HashSet<&str> = scan.images.iter().map(|img| img.id.as_str()).collect();

        let pending = scan
            .images
            .iter()
            .filter(|img| !self.contains(&img.id))
            .cloned()
            .collect();
        let stale = self
            .ids()
            .filter(|id| !on_disk.contains(id) && !scan.is_unlisted(id))
            .map(str::to_owned)
            .collect();

        ReconcilePlan { pending, stale }
    }

    /// Bring the cache in line with the image files under `root`.
    ///
    /// Stale entries are dropped, then every new file is loaded and
    /// encoded. Files that fail to load are reported and skipped; encoder
    /// failures and dimension mismatches abort the pass. Cached items under
    /// a subdirectory that could not be listed are kept as they are.
    pub fn reconcile<L, E>(
        &mut self,
        root: &Path,
        extensions: &[String],
        loader: &L,
        encoder: &E,
    ) -> Result<ReconcileReport>
    where
        L: ImageLoader + ?Sized,
        E: Encoder + ?Sized,
    {
        let scan = scan_images(root, extensions)?;
        let plan = self.plan(&scan);
        let mut report = ReconcileReport {
            unscanned: scan.failures,
            ..ReconcileReport::default()
        };

        if !plan.stale.is_empty() {
            self.remove_all(plan.stale.as_slice());
            for id in &plan.stale {
                debug!(id = %id, "Removed embedding for deleted image");
            }
            report.removed = plan.stale;
        }

        for image in plan.pending {
            let data = match loader.load(&image.path) {
                Ok(data) => data,
                Err(Error::ImageNotFound(_)) => {
                    warn!(id = %image.id, "Image disappeared during reconciliation");
                    report.vanished.push(image.id);
                    continue;
                }
                Err(e) => {
                    warn!(id = %image.id, error = %e, "Skipping unreadable image");
                    report.failed.push(FailedImage {
                        id: image.id,
                        path: image.path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            debug!(id = %image.id, "Generating embedding");
            let embedding = encoder.encode_image(&data)?;
            self.insert(image.id.clone(), embedding)?;
            report.added.push(image.id);
        }

        report.total = self.len();
        info!(
            images = report.total,
            added = report.added.len(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            unscanned = report.unscanned.len(),
            "Number of images in dataset: {}",
            report.total
        );

        Ok(report)
    }
}
