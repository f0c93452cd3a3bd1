//! Storage Module
//!
//! Embedding cache and the dataset scan that keeps it in sync.

mod embedding_cache;
mod scan;

pub use embedding_cache::{EmbeddingCache, FailedImage, ReconcilePlan, ReconcileReport};
pub use scan::{has_image_extension, item_id, scan_images, DatasetScan, ScanFailure, ScannedImage};
