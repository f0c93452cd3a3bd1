//! imgvec - Persistent Image Embedding Cache
//!
//! Keeps a per-dataset cache of image embeddings in sync with the files on
//! disk and answers exact nearest-neighbor queries against it: images
//! similar to a text, images similar to an image, and image classification
//! against a fixed label set. Embeddings come from an external [`Encoder`].

pub mod encoder;
pub mod error;
pub mod persistence;
pub mod storage;
pub mod store;
pub mod vector;

pub use encoder::{Encoder, FileImageLoader, ImageData, ImageFormat, ImageLoader};
pub use error::{EncoderError, Error, Result};
pub use persistence::{CacheFile, CacheRecord};
pub use storage::{DatasetScan, EmbeddingCache, ReconcilePlan, ReconcileReport, ScanFailure};
pub use store::{EmbeddingStore, StoreConfig};
pub use vector::SimilarityIndex;
