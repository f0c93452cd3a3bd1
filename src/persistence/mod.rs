//! Persistence Module
//!
//! On-disk format for the embedding cache.

mod cache_file;

pub use cache_file::{crc32, decode, encode, CacheFile, CacheRecord};
