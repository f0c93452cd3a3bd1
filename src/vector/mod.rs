//! Vector Module
//!
//! Distance computation and the exact top-k similarity index.

mod index;
mod similarity;

pub use index::SimilarityIndex;
pub use similarity::{
    argmin, check_dimension, checked_euclidean, euclidean_distance, rank_ascending,
    squared_euclidean,
};
