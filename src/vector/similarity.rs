//! Vector Distance Functions
//!
//! Euclidean distance and ascending-distance ranking.

use std::cmp::Ordering;

use crate::error::{Error, Result};

/// Fail with `DimensionMismatch` unless both lengths agree
#[inline]
pub fn check_dimension(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Compute squared Euclidean distance of two equal-length vectors
///
/// Uses unrolled loop for better CPU performance.
#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let len = a.len();
    let mut sum = 0.0f32;

    // Process 4 elements at a time (manual unrolling)
    let chunks = len / 4;
    let remainder = len % 4;

    for i in 0..chunks {
        let idx = i * 4;
        let d0 = a[idx] - b[idx];
        let d1 = a[idx + 1] - b[idx + 1];
        let d2 = a[idx + 2] - b[idx + 2];
        let d3 = a[idx + 3] - b[idx + 3];
        sum += d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3;
    }

    for i in (len - remainder)..len {
        let d = a[i] - b[i];
        sum += d * d;
    }

    sum
}

/// Compute Euclidean distance of two equal-length vectors
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    squared_euclidean(a, b).sqrt()
}

/// Euclidean distance that rejects vectors of different dimension
pub fn checked_euclidean(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dimension(a.len(), b.len())?;
    Ok(euclidean_distance(a, b))
}

/// Order positions by ascending distance.
///
/// The sort is stable, so equal distances keep their original position
/// order. NaN distances rank after every finite distance.
pub fn rank_ascending(distances: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..distances.len()).collect();
    order.sort_by(|&a, &b| compare_distance(distances[a], distances[b]));
    order
}

/// Position of the smallest distance, first one wins on ties
pub fn argmin(distances: &[f32]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &d) in distances.iter().enumerate() {
        match best {
            Some(b) if compare_distance(d, distances[b]) != Ordering::Less => {}
            _ => best = Some(i),
        }
    }
    best
}

#[inline]
fn compare_distance(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.total_cmp(&b),
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
    }
}
