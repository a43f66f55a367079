//! Deterministic integer distribution of a total across buckets.

use crate::error::{SizingError, SizingResult};

/// Splits `total` into `buckets` parts whose sizes differ by at most one.
///
/// The first `total % buckets` buckets receive the extra unit.
///
/// # Errors
///
/// Returns `SizingError::InvalidInput` when `buckets` is zero.
///
/// # Examples
///
/// ```
/// use bess_sizing::sizing::allocation::evenly_distribute;
///
/// assert_eq!(evenly_distribute(10, 4).ok(), Some(vec![3, 3, 2, 2]));
/// ```
pub fn evenly_distribute(total: u32, buckets: u32) -> SizingResult<Vec<u32>> {
    if buckets == 0 {
        return Err(SizingError::invalid("cannot distribute across zero buckets"));
    }
    let base = total / buckets;
    let remainder = total % buckets;
    Ok((0..buckets)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect())
}

/// Gives every bucket `min_per_bucket` first, then spreads what is left
/// with [`evenly_distribute`].
///
/// Falls back to a plain even split when the floor cannot be met.
///
/// # Errors
///
/// Returns `SizingError::InvalidInput` when `buckets` is zero.
pub fn allocate_balanced(total: u32, buckets: u32, min_per_bucket: u32) -> SizingResult<Vec<u32>> {
    let floor_total = min_per_bucket.checked_mul(buckets);
    match floor_total {
        Some(floor_total) if floor_total <= total => {
            let extra = evenly_distribute(total - floor_total, buckets)?;
            Ok(extra.into_iter().map(|e| e + min_per_bucket).collect())
        }
        _ => evenly_distribute(total, buckets),
    }
}
