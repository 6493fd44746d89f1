use order_stat::kth_by;
use std::cmp::Ordering;

/// Total order over PartialOrd values.
///
/// Incomparable pairs (NaN distances) are treated as equal.
fn partial_order<T: PartialOrd>(x: &T, y: &T) -> Ordering {
    x.partial_cmp(y).unwrap_or(Ordering::Equal)
}

/// Sorted position of the lower median among `len` elements.
pub fn lower_median_rank(len: usize) -> usize {
    len.saturating_sub(1) / 2
}

/// Return the lower median of `arr`: the element that would sit at
/// position `(len - 1) / 2` once sorted. For an even count this is the
/// smaller of the two middle elements, so the result is always one of the
/// inputs.
///
/// ```
/// use vpforest::lower_median;
/// assert_eq!(lower_median(&[1.0]), Some(1.0));
/// assert_eq!(lower_median(&[1.0, 2.0]), Some(1.0));
/// assert_eq!(lower_median(&[2.0, 1.0]), Some(1.0));
/// assert_eq!(lower_median(&[1.0, 3.0, 2.0]), Some(2.0));
/// assert_eq!(lower_median(&[4.0, 1.0, 3.0, 2.0]), Some(2.0));
/// assert_eq!(lower_median::<f64>(&[]), None);
/// ```
pub fn lower_median<T: PartialOrd + Copy>(arr: &[T]) -> Option<T> {
    if arr.is_empty() {
        return None;
    }
    let mut scratch = arr.to_vec();
    Some(select_lower_median(&mut scratch))
}

/// In-place variant of [`lower_median`]; reorders `arr`.
///
/// `arr` must be non-empty.
pub(crate) fn select_lower_median<T: PartialOrd + Copy>(arr: &mut [T]) -> T {
    let k = lower_median_rank(arr.len());
    *kth_by(arr, k, partial_order)
}
