use ndarray::ArrayView1;

/// Index and value of the minimum; ties keep the first occurrence.
///
/// Returns `None` for an empty array.
pub(crate) fn argmin(v: ArrayView1<f64>) -> Option<(usize, f64)> {
    let mut iter = v.iter().enumerate();
    let (_, &first) = iter.next()?;
    let mut best = (0usize, first);
    for (i, &val) in iter {
        if val < best.1 {
            best = (i, val);
        }
    }
    Some(best)
}
