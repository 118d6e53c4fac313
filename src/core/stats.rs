//! NaN-aware reductions shared by the comparator and the co-registration step

use num_traits::Float;

/// Mean of the finite values, `None` when there are none
pub fn nan_mean<T: Float>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut sum = T::zero();
    let mut count = 0usize;
    for v in values {
        if v.is_finite() {
            sum = sum + v;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        T::from(count).map(|n| sum / n)
    }
}

/// Mean absolute deviation from the 1:1 line
pub fn mean_abs_deviation<T: Float>(a: &[T], b: &[T]) -> Option<T> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    nan_mean(a.iter().zip(b).map(|(&x, &y)| (x - y).abs()))
}

/// Pearson correlation coefficient; `None` for fewer than two samples or a
/// constant input
pub fn pearson<T: Float>(a: &[T], b: &[T]) -> Option<T> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let n = T::from(a.len())?;
    let mean_a = a.iter().fold(T::zero(), |acc, &x| acc + x) / n;
    let mean_b = b.iter().fold(T::zero(), |acc, &x| acc + x) / n;

    let mut cov = T::zero();
    let mut var_a = T::zero();
    let mut var_b = T::zero();
    for (&x, &y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov = cov + dx * dy;
        var_a = var_a + dx * dx;
        var_b = var_b + dy * dy;
    }

    if var_a == T::zero() || var_b == T::zero() {
        return None;
    }
    let r = cov / (var_a * var_b).sqrt();
    // rounding can push |r| a hair past one
    Some(r.max(-T::one()).min(T::one()))
}

/// Squared Pearson correlation
pub fn r_squared<T: Float>(a: &[T], b: &[T]) -> Option<T> {
    pearson(a, b).map(|r| r * r)
}

/// Great-circle distance in meters between two lon/lat points in degrees
pub fn haversine_m(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}
