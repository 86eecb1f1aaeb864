/// Point on a sphere of `radius`, Y up, azimuth measured from +X toward +Z.
pub fn spherical_to_cartesian(azimuth: f32, elevation: f32, radius: f32) -> [f32; 3] {
    let cos_elevation = elevation.cos();
    [
        azimuth.cos() * cos_elevation * radius,
        elevation.sin() * radius,
        azimuth.sin() * cos_elevation * radius,
    ]
}

pub fn distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
}

/// Median of `values`, averaging the two middle samples for even lengths.
/// `None` when empty.
pub fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) * 0.5)
    } else {
        Some(values[mid])
    }
}

pub fn mean(values: &[f32]) -> f32 {
    let sum: f32 = values.iter().sum();
    sum / (values.len().max(1) as f32)
}
