pub mod health;
pub mod insights;
pub mod moods;
pub mod music;
pub mod playlist;
pub mod recommend;

/// Round to 2 decimals for wire output; averages and ratios are reported
/// at this precision everywhere.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
