// Parameter scaling - maps normalized knob factors onto device ranges

/// Map a normalized factor (0..1) onto a logarithmic scale ending at `max`.
///
/// A factor of 1 yields `max`, a factor of 0 yields `min`, and each step in
/// between covers an equal number of octaves.
pub fn log_scale(factor: f32, min: f32, max: f32) -> f32 {
    let octaves = (max / min).log2();
    2f32.powf(octaves * (factor - 1.0)) * max
}

/// Cutoff frequency for a normalized factor, from `min` Hz up to nyquist
pub fn cutoff(factor: f32, min: f32, sample_rate: f32) -> f32 {
    log_scale(factor, min, sample_rate * 0.5)
}

/// Closed range of a user-facing setting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_scale_endpoints() {
        assert!((log_scale(1.0, 10.0, 24000.0) - 24000.0).abs() < 1e-2);
        assert!((log_scale(0.0, 10.0, 24000.0) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_log_scale_midpoint_is_geometric_mean() {
        let mid = log_scale(0.5, 10.0, 1000.0);
        assert!((mid - 100.0).abs() < 1e-2, "mid = {}", mid);
    }

    #[test]
    fn test_cutoff_uses_nyquist() {
        assert!((cutoff(1.0, 10.0, 48000.0) - 24000.0).abs() < 1e-2);
    }

    #[test]
    fn test_range_clamp() {
        let range = Range::new(0.0, 5.0);
        assert_eq!(range.clamp(7.0), 5.0);
        assert_eq!(range.clamp(-1.0), 0.0);
        assert_eq!(range.clamp(f32::NAN), 0.0);
        assert_eq!(range.clamp(2.5), 2.5);
    }
}
