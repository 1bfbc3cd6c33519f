// Biquad coefficients per the Audio EQ Cookbook (R. Bristow-Johnson),
// https://www.w3.org/TR/audio-eq-cookbook/

use std::f64::consts::PI;

pub const CUTOFF_HZ: f64 = 20.0;

// Section Q values for a 4th order Butterworth response.
const BUTTERWORTH_Q: [f64; 2] = [0.541_196_100_146_197, 1.306_562_964_876_377];

struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    fn lowpass(cutoff_hz: f64, sample_rate_hz: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate_hz;
        let alpha = w0.sin() / (2.0 * q);
        let cos_w0 = w0.cos();
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos_w0) / 2.0 / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: (1.0 - cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    // transposed direct form II, zero initial state
    fn apply(&self, series: &mut [f64]) {
        let mut z1 = 0.0;
        let mut z2 = 0.0;
        for value in series.iter_mut() {
            let x = *value;
            let y = self.b0 * x + z1;
            z1 = self.b1 * x - self.a1 * y + z2;
            z2 = self.b2 * x - self.a2 * y;
            *value = y;
        }
    }
}

/// Forward-only Butterworth low-pass with a fixed 20 Hz cutoff.
///
/// The filter state starts at zero on every `filter` call. When the sample
/// rate leaves no room below Nyquist for the cutoff the series is passed
/// through untouched.
pub struct LowPassFilter {
    sections: Vec<Biquad>,
}

impl LowPassFilter {
    pub fn new(sample_rate_hz: f64) -> Self {
        let mut sections = Vec::new();
        if sample_rate_hz > 2.0 * CUTOFF_HZ {
            for &q in &BUTTERWORTH_Q {
                sections.push(Biquad::lowpass(CUTOFF_HZ, sample_rate_hz, q));
            }
        }
        Self { sections }
    }

    pub fn filter(&self, series: &mut [f64]) {
        for section in &self.sections {
            section.apply(series);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_nyquist_limit_is_identity() {
        let filter = LowPassFilter::new(25.0);
        let mut series = vec![0.5, -1.0, 2.0, 0.0];
        let original = series.clone();
        filter.filter(&mut series);
        assert_eq!(series, original);
    }

    #[test]
    fn zero_in_zero_out() {
        let filter = LowPassFilter::new(100.0);
        let mut series = vec![0.0; 64];
        filter.filter(&mut series);
        assert!(series.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn settles_to_dc_level() {
        let filter = LowPassFilter::new(100.0);
        let mut series = vec![1.0; 512];
        filter.filter(&mut series);
        assert!((series[511] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn attenuates_an_alternating_signal() {
        let filter = LowPassFilter::new(100.0);
        let mut series: Vec<f64> = (0..512).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        filter.filter(&mut series);
        // 50 Hz content is far above the cutoff
        assert!(series[511].abs() < 0.05);
    }
}
