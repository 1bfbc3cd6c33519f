/// Per-axis affine correction with a linear temperature term.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub intercept: [f64; 3],
    pub slope: [f64; 3],
    pub temp_coef: [f64; 3],
    /// Temperature the coefficients were estimated at.
    pub mean_temp: f64,
    /// Sensor full-scale range in g.
    pub range: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            intercept: [0.0; 3],
            slope: [1.0; 3],
            temp_coef: [0.0; 3],
            mean_temp: 0.0,
            range: 8.0,
        }
    }
}

/// Which clip counters one sample touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clipped {
    pub before: bool,
    pub after: bool,
}

impl Calibration {
    /// Correct one sample (axes in g). Values are saturated back into
    /// `±range`; a sample that was already pinned at the sensor limit stays
    /// pinned on the side its corrected sign points to, so calibration
    /// overshoot cannot flip a rail reading to the opposite rail.
    pub fn apply(&self, sample: [f64; 3], temperature_c: f64) -> ([f64; 3], Clipped) {
        let range = self.range;
        let clipped_before = sample.iter().any(|a| a.abs() >= range);

        let mc_temp = temperature_c - self.mean_temp;
        let mut out = [0.0; 3];
        for axis in 0..3 {
            out[axis] =
                self.intercept[axis] + self.slope[axis] * sample[axis] + self.temp_coef[axis] * mc_temp;
        }

        let clipped_after = !clipped_before && out.iter().any(|a| a.abs() > range);
        for value in out.iter_mut() {
            if *value < -range {
                *value = -range;
            } else if clipped_before && *value < 0.0 {
                *value = -range;
            } else if *value > range {
                *value = range;
            } else if clipped_before && *value > 0.0 {
                *value = range;
            }
        }

        (out, Clipped { before: clipped_before, after: clipped_after })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_leaves_samples_alone() {
        let calibration = Calibration::default();
        let (out, clipped) = calibration.apply([0.5, -0.25, 1.0], 20.0);
        assert_eq!(out, [0.5, -0.25, 1.0]);
        assert_eq!(clipped, Clipped::default());
    }

    #[test]
    fn temperature_term_is_relative_to_mean_temp() {
        let calibration = Calibration {
            temp_coef: [0.01, 0.0, 0.0],
            mean_temp: 20.0,
            ..Calibration::default()
        };
        let (out, _) = calibration.apply([0.0, 0.0, 1.0], 25.0);
        assert!((out[0] - 0.05).abs() < 1e-12);
        assert_eq!(out[2], 1.0);
    }

    #[test]
    fn rail_reading_keeps_its_corrected_polarity() {
        // a sample pinned at +range whose correction lands negative must
        // saturate to the negative rail, not bounce back to +range
        let calibration = Calibration {
            intercept: [-5.0, 0.0, 0.0],
            slope: [0.5, 1.0, 1.0],
            ..Calibration::default()
        };
        let (out, clipped) = calibration.apply([8.0, 0.0, 0.0], 0.0);
        assert_eq!(out[0], -8.0);
        assert!(clipped.before);
        assert!(!clipped.after);
    }

    #[test]
    fn rail_reading_keeps_positive_polarity_too() {
        let calibration = Calibration {
            intercept: [5.0, 0.0, 0.0],
            slope: [0.5, 1.0, 1.0],
            ..Calibration::default()
        };
        let (out, clipped) = calibration.apply([-8.0, 0.0, 0.0], 0.0);
        assert_eq!(out[0], 8.0);
        assert!(clipped.before);
        assert!(!clipped.after);
    }

    #[test]
    fn overshoot_without_preclip_counts_once_and_saturates() {
        let calibration = Calibration {
            slope: [2.0, 1.0, 1.0],
            ..Calibration::default()
        };
        let (out, clipped) = calibration.apply([5.0, 0.0, 0.0], 0.0);
        assert_eq!(out[0], 8.0);
        assert!(!clipped.before);
        assert!(clipped.after);
    }

    #[test]
    fn negative_overshoot_saturates_to_the_negative_rail() {
        let calibration = Calibration {
            slope: [2.0, 1.0, 1.0],
            ..Calibration::default()
        };
        let (out, clipped) = calibration.apply([-5.0, 0.0, 0.0], 0.0);
        assert_eq!(out[0], -8.0);
        assert!(clipped.after);
    }
}
