/// Linearly interpolate the series `(t_src, v_src)` onto the grid `t_dst`.
///
/// `t_src` and `t_dst` must be ascending. Grid points outside the source
/// span are returned as NaN so the caller can tell "no data here" apart
/// from a real zero.
pub fn interp(t_src: &[f64], v_src: &[f64], t_dst: &[f64]) -> Vec<f64> {
    assert_eq!(t_src.len(), v_src.len());

    let mut out = Vec::with_capacity(t_dst.len());
    if t_src.is_empty() {
        out.resize(t_dst.len(), f64::NAN);
        return out;
    }

    let last = t_src[t_src.len() - 1];
    let mut segment = 0;
    for &t in t_dst {
        if t < t_src[0] || t > last {
            out.push(f64::NAN);
            continue;
        }
        if t_src.len() == 1 {
            out.push(v_src[0]);
            continue;
        }
        // the grid is ascending too, so the segment cursor only moves forward
        while segment + 2 < t_src.len() && t_src[segment + 1] < t {
            segment += 1;
        }
        let (t0, t1) = (t_src[segment], t_src[segment + 1]);
        if t1 > t0 {
            let factor = (t - t0) / (t1 - t0);
            out.push(factor.mul_add(v_src[segment + 1] - v_src[segment], v_src[segment]));
        } else {
            out.push(v_src[segment]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_source_points_exactly() {
        let t = [0.0, 10.0, 20.0];
        let v = [1.0, 3.0, -1.0];
        assert_eq!(interp(&t, &v, &t), v);
    }

    #[test]
    fn midpoints_are_linear() {
        let t = [0.0, 10.0, 20.0];
        let v = [1.0, 3.0, -1.0];
        assert_eq!(interp(&t, &v, &[5.0, 15.0]), vec![2.0, 1.0]);
    }

    #[test]
    fn outside_the_span_is_nan() {
        let t = [10.0, 20.0];
        let v = [1.0, 2.0];
        let r = interp(&t, &v, &[0.0, 10.0, 25.0]);
        assert!(r[0].is_nan());
        assert_eq!(r[1], 1.0);
        assert!(r[2].is_nan());
    }

    #[test]
    fn single_source_point() {
        let r = interp(&[5.0], &[7.0], &[4.0, 5.0, 6.0]);
        assert!(r[0].is_nan());
        assert_eq!(r[1], 7.0);
        assert!(r[2].is_nan());
    }

    #[test]
    fn empty_source_is_all_nan() {
        let r = interp(&[], &[], &[1.0, 2.0]);
        assert!(r.iter().all(|v| v.is_nan()));
    }
}
