use serde::Serialize;

/// Headroom added above and below the observed latencies, in ms.
pub const SCALE_PADDING: f64 = 3.0;
/// Smallest vertical range the chart will show, in ms.
pub const MIN_SCALE_RANGE: f64 = 10.0;

/// Vertical value range the plot area maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scale {
    pub min: f64,
    pub max: f64,
}

impl Scale {
    /// `None` when there is nothing to scale against.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let lowest = values.iter().copied().reduce(f64::min)?;
        let highest = values.iter().copied().reduce(f64::max)?;

        let mut min = (lowest - SCALE_PADDING).max(0.0);
        let mut max = highest + SCALE_PADDING;
        if max - min < MIN_SCALE_RANGE {
            let mid = (min + max) / 2.0;
            min = (mid - MIN_SCALE_RANGE / 2.0).max(0.0);
            max = min + MIN_SCALE_RANGE;
        }
        Some(Self { min, max })
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Position of `value` within the range, 0.0 at `min` and 1.0 at `max`.
    pub fn fraction(&self, value: f64) -> f64 {
        ((value - self.min) / self.range()).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_both_ends() {
        let scale = Scale::from_values(&[40.0, 80.0]).expect("scale");
        assert_eq!(scale, Scale { min: 37.0, max: 83.0 });
    }

    #[test]
    fn narrow_ranges_widen_around_the_midpoint() {
        let scale = Scale::from_values(&[40.0, 42.0]).expect("scale");
        assert_eq!(scale, Scale { min: 36.0, max: 46.0 });
        assert!(scale.contains(40.0) && scale.contains(42.0));
    }

    #[test]
    fn widening_is_floored_at_zero() {
        let scale = Scale::from_values(&[1.0]).expect("scale");
        assert_eq!(scale, Scale { min: 0.0, max: 10.0 });
    }

    #[test]
    fn no_values_no_scale() {
        assert_eq!(Scale::from_values(&[]), None);
    }

    #[test]
    fn every_value_lies_within_the_scale() {
        let samples: [&[f64]; 5] = [
            &[0.0],
            &[0.4, 0.9],
            &[5.0, 5.0, 5.0],
            &[12.5, 300.0, 48.0],
            &[999.0, 1.0],
        ];
        for values in samples {
            let scale = Scale::from_values(values).expect("scale");
            assert!(scale.range() >= MIN_SCALE_RANGE);
            assert!(scale.min >= 0.0);
            assert!(values.iter().all(|v| scale.contains(*v)), "{values:?} vs {scale:?}");
        }
    }
}
