//! Summary statistics over collected sample values

use serde::{Deserialize, Serialize};

/// Count, mean and population standard deviation of a set of values
///
/// `mean` and `stddev` are `None` when the set is empty, so an interval
/// without samples stays distinguishable from one that averaged to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    pub count: usize,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
}

impl SampleStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                count: 0,
                mean: None,
                stddev: None,
            };
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Self {
            count: values.len(),
            mean: Some(mean),
            stddev: Some(variance.sqrt()),
        }
    }

    /// True if mean and standard deviation are defined
    pub fn is_defined(&self) -> bool {
        self.count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values() {
        let stats = SampleStats::from_values(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.mean, None);
        assert_eq!(stats.stddev, None);
        assert!(!stats.is_defined());
    }

    #[test]
    fn test_population_stddev() {
        let stats = SampleStats::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.count, 8);
        assert_eq!(stats.mean, Some(5.0));
        assert_eq!(stats.stddev, Some(2.0));
    }

    #[test]
    fn test_single_value() {
        let stats = SampleStats::from_values(&[3.5]);
        assert_eq!(stats.mean, Some(3.5));
        assert_eq!(stats.stddev, Some(0.0));
    }
}
