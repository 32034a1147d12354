//! Compression quality presets and output size estimation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target quality for a compression job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionQuality {
    /// 720p, roughly 60% of the input size.
    High,
    /// 480p, roughly 40% of the input size.
    #[default]
    Medium,
    /// 360p, roughly 20% of the input size.
    Low,
}

impl CompressionQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionQuality::High => "high",
            CompressionQuality::Medium => "medium",
            CompressionQuality::Low => "low",
        }
    }

    /// Fraction of the input size the output is expected to keep.
    pub fn reduction_factor(&self) -> f64 {
        match self {
            CompressionQuality::High => 0.6,
            CompressionQuality::Medium => 0.4,
            CompressionQuality::Low => 0.2,
        }
    }
}

impl fmt::Display for CompressionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(CompressionQuality::High),
            "medium" => Ok(CompressionQuality::Medium),
            "low" => Ok(CompressionQuality::Low),
            other => Err(format!("unknown compression quality: {}", other)),
        }
    }
}

/// Estimated compressed size in megabytes.
pub fn estimate_size_mb(input_size_mb: f64, quality: CompressionQuality) -> f64 {
    input_size_mb * quality.reduction_factor()
}

/// Estimated compressed size for an input given in bytes, formatted to two decimals.
pub fn estimate_size_label(input_size_bytes: u64, quality: CompressionQuality) -> String {
    let size_mb = input_size_bytes as f64 / (1024.0 * 1024.0);
    format!("{:.2}", estimate_size_mb(size_mb, quality))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_medium_estimate_of_100_mb() {
        let estimate = estimate_size_mb(100.0, CompressionQuality::Medium);
        assert_eq!(format!("{:.2}", estimate), "40.00");
    }

    #[test]
    fn test_reduction_factors() {
        assert_eq!(CompressionQuality::High.reduction_factor(), 0.6);
        assert_eq!(CompressionQuality::Medium.reduction_factor(), 0.4);
        assert_eq!(CompressionQuality::Low.reduction_factor(), 0.2);
    }

    #[test]
    fn test_label_from_bytes() {
        let bytes = 100 * 1024 * 1024;
        assert_eq!(estimate_size_label(bytes, CompressionQuality::High), "60.00");
        assert_eq!(estimate_size_label(bytes, CompressionQuality::Low), "20.00");
        assert_eq!(estimate_size_label(0, CompressionQuality::Low), "0.00");
    }

    #[test]
    fn test_default_is_medium() {
        assert_eq!(CompressionQuality::default(), CompressionQuality::Medium);
    }

    #[test]
    fn test_parse() {
        assert_eq!("low".parse::<CompressionQuality>(), Ok(CompressionQuality::Low));
        assert!("ultra".parse::<CompressionQuality>().is_err());
    }
}
