//! Performance signal port
//!
//! Each metric category is subscribed independently so that a host lacking
//! one signal still delivers the others.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::DomainError;

/// Performance entry categories the sampler subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricCategory {
    Paint,
    LargestContentfulPaint,
    FirstInput,
    LayoutShift,
    #[serde(rename = "longtask")]
    LongTask,
}

impl MetricCategory {
    /// Every category, in subscription order.
    pub const ALL: [MetricCategory; 5] = [
        MetricCategory::Paint,
        MetricCategory::LargestContentfulPaint,
        MetricCategory::FirstInput,
        MetricCategory::LayoutShift,
        MetricCategory::LongTask,
    ];

    /// Entry type name as used by browser performance timelines.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCategory::Paint => "paint",
            MetricCategory::LargestContentfulPaint => "largest-contentful-paint",
            MetricCategory::FirstInput => "first-input",
            MetricCategory::LayoutShift => "layout-shift",
            MetricCategory::LongTask => "longtask",
        }
    }
}

impl std::fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::UnknownMetricCategory(s.to_string()))
    }
}

/// One observed performance entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEntry {
    pub name: String,
    pub start_time: f64,
    pub duration: f64,
}

/// Why a category could not be observed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserveError {
    /// The host has no performance observation mechanism at all
    #[error("performance observation is not available")]
    Unavailable,

    /// The host does not support this particular category
    #[error("category '{0}' is not supported")]
    Unsupported(MetricCategory),
}

/// Port trait for subscribing to performance entries.
pub trait PerformanceSource: Send + Sync {
    /// Starts observing `category`. Entries arrive on the returned channel
    /// until the source shuts down or the receiver is dropped.
    fn observe(
        &self,
        category: MetricCategory,
    ) -> Result<mpsc::UnboundedReceiver<PerformanceEntry>, ObserveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names_round_trip_through_from_str() {
        for category in MetricCategory::ALL {
            assert_eq!(category.as_str().parse::<MetricCategory>().unwrap(), category);
        }
        assert!("fps".parse::<MetricCategory>().is_err());
    }

    #[test]
    fn test_category_serde_matches_entry_type() {
        let json = serde_json::to_string(&MetricCategory::LongTask).unwrap();
        assert_eq!(json, "\"longtask\"");
        let json = serde_json::to_string(&MetricCategory::LargestContentfulPaint).unwrap();
        assert_eq!(json, "\"largest-contentful-paint\"");
    }

    #[test]
    fn test_entry_wire_shape() {
        let entry = PerformanceEntry {
            name: "first-contentful-paint".into(),
            start_time: 812.5,
            duration: 0.0,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["startTime"], 812.5);
    }
}
