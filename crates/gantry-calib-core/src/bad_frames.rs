//! Sample ranges excluded from fitting.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Closed frame-index intervals known to hold untrustworthy data.
///
/// Serialized as `{"ranges": [[start, end], ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadFrameRanges {
    #[serde(default)]
    pub ranges: Vec<(usize, usize)>,
}

impl BadFrameRanges {
    pub fn new(ranges: Vec<(usize, usize)>) -> Result<Self, CoreError> {
        let out = Self { ranges };
        out.validate()?;
        Ok(out)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self.ranges.iter().find(|(s, e)| s > e) {
            Some(&(start, end)) => Err(CoreError::InvertedRange { start, end }),
            None => Ok(()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// `true` if `frame` falls in any range, bounds inclusive.
    pub fn contains(&self, frame: usize) -> bool {
        self.ranges.iter().any(|&(s, e)| s <= frame && frame <= e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inclusive_ranges() {
        let bad = BadFrameRanges::new(vec![(10, 20), (30, 30)]).unwrap();
        assert!(!bad.contains(9));
        assert!(bad.contains(10));
        assert!(bad.contains(20));
        assert!(!bad.contains(21));
        assert!(bad.contains(30));
    }

    #[test]
    fn json_shape() {
        let bad: BadFrameRanges = serde_json::from_str(r#"{"ranges": [[1, 2], [5, 9]]}"#).unwrap();
        assert_eq!(bad.ranges, vec![(1, 2), (5, 9)]);
    }

    #[test]
    fn missing_ranges_field_is_empty() {
        let bad: BadFrameRanges = serde_json::from_str("{}").unwrap();
        assert!(bad.is_empty());
    }

    #[test]
    fn rejects_inverted() {
        assert_eq!(
            BadFrameRanges::new(vec![(4, 3)]).unwrap_err(),
            CoreError::InvertedRange { start: 4, end: 3 }
        );
    }
}
