//! Per-axis index expressions and the axis normalizer
//!
//! A caller describes each axis independently with an [`AxisIndex`]. The
//! normalizer validates both axes against the matrix shape before any
//! storage is touched and hands back a (major, minor) pair of
//! [`Selector`]s ordered for the matrix layout.

use alloc::vec::Vec;
use core::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo};

use crate::error::{CoreError, Result};
use crate::format::{MatrixFormat, Shape};

/// An index expression for one axis, as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisIndex {
    /// A single position
    Int(usize),
    /// A range; missing bounds default to the axis extent, a missing step to 1
    Slice {
        start: Option<usize>,
        stop: Option<usize>,
        step: Option<usize>,
    },
    /// Explicit positions; order is kept in the result
    List(Vec<usize>),
}

impl AxisIndex {
    /// The whole axis
    pub const fn full() -> Self {
        AxisIndex::Slice {
            start: None,
            stop: None,
            step: None,
        }
    }

    /// A range with an explicit step
    pub const fn stepped(start: usize, stop: usize, step: usize) -> Self {
        AxisIndex::Slice {
            start: Some(start),
            stop: Some(stop),
            step: Some(step),
        }
    }
}

impl From<usize> for AxisIndex {
    fn from(index: usize) -> Self {
        AxisIndex::Int(index)
    }
}

impl From<Range<usize>> for AxisIndex {
    fn from(range: Range<usize>) -> Self {
        AxisIndex::Slice {
            start: Some(range.start),
            stop: Some(range.end),
            step: None,
        }
    }
}

impl From<RangeInclusive<usize>> for AxisIndex {
    fn from(range: RangeInclusive<usize>) -> Self {
        AxisIndex::Slice {
            start: Some(*range.start()),
            stop: Some(range.end().saturating_add(1)),
            step: None,
        }
    }
}

impl From<RangeFrom<usize>> for AxisIndex {
    fn from(range: RangeFrom<usize>) -> Self {
        AxisIndex::Slice {
            start: Some(range.start),
            stop: None,
            step: None,
        }
    }
}

impl From<RangeTo<usize>> for AxisIndex {
    fn from(range: RangeTo<usize>) -> Self {
        AxisIndex::Slice {
            start: None,
            stop: Some(range.end),
            step: None,
        }
    }
}

impl From<RangeFull> for AxisIndex {
    fn from(_: RangeFull) -> Self {
        AxisIndex::full()
    }
}

impl From<Vec<usize>> for AxisIndex {
    fn from(positions: Vec<usize>) -> Self {
        AxisIndex::List(positions)
    }
}

impl From<&[usize]> for AxisIndex {
    fn from(positions: &[usize]) -> Self {
        AxisIndex::List(positions.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for AxisIndex {
    fn from(positions: [usize; N]) -> Self {
        AxisIndex::List(positions.to_vec())
    }
}

/// Parse the textual forms `"3"`, `"2:5"`, `":"`, `"1:9:1"` and `"[3,0]"`
impl core::str::FromStr for AxisIndex {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        const BAD: CoreError = CoreError::NotSupported("unparseable index expression");

        let s = s.trim();
        if s.is_empty() {
            return Err(BAD);
        }

        if let Some(inner) = s.strip_prefix('[') {
            let inner = inner.strip_suffix(']').ok_or(BAD)?;
            let mut positions = Vec::new();
            for part in inner.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                positions.push(parse_usize(part).ok_or(BAD)?);
            }
            return Ok(AxisIndex::List(positions));
        }

        if !s.contains(':') {
            return parse_usize(s).map(AxisIndex::Int).ok_or(BAD);
        }

        let mut parts = s.split(':');
        let mut bound = || -> Result<Option<usize>> {
            match parts.next().map(str::trim) {
                None | Some("") => Ok(None),
                Some(text) => parse_usize(text).map(Some).ok_or(BAD),
            }
        };
        let start = bound()?;
        let stop = bound()?;
        let step = bound()?;
        if parts.next().is_some() {
            return Err(BAD);
        }

        Ok(AxisIndex::Slice { start, stop, step })
    }
}

/// Parse a decimal usize, rejecting signs and overflow
fn parse_usize(s: &str) -> Option<usize> {
    // `usize::from_str` accepts a leading '+'
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// A validated selection along one axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Single(usize),
    /// Half-open `[start, stop)`
    Range { start: usize, stop: usize },
    List(Vec<usize>),
}

impl Selector {
    /// Number of output positions along this axis
    pub fn len(&self) -> usize {
        match self {
            Selector::Single(_) => 1,
            Selector::Range { start, stop } => stop - start,
            Selector::List(positions) => positions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the selector spans the whole axis in natural order
    pub fn is_full(&self, dim: usize) -> bool {
        matches!(self, Selector::Range { start: 0, stop } if *stop == dim)
    }

    /// Validate one axis expression against the axis extent
    pub fn from_axis(index: AxisIndex, dim: usize) -> Result<Self> {
        match index {
            AxisIndex::Int(i) => {
                if i >= dim {
                    return Err(CoreError::OutOfBounds { index: i, bound: dim });
                }
                Ok(Selector::Single(i))
            }
            AxisIndex::Slice { start, stop, step } => {
                let step = step.unwrap_or(1);
                if step != 1 {
                    return Err(CoreError::UnsupportedStep(step));
                }
                // A fully open range is the whole axis, even when the axis is empty
                if start.is_none() && stop.is_none() {
                    return Ok(Selector::Range { start: 0, stop: dim });
                }
                if let Some(start) = start {
                    if start >= dim {
                        return Err(CoreError::OutOfBounds { index: start, bound: dim });
                    }
                }
                let start = start.unwrap_or(0);
                let stop = stop.unwrap_or(dim);
                if stop > dim {
                    return Err(CoreError::OutOfBounds { index: stop, bound: dim });
                }
                if start >= stop {
                    return Err(CoreError::EmptyRange { start, stop });
                }
                Ok(Selector::Range { start, stop })
            }
            AxisIndex::List(positions) => {
                // Every element is checked, not just the first
                if let Some(&bad) = positions.iter().find(|&&p| p >= dim) {
                    return Err(CoreError::OutOfBounds { index: bad, bound: dim });
                }
                Ok(Selector::List(positions))
            }
        }
    }
}

/// Validate a (row, col) index expression and order it as (major, minor)
pub fn normalize(
    shape: Shape,
    format: MatrixFormat,
    row: AxisIndex,
    col: AxisIndex,
) -> Result<(Selector, Selector)> {
    let row = Selector::from_axis(row, shape.rows)?;
    let col = Selector::from_axis(col, shape.cols)?;

    if matches!((&row, &col), (Selector::List(_), Selector::List(_))) {
        return Err(CoreError::NotSupported(
            "explicit position lists on both axes",
        ));
    }

    Ok(Shape::to_major_minor(format, row, col))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_single_bounds() {
        assert_eq!(Selector::from_axis(4.into(), 5), Ok(Selector::Single(4)));
        assert_eq!(
            Selector::from_axis(5.into(), 5),
            Err(CoreError::OutOfBounds { index: 5, bound: 5 })
        );
    }

    #[test]
    fn test_range_defaults_and_errors() {
        assert_eq!(
            Selector::from_axis((..).into(), 5),
            Ok(Selector::Range { start: 0, stop: 5 })
        );
        assert_eq!(
            Selector::from_axis((2..).into(), 5),
            Ok(Selector::Range { start: 2, stop: 5 })
        );
        assert_eq!(
            Selector::from_axis((..3).into(), 5),
            Ok(Selector::Range { start: 0, stop: 3 })
        );
        assert_eq!(
            Selector::from_axis((1..=4).into(), 5),
            Ok(Selector::Range { start: 1, stop: 5 })
        );

        assert_eq!(
            Selector::from_axis(AxisIndex::stepped(0, 4, 2), 5),
            Err(CoreError::UnsupportedStep(2))
        );
        assert_eq!(
            Selector::from_axis((3..3).into(), 5),
            Err(CoreError::EmptyRange { start: 3, stop: 3 })
        );
        assert_eq!(
            Selector::from_axis((1..6).into(), 5),
            Err(CoreError::OutOfBounds { index: 6, bound: 5 })
        );
        assert_eq!(
            Selector::from_axis((7..).into(), 5),
            Err(CoreError::OutOfBounds { index: 7, bound: 5 })
        );

        // Whole span of an empty axis is an empty selection, not an error
        assert_eq!(
            Selector::from_axis((..).into(), 0),
            Ok(Selector::Range { start: 0, stop: 0 })
        );
    }

    #[test]
    fn test_list_checks_every_element() {
        assert_eq!(
            Selector::from_axis(vec![3, 0].into(), 5),
            Ok(Selector::List(vec![3, 0]))
        );
        // The offender is not the first element
        assert_eq!(
            Selector::from_axis(vec![0, 1, 9].into(), 5),
            Err(CoreError::OutOfBounds { index: 9, bound: 5 })
        );
    }

    #[test]
    fn test_normalize_orders_axes() {
        let shape = Shape::new(5, 8);
        let (major, minor) =
            normalize(shape, MatrixFormat::Csc, 2.into(), (1..3).into()).unwrap();
        assert_eq!(major, Selector::Range { start: 1, stop: 3 });
        assert_eq!(minor, Selector::Single(2));

        // Column bound applies to the column expression regardless of layout
        assert_eq!(
            normalize(shape, MatrixFormat::Csr, 0.into(), 8.into()),
            Err(CoreError::OutOfBounds { index: 8, bound: 8 })
        );
    }

    #[test]
    fn test_list_on_both_axes() {
        let shape = Shape::new(5, 5);
        assert!(matches!(
            normalize(shape, MatrixFormat::Csr, [0, 1].into(), [2].into()),
            Err(CoreError::NotSupported(_))
        ));
    }

    #[test]
    fn test_parse() {
        assert_eq!("3".parse::<AxisIndex>(), Ok(AxisIndex::Int(3)));
        assert_eq!(":".parse::<AxisIndex>(), Ok(AxisIndex::full()));
        assert_eq!("2:5".parse::<AxisIndex>(), Ok(AxisIndex::from(2..5)));
        assert_eq!("1:9:2".parse::<AxisIndex>(), Ok(AxisIndex::stepped(1, 9, 2)));
        assert_eq!(":4".parse::<AxisIndex>(), Ok(AxisIndex::from(..4)));
        assert_eq!("[3, 0]".parse::<AxisIndex>(), Ok(AxisIndex::List(vec![3, 0])));

        assert!("".parse::<AxisIndex>().is_err());
        assert!("-1".parse::<AxisIndex>().is_err());
        assert!("1:2:3:4".parse::<AxisIndex>().is_err());
        assert!("[1,a]".parse::<AxisIndex>().is_err());
        assert!("99999999999999999999999".parse::<AxisIndex>().is_err());
        assert!("+3".parse::<AxisIndex>().is_err());
        assert!("[+1]".parse::<AxisIndex>().is_err());
    }
}
