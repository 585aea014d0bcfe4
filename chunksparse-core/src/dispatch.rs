//! Access-pattern dispatch table
//!
//! Maps a normalized (major, minor) selector pair onto the access pattern
//! that serves it. Every pattern except single-element and minor-list
//! lookups has an equivalent form in the general routine, which the
//! engine uses as the reference implementation.

use alloc::vec::Vec;

use crate::error::{CoreError, Result};
use crate::selector::Selector;

/// Majors visited by the general and minor-list routines, in output order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MajorSelection {
    Range { start: usize, stop: usize },
    List(Vec<usize>),
}

impl MajorSelection {
    pub fn len(&self) -> usize {
        match self {
            MajorSelection::Range { start, stop } => stop - start,
            MajorSelection::List(majors) => majors.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Major positions in output order
    pub fn to_vec(&self) -> Vec<usize> {
        match self {
            MajorSelection::Range { start, stop } => (*start..*stop).collect(),
            MajorSelection::List(majors) => majors.clone(),
        }
    }

    fn from_selector(selector: Selector) -> Self {
        match selector {
            Selector::Single(i) => MajorSelection::Range { start: i, stop: i + 1 },
            Selector::Range { start, stop } => MajorSelection::Range { start, stop },
            Selector::List(majors) => MajorSelection::List(majors),
        }
    }
}

/// One access pattern of the lookup/slice engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPattern {
    /// A single stored position, or zero
    Element { major: usize, minor: usize },
    /// One whole segment
    Segment(usize),
    /// Consecutive whole segments
    SegmentRange { start: usize, stop: usize },
    /// Whole segments in the requested order
    SegmentList(Vec<usize>),
    /// A minor sub-range of every segment
    MinorRange { start: usize, stop: usize },
    /// Explicit minor positions within the selected segments
    MinorList {
        majors: MajorSelection,
        minors: Vec<usize>,
    },
    /// A minor sub-range of the selected segments
    General {
        majors: MajorSelection,
        start: usize,
        stop: usize,
    },
}

impl AccessPattern {
    /// Result extent as (major, minor); `None` for a scalar result
    pub fn result_dims(&self, major_dim: usize, minor_dim: usize) -> Option<(usize, usize)> {
        match self {
            AccessPattern::Element { .. } => None,
            AccessPattern::Segment(_) => Some((1, minor_dim)),
            AccessPattern::SegmentRange { start, stop } => Some((stop - start, minor_dim)),
            AccessPattern::SegmentList(majors) => Some((majors.len(), minor_dim)),
            AccessPattern::MinorRange { start, stop } => Some((major_dim, stop - start)),
            AccessPattern::MinorList { majors, minors } => Some((majors.len(), minors.len())),
            AccessPattern::General { majors, start, stop } => Some((majors.len(), stop - start)),
        }
    }

    /// The general-routine call that must produce the same result, if any
    pub fn general_equivalent(&self, major_dim: usize, minor_dim: usize) -> Option<AccessPattern> {
        let (majors, start, stop) = match self {
            AccessPattern::Segment(i) => (
                MajorSelection::Range { start: *i, stop: i + 1 },
                0,
                minor_dim,
            ),
            AccessPattern::SegmentRange { start, stop } => (
                MajorSelection::Range { start: *start, stop: *stop },
                0,
                minor_dim,
            ),
            AccessPattern::SegmentList(majors) => (MajorSelection::List(majors.clone()), 0, minor_dim),
            AccessPattern::MinorRange { start, stop } => (
                MajorSelection::Range { start: 0, stop: major_dim },
                *start,
                *stop,
            ),
            AccessPattern::General { .. } => return Some(self.clone()),
            AccessPattern::Element { .. } | AccessPattern::MinorList { .. } => return None,
        };
        Some(AccessPattern::General { majors, start, stop })
    }

    /// Short name for logs
    pub const fn name(&self) -> &'static str {
        match self {
            AccessPattern::Element { .. } => "element",
            AccessPattern::Segment(_) => "segment",
            AccessPattern::SegmentRange { .. } => "segment-range",
            AccessPattern::SegmentList(_) => "segment-list",
            AccessPattern::MinorRange { .. } => "minor-range",
            AccessPattern::MinorList { .. } => "minor-list",
            AccessPattern::General { .. } => "general",
        }
    }
}

/// Choose the access pattern for a normalized selector pair
pub fn classify(
    major: Selector,
    minor: Selector,
    major_dim: usize,
    minor_dim: usize,
) -> Result<AccessPattern> {
    let major_full = major.is_full(major_dim);
    let minor_full = minor.is_full(minor_dim);

    let pattern = match (major, minor) {
        (Selector::List(_), Selector::List(_)) => {
            return Err(CoreError::NotSupported(
                "explicit position lists on both axes",
            ))
        }
        (Selector::Single(major), Selector::Single(minor)) => AccessPattern::Element { major, minor },

        (Selector::Single(i), _) if minor_full => AccessPattern::Segment(i),
        (Selector::Range { start, stop }, _) if minor_full => {
            AccessPattern::SegmentRange { start, stop }
        }
        (Selector::List(majors), _) if minor_full => AccessPattern::SegmentList(majors),

        (major, Selector::List(minors)) => AccessPattern::MinorList {
            majors: MajorSelection::from_selector(major),
            minors,
        },

        (_, Selector::Single(j)) if major_full => AccessPattern::MinorRange { start: j, stop: j + 1 },
        (_, Selector::Range { start, stop }) if major_full => AccessPattern::MinorRange { start, stop },

        (major, Selector::Single(j)) => AccessPattern::General {
            majors: MajorSelection::from_selector(major),
            start: j,
            stop: j + 1,
        },
        (major, Selector::Range { start, stop }) => AccessPattern::General {
            majors: MajorSelection::from_selector(major),
            start,
            stop,
        },
    };

    Ok(pattern)
}
