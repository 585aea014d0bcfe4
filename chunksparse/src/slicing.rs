//! Lookup and slice engine
//!
//! One function per [`AccessPattern`]. [`general`] handles any set of
//! majors with a minor sub-range and is the reference the other routines
//! must agree with element for element; they exist only to read less.
//!
//! Reads always go through [`ChunkedArray::range_read`] and
//! [`ChunkedArray::coordinate_select`], batched so that the number of calls
//! grows with the number of selected segments and never with the number of
//! matched elements.

use chunksparse_core::{AccessPattern, MajorSelection, MatrixElement};
use log::{debug, trace};

use crate::chunked_backend::ChunkedArray;
use crate::matrix::CompressedMatrix;
use crate::{Error, Result};

/// Canonical triple produced by a slice, ready to be wrapped in storage
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Assembled<T> {
    pub values: Vec<T>,
    pub indices: Vec<u64>,
    pub indptr: Vec<u64>,
    pub major_dim: usize,
    pub minor_dim: usize,
}

impl<T> Assembled<T> {
    fn with_dims(major_dim: usize, minor_dim: usize) -> Self {
        let mut indptr = Vec::with_capacity(major_dim + 1);
        indptr.push(0);
        Self {
            values: Vec::new(),
            indices: Vec::new(),
            indptr,
            major_dim,
            minor_dim,
        }
    }

    fn close_segment(&mut self) {
        self.indptr.push(self.indices.len() as u64);
    }
}

pub(crate) enum Outcome<T> {
    Scalar(T),
    Assembled(Assembled<T>),
}

/// Serve `pattern` against `m`
pub(crate) fn run<T: MatrixElement>(
    m: &CompressedMatrix<T>,
    pattern: &AccessPattern,
) -> Result<Outcome<T>> {
    let assembled = match pattern {
        AccessPattern::Element { major, minor } => {
            return element(m, *major, *minor).map(Outcome::Scalar)
        }
        AccessPattern::Segment(i) => segment(m, *i)?,
        AccessPattern::SegmentRange { start, stop } => segment_range(m, *start, *stop)?,
        AccessPattern::SegmentList(majors) => segment_list(m, majors)?,
        AccessPattern::MinorRange { start, stop } => minor_range(m, *start, *stop)?,
        AccessPattern::MinorList { majors, minors } => minor_list(m, majors, minors)?,
        AccessPattern::General { majors, start, stop } => general(m, majors, *start, *stop)?,
    };

    debug!(
        "{}: {}x{} (major x minor), {} stored",
        pattern.name(),
        assembled.major_dim,
        assembled.minor_dim,
        assembled.values.len()
    );
    Ok(Outcome::Assembled(assembled))
}

fn short_read() -> Error {
    Error::Storage("backend returned fewer elements than requested".into())
}

fn read_exact<E: MatrixElement>(array: &dyn ChunkedArray<E>, start: usize, stop: usize) -> Result<Vec<E>> {
    if start == stop {
        return Ok(Vec::new());
    }
    trace!("range read {}..{}", start, stop);
    let items = array.range_read(start, stop)?;
    if items.len() != stop - start {
        return Err(short_read());
    }
    Ok(items)
}

fn gather_exact<E: MatrixElement>(array: &dyn ChunkedArray<E>, positions: &[usize]) -> Result<Vec<E>> {
    if positions.is_empty() {
        return Ok(Vec::new());
    }
    trace!("gather of {} positions", positions.len());
    let items = array.coordinate_select(positions)?;
    if items.len() != positions.len() {
        return Err(short_read());
    }
    Ok(items)
}

pub(crate) fn read_one<E: MatrixElement>(array: &dyn ChunkedArray<E>, position: usize) -> Result<E> {
    read_exact(array, position, position + 1)?
        .first()
        .copied()
        .ok_or_else(short_read)
}

fn corrupt_pointers() -> Error {
    Error::NotCanonical("pointer array out of order or past the stored elements")
}

/// Refuse pointer pairs that do not describe a span of stored elements
fn checked_pairs(pairs: impl Iterator<Item = (u64, u64)>, stored: usize) -> Result<Vec<(usize, usize)>> {
    pairs
        .map(|(lo, hi)| {
            if lo > hi || hi > stored as u64 {
                Err(corrupt_pointers())
            } else {
                Ok((lo as usize, hi as usize))
            }
        })
        .collect()
}

/// (lo, hi) element bounds of consecutive segments `start..stop`
fn range_bounds<T: MatrixElement>(
    m: &CompressedMatrix<T>,
    start: usize,
    stop: usize,
) -> Result<Vec<(usize, usize)>> {
    let indptr = read_exact(&**m.indptr(), start, stop + 1)?;
    checked_pairs(indptr.windows(2).map(|w| (w[0], w[1])), m.indices().len())
}

/// (lo, hi) element bounds of arbitrary segments, in one batched gather
fn gathered_bounds<T: MatrixElement>(
    m: &CompressedMatrix<T>,
    majors: &[usize],
) -> Result<Vec<(usize, usize)>> {
    let positions: Vec<usize> = majors.iter().flat_map(|&i| [i, i + 1]).collect();
    let indptr = gather_exact(&**m.indptr(), &positions)?;
    checked_pairs(indptr.chunks_exact(2).map(|p| (p[0], p[1])), m.indices().len())
}

/// Visit segments that sit back to back in storage
///
/// Minor indices are read in blocks of whole segments, at most
/// `read_batch_len` elements per block unless a single segment is longer.
/// `f` receives the segment's ordinal, its first element position and its
/// minor indices.
pub(crate) fn scan_consecutive<T, F>(
    m: &CompressedMatrix<T>,
    bounds: &[(usize, usize)],
    mut f: F,
) -> Result<()>
where
    T: MatrixElement,
    F: FnMut(usize, usize, &[u64]) -> Result<()>,
{
    let batch = m.config().read_batch_len.max(1);
    let mut k = 0;

    while k < bounds.len() {
        let block_lo = bounds[k].0;
        let mut end = k + 1;
        while end < bounds.len() && bounds[end].1 - block_lo <= batch {
            end += 1;
        }
        let block_hi = bounds[end - 1].1;
        let block = read_exact(&**m.indices(), block_lo, block_hi)?;

        for (offset, &(lo, hi)) in bounds[k..end].iter().enumerate() {
            f(k + offset, lo, &block[lo - block_lo..hi - block_lo])?;
        }
        k = end;
    }
    Ok(())
}

/// Visit segments anywhere in storage, one read per non-empty segment
fn scan_scattered<T, F>(m: &CompressedMatrix<T>, bounds: &[(usize, usize)], mut f: F) -> Result<()>
where
    T: MatrixElement,
    F: FnMut(usize, usize, &[u64]) -> Result<()>,
{
    for (k, &(lo, hi)) in bounds.iter().enumerate() {
        let segment = read_exact(&**m.indices(), lo, hi)?;
        f(k, lo, &segment)?;
    }
    Ok(())
}

/// Positions within a sorted segment whose minor index falls in `start..stop`
fn minor_window(segment: &[u64], start: usize, stop: usize) -> (usize, usize) {
    let a = segment.partition_point(|&c| c < start as u64);
    let b = segment.partition_point(|&c| c < stop as u64);
    (a, b)
}

/// Stored value at (major, minor), or zero
pub(crate) fn element<T: MatrixElement>(
    m: &CompressedMatrix<T>,
    major: usize,
    minor: usize,
) -> Result<T> {
    let bounds = range_bounds(m, major, major + 1)?;
    let &(lo, hi) = bounds.first().ok_or_else(short_read)?;

    let segment = read_exact(&**m.indices(), lo, hi)?;
    match segment.binary_search(&(minor as u64)) {
        Ok(pos) => read_one(&**m.values(), lo + pos),
        Err(_) => Ok(T::zero()),
    }
}

/// One whole segment, copied contiguously
pub(crate) fn segment<T: MatrixElement>(m: &CompressedMatrix<T>, major: usize) -> Result<Assembled<T>> {
    segment_range(m, major, major + 1)
}

/// Consecutive whole segments `start..stop`
///
/// One read per array: the pointer slice, then the element span it covers.
pub(crate) fn segment_range<T: MatrixElement>(
    m: &CompressedMatrix<T>,
    start: usize,
    stop: usize,
) -> Result<Assembled<T>> {
    let indptr = read_exact(&**m.indptr(), start, stop + 1)?;
    let (lo, hi) = match (indptr.first(), indptr.last()) {
        (Some(&lo), Some(&hi)) => (lo as usize, hi as usize),
        _ => return Err(short_read()),
    };
    if indptr.windows(2).any(|w| w[0] > w[1]) || hi > m.indices().len() {
        return Err(corrupt_pointers());
    }

    Ok(Assembled {
        values: read_exact(&**m.values(), lo, hi)?,
        indices: read_exact(&**m.indices(), lo, hi)?,
        indptr: indptr.iter().map(|&p| p - lo as u64).collect(),
        major_dim: stop - start,
        minor_dim: m.minor_dim(),
    })
}

/// Whole segments in the requested order, repeats allowed
pub(crate) fn segment_list<T: MatrixElement>(
    m: &CompressedMatrix<T>,
    majors: &[usize],
) -> Result<Assembled<T>> {
    let bounds = gathered_bounds(m, majors)?;
    let mut out = Assembled::with_dims(majors.len(), m.minor_dim());
    let mut positions = Vec::new();

    for &(lo, hi) in &bounds {
        positions.extend(lo..hi);
        out.indptr.push(positions.len() as u64);
    }

    out.indices = gather_exact(&**m.indices(), &positions)?;
    out.values = gather_exact(&**m.values(), &positions)?;
    Ok(out)
}

/// Minor sub-range `start..stop` of every segment
///
/// The pointer array is read once, indices are scanned in consecutive
/// blocks and the matched values are gathered in one call.
pub(crate) fn minor_range<T: MatrixElement>(
    m: &CompressedMatrix<T>,
    start: usize,
    stop: usize,
) -> Result<Assembled<T>> {
    let bounds = range_bounds(m, 0, m.major_dim())?;
    let mut out = Assembled::with_dims(m.major_dim(), stop - start);
    let mut positions = Vec::new();

    scan_consecutive(m, &bounds, |_, lo, segment| {
        let (a, b) = minor_window(segment, start, stop);
        out.indices
            .extend(segment[a..b].iter().map(|&c| c - start as u64));
        positions.extend(lo + a..lo + b);
        out.close_segment();
        Ok(())
    })?;

    out.values = gather_exact(&**m.values(), &positions)?;
    Ok(out)
}

/// Explicit minor positions within the selected segments
///
/// Output minor index `u` holds the element at `minors[u]`, so the
/// requested order (and any repeats) carry into the result.
pub(crate) fn minor_list<T: MatrixElement>(
    m: &CompressedMatrix<T>,
    majors: &MajorSelection,
    minors: &[usize],
) -> Result<Assembled<T>> {
    let mut out = Assembled::with_dims(majors.len(), minors.len());
    let mut positions = Vec::new();

    let mut visit = |_: usize, lo: usize, segment: &[u64]| -> Result<()> {
        for (u, &v) in minors.iter().enumerate() {
            if let Ok(pos) = segment.binary_search(&(v as u64)) {
                out.indices.push(u as u64);
                positions.push(lo + pos);
            }
        }
        out.close_segment();
        Ok(())
    };

    match majors {
        MajorSelection::Range { start, stop } => {
            let bounds = range_bounds(m, *start, *stop)?;
            scan_consecutive(m, &bounds, &mut visit)?;
        }
        MajorSelection::List(list) => {
            let bounds = gathered_bounds(m, list)?;
            scan_scattered(m, &bounds, &mut visit)?;
        }
    }

    out.values = gather_exact(&**m.values(), &positions)?;
    Ok(out)
}

/// Minor sub-range `start..stop` of an arbitrary set of segments
///
/// Pointers for all selected segments come from one gather, each non-empty
/// segment's indices from one read and the matched values from one gather.
pub(crate) fn general<T: MatrixElement>(
    m: &CompressedMatrix<T>,
    majors: &MajorSelection,
    start: usize,
    stop: usize,
) -> Result<Assembled<T>> {
    let bounds = gathered_bounds(m, &majors.to_vec())?;
    let mut out = Assembled::with_dims(majors.len(), stop - start);
    let mut positions = Vec::new();

    scan_scattered(m, &bounds, |_, lo, segment| {
        let (a, b) = minor_window(segment, start, stop);
        out.indices
            .extend(segment[a..b].iter().map(|&c| c - start as u64));
        positions.extend(lo + a..lo + b);
        out.close_segment();
        Ok(())
    })?;

    out.values = gather_exact(&**m.values(), &positions)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunked_backend::{ArrayRef, ChunkConfig, ChunkedVec};
    use crate::matrix::Canonical;
    use chunksparse_core::{MatrixFormat, Shape};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    struct Instrumented {
        matrix: CompressedMatrix<f64>,
        values: Arc<ChunkedVec<f64>>,
        indices: Arc<ChunkedVec<u64>>,
        indptr: Arc<ChunkedVec<u64>>,
    }

    impl Instrumented {
        fn reset(&self) {
            self.values.stats().reset();
            self.indices.stats().reset();
            self.indptr.stats().reset();
        }
    }

    fn random_triple(rng: &mut StdRng, major: usize, minor: usize, density: f64) -> (Vec<f64>, Vec<u64>, Vec<u64>) {
        let mut values = Vec::new();
        let mut indices = Vec::new();
        let mut indptr = vec![0u64];
        for _ in 0..major {
            for j in 0..minor {
                if rng.gen_bool(density) {
                    values.push(rng.gen_range(1..100) as f64);
                    indices.push(j as u64);
                }
            }
            indptr.push(indices.len() as u64);
        }
        (values, indices, indptr)
    }

    fn instrumented(seed: u64, shape: Shape, format: MatrixFormat, config: ChunkConfig) -> Instrumented {
        let mut rng = StdRng::seed_from_u64(seed);
        let (values, indices, indptr) =
            random_triple(&mut rng, shape.major(format), shape.minor(format), 0.3);
        let chunk = config.chunk_size();
        let values = Arc::new(ChunkedVec::from_slice(&values, chunk));
        let indices = Arc::new(ChunkedVec::from_slice(&indices, chunk));
        let indptr = Arc::new(ChunkedVec::from_slice(&indptr, chunk));

        let matrix = CompressedMatrix::from_arrays(
            shape,
            format,
            values.clone() as ArrayRef<f64>,
            indices.clone() as ArrayRef<u64>,
            indptr.clone() as ArrayRef<u64>,
            config,
            Canonical::Check,
        )
        .unwrap();
        Instrumented { matrix, values, indices, indptr }
    }

    fn assembled(m: &CompressedMatrix<f64>, pattern: &AccessPattern) -> Assembled<f64> {
        match run(m, pattern).unwrap() {
            Outcome::Assembled(out) => out,
            Outcome::Scalar(_) => panic!("expected a matrix result for {:?}", pattern),
        }
    }

    #[test]
    fn test_fast_paths_match_general() {
        for format in [MatrixFormat::Csr, MatrixFormat::Csc] {
            let config = ChunkConfig::default().with_chunk_size(7).with_read_batch_len(11);
            let fixture = instrumented(42, Shape::new(13, 9), format, config);
            let m = &fixture.matrix;
            let (major, minor) = (m.major_dim(), m.minor_dim());

            let mut patterns = vec![
                AccessPattern::SegmentRange { start: 0, stop: major },
                AccessPattern::SegmentRange { start: 3, stop: 4 },
                AccessPattern::SegmentList(vec![major - 1, 0, 2, 2]),
                AccessPattern::MinorRange { start: 0, stop: minor },
                AccessPattern::MinorRange { start: 2, stop: 5 },
                AccessPattern::MinorRange { start: minor - 1, stop: minor },
            ];
            patterns.extend((0..major).map(AccessPattern::Segment));

            for pattern in patterns {
                let general = pattern.general_equivalent(major, minor).unwrap();
                let fast = assembled(m, &pattern);
                assert_eq!(fast, assembled(m, &general), "{:?} in {}", pattern, format);
                assert_eq!(
                    Some((fast.major_dim, fast.minor_dim)),
                    pattern.result_dims(major, minor)
                );
            }
        }
    }

    #[test]
    fn test_element_matches_segments() {
        let fixture = instrumented(7, Shape::new(6, 8), MatrixFormat::Csr, ChunkConfig::default());
        let m = &fixture.matrix;
        let whole = segment_range(m, 0, m.major_dim()).unwrap();

        for i in 0..m.major_dim() {
            let mut row = vec![0.0; m.minor_dim()];
            let (lo, hi) = (whole.indptr[i] as usize, whole.indptr[i + 1] as usize);
            for k in lo..hi {
                row[whole.indices[k] as usize] = whole.values[k];
            }
            for (j, expected) in row.iter().enumerate() {
                assert_eq!(element(m, i, j).unwrap(), *expected);
            }
        }
    }

    #[test]
    fn test_minor_list_order_and_repeats() {
        let m = CompressedMatrix::from_parts(
            Shape::new(2, 4),
            MatrixFormat::Csr,
            vec![1.0, 2.0, 3.0],
            vec![0, 3, 1],
            vec![0, 2, 3],
            ChunkConfig::default(),
        )
        .unwrap();

        let majors = MajorSelection::Range { start: 0, stop: 2 };
        let out = minor_list(&m, &majors, &[3, 0, 3, 2]).unwrap();
        assert_eq!(out.indptr, vec![0, 3, 3]);
        assert_eq!(out.indices, vec![0, 1, 2]);
        assert_eq!(out.values, vec![2.0, 1.0, 2.0]);

        let listed = minor_list(&m, &MajorSelection::List(vec![1, 0]), &[1, 0]).unwrap();
        assert_eq!(listed.indptr, vec![0, 1, 2]);
        assert_eq!(listed.indices, vec![0, 1]);
        assert_eq!(listed.values, vec![3.0, 1.0]);
    }

    #[test]
    fn test_minor_range_read_counts() {
        let config = ChunkConfig::default().with_chunk_size(16).with_read_batch_len(32);
        let fixture = instrumented(3, Shape::new(40, 20), MatrixFormat::Csr, config);
        let nnz = fixture.matrix.nnz();
        fixture.reset();

        let out = minor_range(&fixture.matrix, 4, 9).unwrap();
        assert_eq!(out.major_dim, 40);

        let pointer_reads = fixture.indptr.stats().snapshot();
        assert_eq!(pointer_reads.calls(), 1);
        // two adjacent blocks always hold more than one batch
        let index_reads = fixture.indices.stats().snapshot();
        assert!(index_reads.range_reads <= 2 * nnz / 32 + 2, "{:?}", index_reads);
        assert_eq!(index_reads.gathers, 0);
        assert!(fixture.values.stats().snapshot().calls() <= 1);
    }

    #[test]
    fn test_segment_paths_read_counts() {
        let fixture = instrumented(5, Shape::new(30, 10), MatrixFormat::Csc, ChunkConfig::default());
        let m = &fixture.matrix;

        fixture.reset();
        segment_range(m, 2, 8).unwrap();
        assert_eq!(fixture.indptr.stats().snapshot().calls(), 1);
        assert!(fixture.indices.stats().snapshot().calls() <= 1);
        assert!(fixture.values.stats().snapshot().calls() <= 1);

        fixture.reset();
        segment_list(m, &[9, 1, 4, 1]).unwrap();
        assert_eq!(fixture.indptr.stats().snapshot().gathers, 1);
        assert!(fixture.indices.stats().snapshot().calls() <= 1);
        assert!(fixture.values.stats().snapshot().calls() <= 1);

        fixture.reset();
        element(m, 3, 4).unwrap();
        assert_eq!(fixture.indptr.stats().snapshot().calls(), 1);
        assert!(fixture.indices.stats().snapshot().calls() <= 1);
        assert!(fixture.values.stats().snapshot().calls() <= 1);
    }

    #[test]
    fn test_empty_selection_shapes() {
        let m = CompressedMatrix::from_parts(
            Shape::new(3, 3),
            MatrixFormat::Csr,
            vec![5.0],
            vec![0],
            vec![0, 1, 1, 1],
            ChunkConfig::default(),
        )
        .unwrap();

        let out = minor_range(&m, 1, 3).unwrap();
        assert_eq!(out.indptr, vec![0, 0, 0, 0]);
        assert!(out.values.is_empty());
        assert_eq!((out.major_dim, out.minor_dim), (3, 2));

        let out = segment(&m, 2).unwrap();
        assert_eq!(out.indptr, vec![0, 0]);
        assert!(out.indices.is_empty());
    }

    #[test]
    fn test_random_general_against_dense() {
        let mut rng = StdRng::seed_from_u64(99);
        let fixture = instrumented(11, Shape::new(12, 15), MatrixFormat::Csr, ChunkConfig::default());
        let m = &fixture.matrix;
        let whole = segment_range(m, 0, 12).unwrap();

        for _ in 0..50 {
            let majors: Vec<usize> = (0..rng.gen_range(1..6)).map(|_| rng.gen_range(0..12)).collect();
            let start = rng.gen_range(0..14);
            let stop = rng.gen_range(start + 1..=15);
            let out = general(m, &MajorSelection::List(majors.clone()), start, stop).unwrap();

            for (r, &i) in majors.iter().enumerate() {
                for j in start..stop {
                    let expected = (whole.indptr[i] as usize..whole.indptr[i + 1] as usize)
                        .find(|&k| whole.indices[k] == j as u64)
                        .map_or(0.0, |k| whole.values[k]);
                    let found = (out.indptr[r] as usize..out.indptr[r + 1] as usize)
                        .find(|&k| out.indices[k] == (j - start) as u64)
                        .map_or(0.0, |k| out.values[k]);
                    assert_eq!(found, expected);
                }
            }
        }
    }

    fn trusted(indptr: Vec<u64>) -> CompressedMatrix<f64> {
        let chunk = 4;
        CompressedMatrix::from_arrays(
            Shape::new(5, 5),
            MatrixFormat::Csr,
            Arc::new(ChunkedVec::from_slice(&[1.0, 2.0, 3.0, 4.0], chunk)) as ArrayRef<f64>,
            Arc::new(ChunkedVec::from_slice(&[0u64, 2, 4, 1], chunk)) as ArrayRef<u64>,
            Arc::new(ChunkedVec::from_slice(&indptr, chunk)) as ArrayRef<u64>,
            ChunkConfig::default(),
            Canonical::Trusted,
        )
        .unwrap()
    }

    #[test]
    fn test_corrupt_pointers_are_reported() {
        let m = trusted(vec![0, 3, 1, 3, 4, 4]);
        let patterns = [
            AccessPattern::Element { major: 1, minor: 0 },
            AccessPattern::SegmentRange { start: 0, stop: 3 },
            AccessPattern::SegmentList(vec![1]),
            AccessPattern::MinorRange { start: 0, stop: 5 },
            AccessPattern::MinorList {
                majors: MajorSelection::List(vec![0, 1]),
                minors: vec![2],
            },
            AccessPattern::General {
                majors: MajorSelection::Range { start: 0, stop: 3 },
                start: 1,
                stop: 4,
            },
        ];
        for pattern in &patterns {
            assert!(
                matches!(run(&m, pattern), Err(Error::NotCanonical(_))),
                "{:?}",
                pattern
            );
        }

        // segments clear of the bad pointer still read
        assert_eq!(element(&m, 3, 1).unwrap(), 4.0);

        let past_end = trusted(vec![0, 1, 9, 9, 9, 9]);
        assert!(matches!(element(&past_end, 1, 0), Err(Error::NotCanonical(_))));
        assert!(matches!(segment_range(&past_end, 0, 5), Err(Error::NotCanonical(_))));
        assert_eq!(element(&past_end, 0, 0).unwrap(), 1.0);
    }
}
