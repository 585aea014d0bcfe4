//! Chunked array accessor contract and the in-memory chunked backend
//!
//! Every read the slice engine issues goes through [`ChunkedArray`]:
//! contiguous range reads and order-preserving coordinate gathers. The
//! in-memory [`ChunkedVec`] backs every matrix the engine assembles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use chunksparse_core::{DataType, MatrixElement};
use log::trace;

use crate::{Error, Result};

/// Configuration for chunked storage and segment scans
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChunkConfig {
    /// Elements per chunk for arrays created by the engine
    pub chunk_size: usize,
    /// Upper bound on minor indices fetched by one contiguous read when
    /// scanning consecutive segments
    pub read_batch_len: usize,
    /// Remote chunks retained by the HTTP accessor
    pub http_cache_chunks: usize,
}

impl ChunkConfig {
    /// Set elements per chunk
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the contiguous read budget for segment scans
    pub fn with_read_batch_len(mut self, read_batch_len: usize) -> Self {
        self.read_batch_len = read_batch_len.max(1);
        self
    }

    /// Set the number of cached remote chunks
    pub fn with_http_cache_chunks(mut self, http_cache_chunks: usize) -> Self {
        self.http_cache_chunks = http_cache_chunks;
        self
    }

    /// Get chunk size in elements
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    /// Get chunk size in bytes for an element type
    pub fn chunk_size_bytes<T: MatrixElement>(&self) -> usize {
        self.chunk_size() * T::size_bytes()
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1 << 16,
            read_batch_len: 1 << 18,
            http_cache_chunks: 256,
        }
    }
}

/// Append-only, randomly readable sequence of elements
///
/// Implementations are shared handles: `append` takes `&self` and is
/// expected to be called by a single writer while no reads are in flight.
pub trait ChunkedArray<T: MatrixElement>: Send + Sync {
    /// Number of stored elements
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn data_type(&self) -> DataType {
        T::data_type()
    }

    /// Contiguous read of `[start, stop)`
    fn range_read(&self, start: usize, stop: usize) -> Result<Vec<T>>;

    /// Gather the given positions, in the given order
    fn coordinate_select(&self, indices: &[usize]) -> Result<Vec<T>>;

    /// Extend at the tail
    fn append(&self, items: &[T]) -> Result<()>;

    /// Whether `append` can succeed at all
    fn can_append(&self) -> bool {
        true
    }

    /// Drop everything past the first `len` elements
    ///
    /// Used to undo an append that failed part way, so `len` is never
    /// beyond what the array held before that append.
    fn truncate(&self, len: usize) -> Result<()>;

    /// Uncompressed size in bytes
    fn nbytes(&self) -> usize {
        self.len() * T::size_bytes()
    }

    /// Bytes held by the backing store
    fn nbytes_stored(&self) -> usize {
        self.nbytes()
    }

    /// Number of chunks the array spans
    fn nchunks(&self) -> usize;

    /// Number of chunks that hold data
    fn nchunks_initialized(&self) -> usize {
        self.nchunks()
    }
}

/// Shared handle to a chunked array
pub type ArrayRef<T> = Arc<dyn ChunkedArray<T>>;

/// Check a `[start, stop)` read against an array length
pub(crate) fn check_range(start: usize, stop: usize, len: usize) -> Result<()> {
    if stop > len {
        return Err(Error::OutOfBounds { index: stop, bound: len });
    }
    if start > stop {
        return Err(Error::EmptyRange { start, stop });
    }
    Ok(())
}

/// Check gather positions against an array length
pub(crate) fn check_coordinates(indices: &[usize], len: usize) -> Result<()> {
    match indices.iter().find(|&&i| i >= len) {
        Some(&index) => Err(Error::OutOfBounds { index, bound: len }),
        None => Ok(()),
    }
}

/// Counters for reads issued against a backend
#[derive(Debug, Default)]
pub struct ReadStats {
    range_reads: AtomicUsize,
    gathers: AtomicUsize,
    elements: AtomicUsize,
}

/// Point-in-time copy of [`ReadStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCounts {
    pub range_reads: usize,
    pub gathers: usize,
    pub elements: usize,
}

impl ReadCounts {
    /// Accessor round-trips of either kind
    pub fn calls(&self) -> usize {
        self.range_reads + self.gathers
    }
}

impl ReadStats {
    fn record_range(&self, elements: usize) {
        self.range_reads.fetch_add(1, Ordering::Relaxed);
        self.elements.fetch_add(elements, Ordering::Relaxed);
    }

    fn record_gather(&self, elements: usize) {
        self.gathers.fetch_add(1, Ordering::Relaxed);
        self.elements.fetch_add(elements, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReadCounts {
        ReadCounts {
            range_reads: self.range_reads.load(Ordering::Relaxed),
            gathers: self.gathers.load(Ordering::Relaxed),
            elements: self.elements.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.range_reads.store(0, Ordering::Relaxed);
        self.gathers.store(0, Ordering::Relaxed);
        self.elements.store(0, Ordering::Relaxed);
    }
}

/// In-memory array split into fixed-size chunks
///
/// Every chunk but the last is full.
#[derive(Debug)]
pub struct ChunkedVec<T> {
    chunk_size: usize,
    chunks: RwLock<Vec<Vec<T>>>,
    len: AtomicUsize,
    stats: ReadStats,
}

impl<T: MatrixElement> ChunkedVec<T> {
    /// Create an empty array
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunks: RwLock::new(Vec::new()),
            len: AtomicUsize::new(0),
            stats: ReadStats::default(),
        }
    }

    /// Create an array holding a copy of `items`
    pub fn from_slice(items: &[T], chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let chunks = items.chunks(chunk_size).map(<[T]>::to_vec).collect();
        Self {
            chunk_size,
            chunks: RwLock::new(chunks),
            len: AtomicUsize::new(items.len()),
            stats: ReadStats::default(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Reads issued against this array so far
    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    /// Copy out the whole array
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let chunks = self.chunks.read().map_err(|_| poisoned())?;
        Ok(chunks.concat())
    }
}

fn poisoned() -> Error {
    Error::Storage("chunk lock poisoned".to_string())
}

impl<T: MatrixElement> ChunkedArray<T> for ChunkedVec<T> {
    fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    fn range_read(&self, start: usize, stop: usize) -> Result<Vec<T>> {
        let chunks = self.chunks.read().map_err(|_| poisoned())?;
        check_range(start, stop, self.len())?;
        trace!("range read [{start}, {stop})");
        self.stats.record_range(stop - start);

        let mut out = Vec::with_capacity(stop - start);
        let mut pos = start;
        while pos < stop {
            let chunk = &chunks[pos / self.chunk_size];
            let offset = pos % self.chunk_size;
            let take = (chunk.len() - offset).min(stop - pos);
            out.extend_from_slice(&chunk[offset..offset + take]);
            pos += take;
        }
        Ok(out)
    }

    fn coordinate_select(&self, indices: &[usize]) -> Result<Vec<T>> {
        let chunks = self.chunks.read().map_err(|_| poisoned())?;
        check_coordinates(indices, self.len())?;
        trace!("coordinate gather of {} positions", indices.len());
        self.stats.record_gather(indices.len());

        Ok(indices
            .iter()
            .map(|&i| chunks[i / self.chunk_size][i % self.chunk_size])
            .collect())
    }

    fn append(&self, items: &[T]) -> Result<()> {
        let mut chunks = self.chunks.write().map_err(|_| poisoned())?;
        let mut rest = items;

        if let Some(last) = chunks.last_mut() {
            let take = (self.chunk_size - last.len()).min(rest.len());
            last.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
        }
        for piece in rest.chunks(self.chunk_size) {
            let mut chunk = Vec::with_capacity(self.chunk_size);
            chunk.extend_from_slice(piece);
            chunks.push(chunk);
        }

        self.len.fetch_add(items.len(), Ordering::Release);
        Ok(())
    }

    fn truncate(&self, len: usize) -> Result<()> {
        let mut chunks = self.chunks.write().map_err(|_| poisoned())?;
        let current = self.len();
        if len > current {
            return Err(Error::OutOfBounds { index: len, bound: current });
        }

        chunks.truncate(len.div_ceil(self.chunk_size));
        if let Some(last) = chunks.last_mut() {
            last.truncate(len - (len - 1) / self.chunk_size * self.chunk_size);
        }
        self.len.store(len, Ordering::Release);
        Ok(())
    }

    fn nchunks(&self) -> usize {
        self.len().div_ceil(self.chunk_size)
    }
}
