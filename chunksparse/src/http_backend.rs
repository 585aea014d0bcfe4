//! HTTP backend for remote, read-only arrays
//!
//! An [`HttpArray`] reads a flat array file over HTTP with `Range`
//! requests, one request per run of adjacent missing chunks. Fetched
//! chunks are kept in a bounded cache. Remote arrays cannot be appended.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chunksparse_core::MatrixElement;
use hashbrown::{HashMap, HashSet};
use log::{debug, trace};
use reqwest::blocking::Client;
use reqwest::header::RANGE;
use reqwest::StatusCode;

use crate::chunked_backend::{check_coordinates, check_range, ChunkConfig, ChunkedArray};
use crate::{Error, Result};

/// `Range` header value for the byte span `[start, stop)`
fn range_header(start: usize, stop: usize) -> String {
    format!("bytes={}-{}", start, stop - 1)
}

/// Split sorted, deduplicated chunk ids into runs of adjacent ids
fn chunk_runs(chunks: &[usize]) -> Vec<(usize, usize)> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for &chunk in chunks {
        match runs.last_mut() {
            Some((_, stop)) if *stop == chunk => *stop += 1,
            _ => runs.push((chunk, chunk + 1)),
        }
    }
    runs
}

/// Bounded chunk cache with first-in, first-out eviction
struct ChunkCache<T> {
    capacity: usize,
    chunks: HashMap<usize, Arc<Vec<T>>>,
    order: VecDeque<usize>,
}

impl<T> ChunkCache<T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            chunks: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, chunk: usize) -> Option<Arc<Vec<T>>> {
        self.chunks.get(&chunk).cloned()
    }

    fn insert(&mut self, chunk: usize, data: Arc<Vec<T>>) {
        if self.capacity == 0 || self.chunks.contains_key(&chunk) {
            return;
        }
        while self.chunks.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.chunks.remove(&oldest);
                }
                None => break,
            }
        }
        self.chunks.insert(chunk, data);
        self.order.push_back(chunk);
    }
}

/// Read-only chunked array served over HTTP
pub struct HttpArray<T: MatrixElement> {
    client: Client,
    url: String,
    len: usize,
    chunk_size: usize,
    cache: Mutex<ChunkCache<T>>,
}

impl<T: MatrixElement> HttpArray<T> {
    /// Remote array of `len` elements at `url`
    pub fn new(client: Client, url: impl Into<String>, len: usize, config: &ChunkConfig) -> Self {
        Self {
            client,
            url: url.into(),
            len,
            chunk_size: config.chunk_size(),
            cache: Mutex::new(ChunkCache::new(config.http_cache_chunks)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch chunks `[first, last)` with a single request
    fn fetch_run(&self, first: usize, last: usize) -> Result<Vec<Arc<Vec<T>>>> {
        let size = T::size_bytes();
        let start = first * self.chunk_size;
        let stop = (last * self.chunk_size).min(self.len);
        let (byte_start, byte_stop) = (start * size, stop * size);

        debug!("GET {} {}", self.url, range_header(byte_start, byte_stop));
        let response = self
            .client
            .get(&self.url)
            .header(RANGE, range_header(byte_start, byte_stop))
            .send()?
            .error_for_status()?;
        let status = response.status();
        let body = response.bytes()?;

        // a server that ignores Range sends the whole file
        let bytes = match status {
            StatusCode::PARTIAL_CONTENT => &body[..],
            _ => body.get(byte_start..byte_stop).unwrap_or(&[]),
        };
        if bytes.len() != byte_stop - byte_start {
            return Err(Error::Storage(format!(
                "{}: expected {} bytes, received {}",
                self.url,
                byte_stop - byte_start,
                bytes.len()
            )));
        }

        let items: Vec<T> = bytemuck::pod_collect_to_vec(bytes);
        Ok(items
            .chunks(self.chunk_size)
            .map(|chunk| Arc::new(chunk.to_vec()))
            .collect())
    }

    /// Resolve chunks from the cache, fetching the missing ones
    fn load_chunks(&self, wanted: &[usize]) -> Result<HashMap<usize, Arc<Vec<T>>>> {
        let mut found = HashMap::with_capacity(wanted.len());
        let mut missing = Vec::new();
        {
            let cache = self.cache.lock().map_err(|_| poisoned())?;
            for &chunk in wanted {
                match cache.get(chunk) {
                    Some(data) => {
                        found.insert(chunk, data);
                    }
                    None => missing.push(chunk),
                }
            }
        }
        trace!("{}: {} chunks cached, {} to fetch", self.url, found.len(), missing.len());

        for (first, last) in chunk_runs(&missing) {
            let fetched = self.fetch_run(first, last)?;
            let mut cache = self.cache.lock().map_err(|_| poisoned())?;
            for (chunk, data) in (first..last).zip(fetched) {
                cache.insert(chunk, Arc::clone(&data));
                found.insert(chunk, data);
            }
        }
        Ok(found)
    }

    fn element_at(&self, chunks: &HashMap<usize, Arc<Vec<T>>>, position: usize) -> Result<T> {
        chunks
            .get(&(position / self.chunk_size))
            .and_then(|chunk| chunk.get(position % self.chunk_size))
            .copied()
            .ok_or_else(|| Error::Storage(format!("{}: position {} not fetched", self.url, position)))
    }
}

fn poisoned() -> Error {
    Error::Storage("http cache lock poisoned".to_string())
}

impl<T: MatrixElement> ChunkedArray<T> for HttpArray<T> {
    fn len(&self) -> usize {
        self.len
    }

    fn range_read(&self, start: usize, stop: usize) -> Result<Vec<T>> {
        check_range(start, stop, self.len)?;
        if start == stop {
            return Ok(Vec::new());
        }
        let wanted: Vec<usize> = (start / self.chunk_size..=(stop - 1) / self.chunk_size).collect();
        let chunks = self.load_chunks(&wanted)?;
        (start..stop).map(|i| self.element_at(&chunks, i)).collect()
    }

    fn coordinate_select(&self, indices: &[usize]) -> Result<Vec<T>> {
        check_coordinates(indices, self.len)?;
        let mut wanted: Vec<usize> = indices
            .iter()
            .map(|&i| i / self.chunk_size)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        wanted.sort_unstable();

        let chunks = self.load_chunks(&wanted)?;
        indices.iter().map(|&i| self.element_at(&chunks, i)).collect()
    }

    fn append(&self, _items: &[T]) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn can_append(&self) -> bool {
        false
    }

    fn truncate(&self, _len: usize) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn nchunks(&self) -> usize {
        self.len.div_ceil(self.chunk_size)
    }

    fn nchunks_initialized(&self) -> usize {
        self.cache.lock().map(|cache| cache.chunks.len()).unwrap_or(0)
    }
}
