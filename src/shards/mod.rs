//! Chunked reader over the local catalog mirror.
//!
//! The mirror is a directory of `products_<n>.json` shards, each holding an
//! array of raw records, plus an optional `metadata.json` sidecar. Shards are
//! loaded one at a time so a scan never holds more than one shard in memory,
//! and visited in natural numeric order so pagination across shards is
//! deterministic.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::types::ShardMetadata;


/// Sidecar file describing the mirror
pub const METADATA_FILE: &str = "metadata.json";

type NameFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One raw record and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ShardRecord {
    /// Shard file name
    pub shard: String,
    /// Position inside the shard
    pub index: usize,
    pub value: Value,
}

impl ShardRecord {
    /// Stable identifier for records that carry none of their own
    pub fn fallback_id(&self) -> String {
        format!("{}#{}", self.shard, self.index)
    }
}

/// Default shard predicate: `products_<anything>.json`
pub fn is_product_shard(name: &str) -> bool {
    name.starts_with("products_") && name.ends_with(".json")
}

/// Reader over a directory of JSON shards
#[derive(Clone)]
pub struct ShardReader {
    dir: PathBuf,
    /// Set for flat-file readers; the file must exist
    file: Option<PathBuf>,
    filter: NameFilter,
    max_records: Option<usize>,
}

impl std::fmt::Debug for ShardReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardReader")
            .field("dir", &self.dir)
            .field("file", &self.file)
            .field("max_records", &self.max_records)
            .finish()
    }
}

impl ShardReader {
    /// Reader over the `products_<n>.json` shards of `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file: None,
            filter: Arc::new(is_product_shard),
            max_records: None,
        }
    }

    /// Reader over a single flat file
    pub fn flat_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            dir,
            file: Some(path.to_path_buf()),
            filter: Arc::new(move |candidate: &str| candidate == name),
            max_records: None,
        }
    }

    /// Replace the file name predicate
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.filter = Arc::new(filter);
        self
    }

    /// Stop yielding after `max_records` records across all shards
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Candidate shard paths in scan order.
    ///
    /// A missing directory, or a flat-file reader whose file is missing, is
    /// a not-found error rather than an empty scan.
    pub fn shard_paths(&self) -> CatalogResult<Vec<PathBuf>> {
        if let Some(file) = &self.file {
            if !file.is_file() {
                return Err(CatalogError::NotFound(format!(
                    "Search file does not exist: {}",
                    file.display()
                )));
            }
        }

        if !self.dir.is_dir() {
            return Err(CatalogError::NotFound(format!(
                "Data directory does not exist: {}",
                self.dir.display()
            )));
        }

        let mut shards: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if (self.filter)(&name) {
                shards.push((name, entry.path()));
            }
        }

        shards.sort_by(|(a, _), (b, _)| compare_shard_names(a, b));
        debug!("Found {} shards in {}", shards.len(), self.dir.display());

        Ok(shards.into_iter().map(|(_, path)| path).collect())
    }

    /// Lazily iterate every record of every shard, in scan order
    pub fn records(&self) -> CatalogResult<ShardRecords> {
        let paths = self.shard_paths()?;
        Ok(ShardRecords {
            shard_count: paths.len(),
            paths: paths.into_iter(),
            current: None,
            remaining: self.max_records,
            skipped_shards: 0,
        })
    }
}

/// Lazy record iterator returned by [`ShardReader::records`]
pub struct ShardRecords {
    shard_count: usize,
    paths: std::vec::IntoIter<PathBuf>,
    current: Option<(String, std::iter::Enumerate<std::vec::IntoIter<Value>>)>,
    remaining: Option<usize>,
    skipped_shards: usize,
}

impl ShardRecords {
    /// Number of shards selected for this scan
    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Number of shards skipped so far because they could not be parsed
    pub fn skipped_shards(&self) -> usize {
        self.skipped_shards
    }
}

impl Iterator for ShardRecords {
    type Item = ShardRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining == Some(0) {
                return None;
            }

            if let Some((shard, records)) = self.current.as_mut() {
                if let Some((index, value)) = records.next() {
                    if let Some(remaining) = self.remaining.as_mut() {
                        *remaining -= 1;
                    }
                    return Some(ShardRecord {
                        shard: shard.clone(),
                        index,
                        value,
                    });
                }
            }

            self.current = None;
            let path = self.paths.next()?;
            let shard = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            match load_shard(&path) {
                Ok(values) => {
                    debug!("Loaded shard {} ({} records)", shard, values.len());
                    self.current = Some((shard, values.into_iter().enumerate()));
                }
                Err(reason) => {
                    let err = CatalogError::MalformedShard { shard, reason };
                    warn!("Skipping shard: {}", err);
                    self.skipped_shards += 1;
                }
            }
        }
    }
}

fn load_shard(path: &Path) -> Result<Vec<Value>, String> {
    let contents = fs::read_to_string(path).map_err(|e| e.to_string())?;
    parse_shard(&contents)
}

/// Parse shard contents into a record list.
///
/// A JSON string holding an encoded document is decoded once more, and a
/// single object counts as a one-element list. Anything else is rejected.
pub fn parse_shard(contents: &str) -> Result<Vec<Value>, String> {
    let mut value: Value = serde_json::from_str(contents).map_err(|e| e.to_string())?;

    if let Value::String(encoded) = &value {
        value = serde_json::from_str(encoded)
            .map_err(|e| format!("double-encoded document is invalid: {}", e))?;
    }

    match value {
        Value::Array(records) => Ok(records),
        Value::Object(_) => Ok(vec![value]),
        other => Err(format!("expected a list of records, found {}", json_kind(&other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Natural ordering: `products_2.json` before `products_10.json`
pub fn compare_shard_names(a: &str, b: &str) -> Ordering {
    shard_sort_key(a).cmp(&shard_sort_key(b))
}

fn shard_sort_key(name: &str) -> (String, u64, String) {
    let stem = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);
    let digits_at = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(stem.len());
    let number = stem[digits_at..].parse().unwrap_or(u64::MAX);
    (stem[..digits_at].to_string(), number, name.to_string())
}

/// Read the mirror's sidecar metadata
pub fn read_metadata(dir: &Path) -> CatalogResult<ShardMetadata> {
    let path = dir.join(METADATA_FILE);
    if !path.is_file() {
        return Err(CatalogError::NotFound(format!(
            "Mirror metadata does not exist: {}",
            path.display()
        )));
    }
    let contents = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&contents)?)
}
