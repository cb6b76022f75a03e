//! On-disk layout of a dense index generation.
//!
//! Two files live in the index directory:
//!
//! ```text
//! dense.index      "QRYVEC01" | dim: u32 LE | count: u64 LE | count × dim × f32 LE
//! dense.meta.json  { version, dimension, element_count, saved_at, labels, tombstones }
//! ```
//!
//! Both are written to a `.tmp` sibling, flushed, fsynced and renamed over the
//! previous file, then the directory is fsynced, so a crash leaves either the
//! old or the new version on disk.
//! A `.tmp` file found later is never valid and is deleted on initialize.
//!
//! The vector file is validated (size, magic, exact length) before any of it
//! is parsed.

use crate::error::SearchError;
use crate::search::types::{get_current_timestamp, ChunkId};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Vector file name inside the index directory.
pub const INDEX_FILE: &str = "dense.index";

/// Sidecar file name inside the index directory.
pub const SIDECAR_FILE: &str = "dense.meta.json";

/// Suffix of in-flight writes.
pub const TMP_SUFFIX: &str = ".tmp";

/// Vector file magic.
pub const MAGIC: &[u8; 8] = b"QRYVEC01";

/// Magic + dimension + count.
pub const HEADER_LEN: usize = 8 + 4 + 8;

/// Anything shorter cannot hold a header.
pub const MIN_INDEX_FILE_SIZE: u64 = HEADER_LEN as u64;

/// Current sidecar format version.
pub const SIDECAR_VERSION: u32 = 1;

/// Locations of the files of one index directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    dir: PathBuf,
    index: PathBuf,
    sidecar: PathBuf,
}

impl IndexPaths {
    /// Paths inside `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            index: dir.join(INDEX_FILE),
            sidecar: dir.join(SIDECAR_FILE),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index(&self) -> &Path {
        &self.index
    }

    pub fn sidecar(&self) -> &Path {
        &self.sidecar
    }

    /// Returns `true` if either artifact exists.
    pub fn any_exists(&self) -> bool {
        self.index.exists() || self.sidecar.exists()
    }

    /// Deletes leftover `.tmp` files. Returns how many were removed.
    pub fn remove_temp_files(&self) -> io::Result<usize> {
        let mut removed = 0;
        for path in [&self.index, &self.sidecar] {
            let tmp = tmp_path(path);
            if tmp.exists() {
                fs::remove_file(&tmp)?;
                warn!("Removed incomplete write {}", tmp.display());
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Deletes both artifacts and any temp files.
    pub fn remove_all(&self) -> io::Result<()> {
        self.remove_temp_files()?;
        for path in [&self.index, &self.sidecar] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// `path` with [`TMP_SUFFIX`] appended to the file name.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(TMP_SUFFIX);
    path.with_file_name(name)
}

/// Writes through a `.tmp` sibling, fsyncs, then renames over `path`.
fn write_atomic<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    let result = (|| {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
        return result;
    }
    // The rename is only durable once the directory entry is
    sync_dir(path.parent().unwrap_or_else(|| Path::new(".")))
}

/// Flushes a directory's entries to disk.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    File::open(dir)?.sync_all()
}

/// No-op where directories cannot be opened as files.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Writes the vector file for `count` vectors of `dimension` components.
///
/// Vectors must be yielded in label order.
pub fn write_vectors<'a, I>(path: &Path, dimension: usize, vectors: I) -> io::Result<()>
where
    I: ExactSizeIterator<Item = &'a [f32]>,
{
    let dim = u32::try_from(dimension)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "dimension exceeds u32"))?;
    let count = vectors.len() as u64;

    write_atomic(path, |w| {
        w.write_all(MAGIC)?;
        w.write_all(&dim.to_le_bytes())?;
        w.write_all(&count.to_le_bytes())?;
        for vector in vectors {
            if vector.len() != dimension {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("vector of length {} in a {}-d index", vector.len(), dimension),
                ));
            }
            for value in vector {
                w.write_all(&value.to_le_bytes())?;
            }
        }
        Ok(())
    })?;

    debug!("Wrote {} vectors ({}-d) to {}", count, dimension, path.display());
    Ok(())
}

/// Reads and validates a vector file.
///
/// Returns the stored dimension and the vectors in label order. Every
/// structural problem is reported as [`SearchError::Corrupted`].
pub fn read_vectors(path: &Path) -> Result<(usize, Vec<Vec<f32>>), SearchError> {
    let corrupted = |msg: String| SearchError::Corrupted(format!("{}: {}", path.display(), msg));

    let file = File::open(path).map_err(|e| corrupted(format!("cannot open: {}", e)))?;
    let file_len = file
        .metadata()
        .map_err(|e| corrupted(format!("cannot stat: {}", e)))?
        .len();
    if file_len < MIN_INDEX_FILE_SIZE {
        return Err(corrupted(format!(
            "file is {} bytes, minimum is {}",
            file_len, MIN_INDEX_FILE_SIZE
        )));
    }

    let mut reader = BufReader::new(file);
    let mut header = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header)
        .map_err(|e| corrupted(format!("cannot read header: {}", e)))?;

    if &header[..8] != MAGIC {
        return Err(corrupted("bad magic".to_string()));
    }
    let mut dim_bytes = [0u8; 4];
    dim_bytes.copy_from_slice(&header[8..12]);
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&header[12..20]);
    let dimension = u32::from_le_bytes(dim_bytes) as usize;
    let count = u64::from_le_bytes(count_bytes);

    if dimension == 0 && count > 0 {
        return Err(corrupted(format!("{} vectors with dimension 0", count)));
    }

    let expected_len = count
        .checked_mul(dimension as u64)
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(MIN_INDEX_FILE_SIZE))
        .ok_or_else(|| corrupted("declared size overflows".to_string()))?;
    if file_len != expected_len {
        return Err(corrupted(format!(
            "file is {} bytes, header declares {}",
            file_len, expected_len
        )));
    }

    let mut vectors = Vec::with_capacity(count as usize);
    let mut buf = vec![0u8; dimension * 4];
    for _ in 0..count {
        reader
            .read_exact(&mut buf)
            .map_err(|e| corrupted(format!("truncated body: {}", e)))?;
        let vector: Vec<f32> = buf
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        vectors.push(vector);
    }

    Ok((dimension, vectors))
}

/// One label mapping in the sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEntry {
    pub label: usize,
    pub chunk_id: ChunkId,
}

/// Metadata persisted next to the vector file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    pub version: u32,
    /// `None` while no vector was ever inserted
    pub dimension: Option<usize>,
    pub element_count: usize,
    /// Unix timestamp of the save
    pub saved_at: u64,
    pub labels: Vec<LabelEntry>,
    pub tombstones: Vec<usize>,
}

impl Sidecar {
    /// Sidecar for the current state of an index.
    pub fn new(
        dimension: Option<usize>,
        labels: &[ChunkId],
        tombstones: impl IntoIterator<Item = usize>,
    ) -> Self {
        let mut tombstones: Vec<usize> = tombstones.into_iter().collect();
        tombstones.sort_unstable();
        Self {
            version: SIDECAR_VERSION,
            dimension,
            element_count: labels.len(),
            saved_at: get_current_timestamp(),
            labels: labels
                .iter()
                .enumerate()
                .map(|(label, &chunk_id)| LabelEntry { label, chunk_id })
                .collect(),
            tombstones,
        }
    }

    /// Checks internal consistency.
    ///
    /// Labels must cover `0..element_count` exactly once and tombstones must
    /// reference existing labels.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.version != SIDECAR_VERSION {
            return Err(SearchError::Corrupted(format!(
                "unsupported sidecar version {}",
                self.version
            )));
        }
        if self.labels.len() != self.element_count {
            return Err(SearchError::Corrupted(format!(
                "sidecar lists {} labels for {} elements",
                self.labels.len(),
                self.element_count
            )));
        }
        let mut seen = vec![false; self.element_count];
        for entry in &self.labels {
            match seen.get_mut(entry.label) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(SearchError::Corrupted(format!(
                        "label {} appears twice",
                        entry.label
                    )))
                }
                None => {
                    return Err(SearchError::Corrupted(format!(
                        "label {} out of range 0..{}",
                        entry.label, self.element_count
                    )))
                }
            }
        }
        if let Some(&bad) = self.tombstones.iter().find(|&&t| t >= self.element_count) {
            return Err(SearchError::Corrupted(format!(
                "tombstone {} out of range 0..{}",
                bad, self.element_count
            )));
        }
        if self.element_count > 0 && self.dimension.is_none() {
            return Err(SearchError::Corrupted(
                "elements present without a dimension".to_string(),
            ));
        }
        Ok(())
    }

    /// Chunk ids ordered by label. Call after [`validate`](Self::validate).
    pub fn chunk_ids_by_label(&self) -> Vec<ChunkId> {
        let mut entries = self.labels.clone();
        entries.sort_unstable_by_key(|e| e.label);
        entries.into_iter().map(|e| e.chunk_id).collect()
    }
}

/// Atomically writes the sidecar as JSON.
pub fn write_sidecar(path: &Path, sidecar: &Sidecar) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(sidecar)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_atomic(path, |w| w.write_all(&bytes))
}

/// Reads and validates the sidecar.
pub fn read_sidecar(path: &Path) -> Result<Sidecar, SearchError> {
    let bytes = fs::read(path).map_err(|e| {
        SearchError::Corrupted(format!("{}: cannot read: {}", path.display(), e))
    })?;
    let sidecar: Sidecar = serde_json::from_slice(&bytes).map_err(|e| {
        SearchError::Corrupted(format!("{}: invalid JSON: {}", path.display(), e))
    })?;
    sidecar.validate()?;
    Ok(sidecar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(n: u64) -> ChunkId {
        ChunkId::from_u64(n)
    }

    #[test]
    fn test_vector_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE);
        let vectors = [vec![1.0f32, 0.0, -2.5], vec![0.25, 0.5, 0.75]];

        write_vectors(&path, 3, vectors.iter().map(|v| v.as_slice())).unwrap();
        let (dim, loaded) = read_vectors(&path).unwrap();

        assert_eq!(dim, 3);
        assert_eq!(loaded, vectors.to_vec());
        assert_eq!(
            fs::metadata(&path).unwrap().len(),
            MIN_INDEX_FILE_SIZE + 2 * 3 * 4
        );
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_atomic_write_into_new_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("corpus").join("dense");
        let path = nested.join(INDEX_FILE);

        write_vectors(&path, 2, [[0.5f32, 0.5]].iter().map(|v| v.as_slice())).unwrap();

        assert!(path.exists());
        assert!(!tmp_path(&path).exists());
        assert_eq!(read_vectors(&path).unwrap(), (2, vec![vec![0.5, 0.5]]));
        sync_dir(&nested).unwrap();
        sync_dir(Path::new("")).unwrap();
    }

    #[test]
    fn test_short_file_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE);
        fs::write(&path, b"QRYV").unwrap();

        assert!(matches!(read_vectors(&path), Err(SearchError::Corrupted(_))));
    }

    #[test]
    fn test_bad_magic_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE);
        let mut bytes = b"NOTMAGIC".to_vec();
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        fs::write(&path, bytes).unwrap();

        let err = read_vectors(&path).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_truncated_body_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE);
        write_vectors(&path, 2, [[1.0f32, 2.0].as_slice()].into_iter()).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();

        assert!(matches!(read_vectors(&path), Err(SearchError::Corrupted(_))));
    }

    #[test]
    fn test_sidecar_roundtrip_and_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SIDECAR_FILE);
        let sidecar = Sidecar::new(Some(4), &[id(10), id(20), id(30)], [2, 0]);

        write_sidecar(&path, &sidecar).unwrap();
        let loaded = read_sidecar(&path).unwrap();

        assert_eq!(loaded, sidecar);
        assert_eq!(loaded.tombstones, vec![0, 2]);
        assert_eq!(loaded.chunk_ids_by_label(), vec![id(10), id(20), id(30)]);
    }

    #[test]
    fn test_sidecar_rejects_gaps_and_bad_tombstones() {
        let mut gap = Sidecar::new(Some(2), &[id(1), id(2)], []);
        gap.labels[1].label = 5;
        assert!(gap.validate().is_err());

        let mut dup = Sidecar::new(Some(2), &[id(1), id(2)], []);
        dup.labels[1].label = 0;
        assert!(dup.validate().is_err());

        let tomb = Sidecar::new(Some(2), &[id(1)], [3]);
        assert!(tomb.validate().is_err());
    }

    #[test]
    fn test_remove_temp_files() {
        let dir = TempDir::new().unwrap();
        let paths = IndexPaths::new(dir.path());
        fs::write(tmp_path(paths.index()), b"partial").unwrap();
        fs::write(tmp_path(paths.sidecar()), b"{").unwrap();

        assert_eq!(paths.remove_temp_files().unwrap(), 2);
        assert!(!tmp_path(paths.index()).exists());
        assert!(!paths.any_exists());
    }
}
