//! Vector disk hash: a persistent write-once map from string keys to
//! ordered sequences of string values.
//!
//! # Data file layout (`.vdhdat`)
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ max_key_size (ASCII decimal) KEY_DELIMITER    │
//! ├───────────────────────────────────────────────┤
//! │ KEY_DELIMITER                                 │
//! │ value \t value \t ... value                   │
//! │ [KEY_DELIMITER padding for unused reserve]    │
//! ├───────────────────────────────────────────────┤
//! │ ...                                           │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! `KEY_DELIMITER` is newline, `VALUE_DELIMITER` is tab; values may contain
//! neither. Reading a key's region stops at the first newline, so unused
//! reserved bytes (padded with newlines) terminate a read the same way the
//! next key's separator does.
//!
//! # Appending
//!
//! Values for the key most recently appended at the end of the file keep
//! accumulating there. A key that was [`VectorDiskHash::reserve`]d takes its
//! appends inside its reserved region until the reserve runs out. Appending
//! to any other existing key fails: regions are write-once and never move.
//!
//! A reserved key's first value is written with a leading value delimiter.
//! The read path discards empty fragments, so this is unobservable.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rand::Rng;

use ldlookup_core::{Error, Result};

use crate::index::{DiskIndex, Location};

/// Extension of the data file.
pub const DATA_EXTENSION: &str = "vdhdat";
/// Extension of the index file.
pub const INDEX_EXTENSION: &str = "vdhdht";

/// Separates per-key regions in the data file; also the padding byte.
const KEY_DELIMITER: u8 = b'\n';
/// Separates values within one key's region.
const VALUE_DELIMITER: u8 = b'\t';

/// Chunk size for writing reserve padding.
const PAD_CHUNK: usize = 64 * 1024;

/// Persistent write-once map from string keys to vectors of string values.
///
/// Owns its two backing files for its lifetime. Writable hashes must be
/// sealed with [`VectorDiskHash::close`]; dropping an unsealed hash seals
/// best-effort and logs on failure.
pub struct VectorDiskHash {
    name: String,
    data_path: PathBuf,
    file: File,
    index: DiskIndex,
    max_key_size: usize,
    eof_key: Option<String>,
    writable: bool,
    sealed: bool,
}

impl VectorDiskHash {
    /// Create a new hash named `name` inside `dir`.
    ///
    /// Fails with `AlreadyExists` if either backing file is present.
    pub fn create(name: &str, dir: &Path, max_key_size: usize) -> Result<Self> {
        let data_path = dir.join(format!("{}.{}", name, DATA_EXTENSION));
        let index_path = dir.join(format!("{}.{}", name, INDEX_EXTENSION));

        let mut file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&data_path)
            .map_err(|e| annotate_open_error(e, &data_path))?;

        // Header: the maximum key size in ASCII decimal.
        file.write_all(max_key_size.to_string().as_bytes())?;
        file.write_all(&[KEY_DELIMITER])?;

        let index = DiskIndex::create(&index_path, max_key_size)?;

        Ok(VectorDiskHash {
            name: name.to_string(),
            data_path,
            file,
            index,
            max_key_size,
            eof_key: None,
            writable: true,
            sealed: false,
        })
    }

    /// Open an existing hash read-only.
    ///
    /// Recovers `max_key_size` from the data file header and cross-checks it
    /// against the index.
    pub fn open(name: &str, dir: &Path) -> Result<Self> {
        let data_path = dir.join(format!("{}.{}", name, DATA_EXTENSION));
        let index_path = dir.join(format!("{}.{}", name, INDEX_EXTENSION));

        let mut file = OpenOptions::new()
            .read(true)
            .open(&data_path)
            .map_err(|e| annotate_open_error(e, &data_path))?;

        let header = read_region(&mut file, 0)?;
        let max_key_size: usize = std::str::from_utf8(&header)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                Error::corrupt(format!("bad max key size header in {}", data_path.display()))
            })?;

        let index = DiskIndex::open(&index_path)?;
        if index.max_key_size() != max_key_size {
            return Err(Error::corrupt(format!(
                "index max key size {} disagrees with data header {}",
                index.max_key_size(),
                max_key_size
            )));
        }

        Ok(VectorDiskHash {
            name: name.to_string(),
            data_path,
            file,
            index,
            max_key_size,
            eof_key: None,
            writable: false,
            sealed: true,
        })
    }

    /// Name this hash was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum key length fixed at creation.
    pub fn max_key_size(&self) -> usize {
        self.max_key_size
    }

    /// Whether `key` was ever reserved or appended.
    pub fn is_member(&self, key: &str) -> bool {
        self.index.contains(key)
    }

    /// Pre-allocate `bytes` of space for values of an unseen `key`.
    ///
    /// The reservation must cover the total length of all values plus one
    /// byte per value for separator overhead.
    pub fn reserve(&mut self, key: &str, bytes: u64) -> Result<()> {
        self.check_writable()?;
        self.check_key(key)?;
        if self.index.contains(key) {
            return Err(Error::DuplicateKey {
                key: key.to_string(),
            });
        }

        let end = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&[KEY_DELIMITER])?;
        let start = end + 1;

        // The reserved region now seals the trailing key's region; that key
        // can no longer grow in place.
        self.eof_key = None;

        // Pad the region with KEY_DELIMITER so a reader of a partially
        // filled region terminates at the first unused byte.
        let padding = [KEY_DELIMITER; PAD_CHUNK];
        let mut remaining = bytes as usize;
        while remaining > 0 {
            let n = remaining.min(PAD_CHUNK);
            self.file.write_all(&padding[..n])?;
            remaining -= n;
        }

        self.index.put(
            key,
            Location {
                start,
                write_location: start,
                bytes_reserved: bytes,
            },
        );
        Ok(())
    }

    /// Append `value` to the sequence stored under `key`.
    ///
    /// Fails with `OutOfReserve` if `key` is neither the key currently being
    /// written at the end of the file nor a reserved key with enough space
    /// left.
    pub fn append(&mut self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        self.check_key(key)?;
        if value
            .bytes()
            .any(|b| b == KEY_DELIMITER || b == VALUE_DELIMITER)
        {
            return Err(Error::InvalidValue);
        }

        if self.eof_key.as_deref() == Some(key) {
            // Still the newest key in the file: keep growing it in place.
            self.file.seek(SeekFrom::End(0))?;
            self.file.write_all(&[VALUE_DELIMITER])?;
            self.file.write_all(value.as_bytes())?;
            return Ok(());
        }

        match self.index.get(key) {
            None => {
                // Fresh key: terminate the previous region and start a new
                // one at the end of the file.
                let end = self.file.seek(SeekFrom::End(0))?;
                self.file.write_all(&[KEY_DELIMITER])?;
                self.index.put(
                    key,
                    Location {
                        start: end + 1,
                        write_location: 0,
                        bytes_reserved: 0,
                    },
                );
                self.file.write_all(value.as_bytes())?;
                self.eof_key = Some(key.to_string());
                Ok(())
            }
            Some(mut location) => {
                // Reserved key (or a closed one, whose reserve is zero).
                let needed = value.len() as u64 + 1;
                if needed > location.bytes_reserved {
                    return Err(Error::OutOfReserve {
                        key: key.to_string(),
                    });
                }
                self.file.seek(SeekFrom::Start(location.write_location))?;
                self.file.write_all(&[VALUE_DELIMITER])?;
                self.file.write_all(value.as_bytes())?;
                location.write_location += needed;
                location.bytes_reserved -= needed;
                self.index.put(key, location);
                Ok(())
            }
        }
    }

    /// The values appended to `key`, in insertion order.
    pub fn lookup(&mut self, key: &str) -> Result<Vec<String>> {
        let location = self.index.get(key).ok_or_else(|| Error::MissingKey {
            key: key.to_string(),
        })?;
        let region = read_region(&mut self.file, location.start)?;
        split_values(&region)
    }

    /// `k` uniform draws, with replacement, from the values of `key`.
    pub fn lookup_sample(&mut self, key: &str, k: usize) -> Result<Vec<String>> {
        let values = self.lookup(key)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        if values.is_empty() {
            return Err(Error::EmptyKey {
                key: key.to_string(),
            });
        }
        let mut rng = rand::thread_rng();
        Ok((0..k)
            .map(|_| values[rng.gen_range(0..values.len())].clone())
            .collect())
    }

    /// Seal the hash: write the index out and sync the data file.
    pub fn close(mut self) -> Result<()> {
        self.seal()
    }

    fn seal(&mut self) -> Result<()> {
        if self.sealed || !self.writable {
            return Ok(());
        }
        self.sealed = true;
        self.index.seal()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(Error::ReadOnly)
        }
    }

    fn check_key(&self, key: &str) -> Result<()> {
        if key.len() > self.max_key_size {
            return Err(Error::KeyTooLong {
                key: key.to_string(),
                max_key_size: self.max_key_size,
            });
        }
        Ok(())
    }
}

impl Drop for VectorDiskHash {
    fn drop(&mut self) {
        if let Err(e) = self.seal() {
            tracing::warn!(
                data_path = %self.data_path.display(),
                error = %e,
                "failed to seal vector disk hash on drop"
            );
        }
    }
}

/// Read bytes starting at `start` up to the next `KEY_DELIMITER` or EOF.
fn read_region(file: &mut File, start: u64) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(start))?;
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        if let Some(pos) = buf[..n].iter().position(|&b| b == KEY_DELIMITER) {
            out.extend_from_slice(&buf[..pos]);
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    Ok(out)
}

/// Split a region on `VALUE_DELIMITER`, discarding empty fragments.
fn split_values(region: &[u8]) -> Result<Vec<String>> {
    region
        .split(|&b| b == VALUE_DELIMITER)
        .filter(|fragment| !fragment.is_empty())
        .map(|fragment| {
            std::str::from_utf8(fragment)
                .map(str::to_string)
                .map_err(|_| Error::corrupt("stored value is not UTF-8"))
        })
        .collect()
}

fn annotate_open_error(e: std::io::Error, path: &Path) -> Error {
    match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::AlreadyExists => Error::AlreadyExists {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::{tempdir, TempDir};

    fn new_hash(max_key_size: usize) -> (TempDir, VectorDiskHash) {
        let dir = tempdir().unwrap();
        let vdh = VectorDiskHash::create("test", dir.path(), max_key_size).unwrap();
        (dir, vdh)
    }

    #[test]
    fn append_then_lookup_preserves_order() {
        let (_dir, mut vdh) = new_hash(8);
        vdh.append("rs1", "a").unwrap();
        vdh.append("rs1", "b").unwrap();
        vdh.append("rs1", "c").unwrap();
        assert_eq!(vdh.lookup("rs1").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn sequential_keys_stay_separate() {
        let (_dir, mut vdh) = new_hash(8);
        vdh.append("rs1", "a").unwrap();
        vdh.append("rs1", "b").unwrap();
        vdh.append("rs2", "c").unwrap();
        assert_eq!(vdh.lookup("rs1").unwrap(), vec!["a", "b"]);
        assert_eq!(vdh.lookup("rs2").unwrap(), vec!["c"]);
    }

    #[test]
    fn append_to_closed_key_fails() {
        // append("p","1"); append("q","2"); append("p","3") — the third
        // call fails because "p" is neither newest nor reserved.
        let (_dir, mut vdh) = new_hash(8);
        vdh.append("p", "1").unwrap();
        vdh.append("q", "2").unwrap();
        assert!(matches!(
            vdh.append("p", "3"),
            Err(Error::OutOfReserve { .. })
        ));
    }

    #[test]
    fn reserved_appends_interleave() {
        let (_dir, mut vdh) = new_hash(8);
        vdh.reserve("p", 16).unwrap();
        vdh.reserve("q", 16).unwrap();
        vdh.append("p", "1").unwrap();
        vdh.append("q", "2").unwrap();
        vdh.append("p", "3").unwrap();
        vdh.append("q", "4").unwrap();
        assert_eq!(vdh.lookup("p").unwrap(), vec!["1", "3"]);
        assert_eq!(vdh.lookup("q").unwrap(), vec!["2", "4"]);
    }

    #[test]
    fn reserve_boundary_is_exact() {
        // 10 bytes of reserve: "xy" uses 3 (tab + 2), "zzz" uses 4,
        // leaving 3 — not enough for another "www" (4).
        let (_dir, mut vdh) = new_hash(8);
        vdh.reserve("a", 10).unwrap();
        vdh.append("a", "xy").unwrap();
        vdh.append("a", "zzz").unwrap();
        assert_eq!(vdh.lookup("a").unwrap(), vec!["xy", "zzz"]);
        assert!(matches!(
            vdh.append("a", "www"),
            Err(Error::OutOfReserve { .. })
        ));
        // The failed append leaves earlier values intact.
        assert_eq!(vdh.lookup("a").unwrap(), vec!["xy", "zzz"]);
    }

    #[test]
    fn reserve_rejects_existing_key() {
        let (_dir, mut vdh) = new_hash(8);
        vdh.append("rs1", "a").unwrap();
        assert!(matches!(
            vdh.reserve("rs1", 10),
            Err(Error::DuplicateKey { .. })
        ));
        vdh.reserve("rs2", 10).unwrap();
        assert!(matches!(
            vdh.reserve("rs2", 10),
            Err(Error::DuplicateKey { .. })
        ));
    }

    #[test]
    fn reserve_closes_the_trailing_key() {
        let (_dir, mut vdh) = new_hash(8);
        vdh.append("rs1", "a").unwrap();
        vdh.reserve("rs2", 8).unwrap();
        // rs1's region is sealed behind the reservation.
        assert!(matches!(
            vdh.append("rs1", "b"),
            Err(Error::OutOfReserve { .. })
        ));
        assert_eq!(vdh.lookup("rs1").unwrap(), vec!["a"]);
    }

    #[test]
    fn membership_tracks_reserves_and_appends() {
        let (_dir, mut vdh) = new_hash(8);
        assert!(!vdh.is_member("rs1"));
        vdh.append("rs1", "a").unwrap();
        vdh.reserve("rs2", 4).unwrap();
        assert!(vdh.is_member("rs1"));
        assert!(vdh.is_member("rs2"));
        assert!(!vdh.is_member("rs3"));
    }

    #[test]
    fn lookup_missing_key() {
        let (_dir, mut vdh) = new_hash(8);
        assert!(matches!(
            vdh.lookup("absent"),
            Err(Error::MissingKey { .. })
        ));
    }

    #[test]
    fn key_too_long_rejected() {
        let (_dir, mut vdh) = new_hash(4);
        assert!(matches!(
            vdh.append("toolong", "v"),
            Err(Error::KeyTooLong { .. })
        ));
        assert!(matches!(
            vdh.reserve("toolong", 4),
            Err(Error::KeyTooLong { .. })
        ));
    }

    #[test]
    fn delimiter_bytes_in_values_rejected() {
        let (_dir, mut vdh) = new_hash(8);
        assert!(matches!(vdh.append("k", "a\tb"), Err(Error::InvalidValue)));
        assert!(matches!(vdh.append("k", "a\nb"), Err(Error::InvalidValue)));
    }

    #[test]
    fn close_reopen_round_trips() {
        let dir = tempdir().unwrap();
        {
            let mut vdh = VectorDiskHash::create("test", dir.path(), 8).unwrap();
            vdh.append("rs1", "a").unwrap();
            vdh.append("rs1", "b").unwrap();
            vdh.reserve("rs9", 12).unwrap();
            vdh.append("rs9", "deep").unwrap();
            vdh.append("rs2", "c").unwrap();
            vdh.close().unwrap();
        }

        let mut vdh = VectorDiskHash::open("test", dir.path()).unwrap();
        assert_eq!(vdh.max_key_size(), 8);
        assert_eq!(vdh.lookup("rs1").unwrap(), vec!["a", "b"]);
        assert_eq!(vdh.lookup("rs9").unwrap(), vec!["deep"]);
        assert_eq!(vdh.lookup("rs2").unwrap(), vec!["c"]);
    }

    #[test]
    fn drop_without_close_still_seals() {
        let dir = tempdir().unwrap();
        {
            let mut vdh = VectorDiskHash::create("test", dir.path(), 8).unwrap();
            vdh.append("rs1", "a").unwrap();
        }
        let mut vdh = VectorDiskHash::open("test", dir.path()).unwrap();
        assert_eq!(vdh.lookup("rs1").unwrap(), vec!["a"]);
    }

    #[test]
    fn reopened_hash_is_read_only() {
        let dir = tempdir().unwrap();
        VectorDiskHash::create("test", dir.path(), 8)
            .unwrap()
            .close()
            .unwrap();

        let mut vdh = VectorDiskHash::open("test", dir.path()).unwrap();
        assert!(matches!(vdh.append("rs1", "a"), Err(Error::ReadOnly)));
        assert!(matches!(vdh.reserve("rs1", 4), Err(Error::ReadOnly)));
    }

    #[test]
    fn create_refuses_existing_dataset() {
        let dir = tempdir().unwrap();
        VectorDiskHash::create("test", dir.path(), 8)
            .unwrap()
            .close()
            .unwrap();
        assert!(matches!(
            VectorDiskHash::create("test", dir.path(), 8),
            Err(Error::AlreadyExists { .. })
        ));
    }

    #[test]
    fn open_missing_dataset() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            VectorDiskHash::open("absent", dir.path()),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn sample_of_zero_is_empty() {
        let (_dir, mut vdh) = new_hash(8);
        vdh.append("k", "v").unwrap();
        assert_eq!(vdh.lookup_sample("k", 0).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn sample_of_empty_key_fails() {
        let (_dir, mut vdh) = new_hash(8);
        vdh.reserve("k", 8).unwrap();
        assert_eq!(vdh.lookup("k").unwrap(), Vec::<String>::new());
        assert!(matches!(
            vdh.lookup_sample("k", 1),
            Err(Error::EmptyKey { .. })
        ));
    }

    #[test]
    fn sample_draws_members_with_replacement() {
        let (_dir, mut vdh) = new_hash(8);
        for v in ["a", "b", "c"] {
            vdh.append("k", v).unwrap();
        }
        let sample = vdh.lookup_sample("k", 64).unwrap();
        assert_eq!(sample.len(), 64);
        assert!(sample.iter().all(|v| ["a", "b", "c"].contains(&v.as_str())));
    }

    #[test]
    fn sample_is_roughly_uniform() {
        let (_dir, mut vdh) = new_hash(8);
        let n_values = 100usize;
        for i in 0..n_values {
            vdh.append("k", &format!("v{}", i)).unwrap();
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..10_000 {
            for v in vdh.lookup_sample("k", 1).unwrap() {
                *counts.entry(v).or_insert(0) += 1;
            }
        }

        // Expected count per value is 100; a uniform sampler stays well
        // inside [40, 200] (≈6σ) for all 100 values.
        assert_eq!(counts.len(), n_values);
        for (value, count) in counts {
            assert!(
                (40..=200).contains(&count),
                "value {} drawn {} times",
                value,
                count
            );
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            // Interleaved reserved appends always read back exactly the
            // values written, in order, regardless of schedule.
            #[test]
            fn interleaved_reserved_appends_read_back(
                schedule in proptest::collection::vec(0usize..4, 1..64),
            ) {
                let dir = tempdir().unwrap();
                let mut vdh = VectorDiskHash::create("t", dir.path(), 4).unwrap();
                let keys = ["k0", "k1", "k2", "k3"];
                for key in keys {
                    // Every value is "v" plus an index: at most 6 bytes
                    // with the separator; 64 slots cover any schedule.
                    vdh.reserve(key, 6 * 64).unwrap();
                }

                let mut expected: HashMap<&str, Vec<String>> = HashMap::new();
                for (i, &choice) in schedule.iter().enumerate() {
                    let key = keys[choice];
                    let value = format!("v{}", i);
                    vdh.append(key, &value).unwrap();
                    expected.entry(key).or_default().push(value);
                }

                for key in keys {
                    let got = vdh.lookup(key).unwrap();
                    let want = expected.remove(key).unwrap_or_default();
                    prop_assert_eq!(got, want);
                }
            }
        }
    }
}
