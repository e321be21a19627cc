//! On-disk key index for the vector disk hash.
//!
//! The index file maps each key to the [`Location`] of its value region in
//! the data file. On disk it is an open-addressed hash table of fixed-size
//! slots behind a small header:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ magic "VDHI" (4) │ version u32 │ max_key_size u64            │
//! │ capacity u64     │ n_entries u64 │ slots crc32 u32           │
//! ├──────────────────────────────────────────────────────────────┤
//! │ slot 0 │ slot 1 │ ... │ slot capacity-1                      │
//! └──────────────────────────────────────────────────────────────┘
//!
//! Slot: occupied u8 │ key_len u16 │ key (max_key_size, zero-padded)
//!       │ start u64 │ write_location u64 │ bytes_reserved u64
//! ```
//!
//! Slot placement hashes the key with `FxHasher` and probes linearly. A
//! writable index keeps its entries in memory and writes the table out once
//! at [`DiskIndex::seal`]; locations are only meaningful once the dataset is
//! sealed, so nothing is flushed mid-build. Opening validates the header and
//! the CRC-32 of the slot region, then loads every occupied slot.

use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rustc_hash::{FxHashMap, FxHasher};

use ldlookup_core::{Error, Result};

/// Magic bytes identifying an index file.
const INDEX_MAGIC: [u8; 4] = *b"VDHI";

/// Current index format version.
const INDEX_FORMAT_VERSION: u32 = 1;

/// Fixed per-slot overhead: occupied flag, key length, location record.
const SLOT_OVERHEAD: usize = 1 + 2 + 24;

/// Location of one key's value region in the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// First byte of the key's value region.
    pub start: u64,
    /// Next write position within a reserved region.
    pub write_location: u64,
    /// Reserved bytes not yet consumed by appends.
    pub bytes_reserved: u64,
}

/// The `.vdhdht` file: key → [`Location`].
pub struct DiskIndex {
    path: PathBuf,
    file: File,
    max_key_size: usize,
    entries: FxHashMap<String, Location>,
    sealed: bool,
}

impl DiskIndex {
    /// Create a new, empty index file.
    ///
    /// Fails with `AlreadyExists` if the file is present.
    pub fn create(path: &Path, max_key_size: usize) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| annotate_open_error(e, path))?;

        // A placeholder header so the file is recognisable before sealing.
        write_header(&mut file, max_key_size, 0, 0, 0)?;

        Ok(DiskIndex {
            path: path.to_path_buf(),
            file,
            max_key_size,
            entries: FxHashMap::default(),
            sealed: false,
        })
    }

    /// Open an existing index read-only, validating header and checksum.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|e| annotate_open_error(e, path))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if magic != INDEX_MAGIC {
            return Err(Error::corrupt(format!(
                "bad index magic in {}",
                path.display()
            )));
        }
        let version = file.read_u32::<LittleEndian>()?;
        if version != INDEX_FORMAT_VERSION {
            return Err(Error::corrupt(format!(
                "unsupported index format version {}",
                version
            )));
        }
        let max_key_size = file.read_u64::<LittleEndian>()? as usize;
        let capacity = file.read_u64::<LittleEndian>()? as usize;
        let n_entries = file.read_u64::<LittleEndian>()? as usize;
        let stored_crc = file.read_u32::<LittleEndian>()?;

        let mut slots = Vec::new();
        file.read_to_end(&mut slots)?;

        let slot_size = SLOT_OVERHEAD + max_key_size;
        if slots.len() != capacity * slot_size {
            return Err(Error::corrupt(format!(
                "index slot region is {} bytes, expected {}",
                slots.len(),
                capacity * slot_size
            )));
        }
        if crc32fast::hash(&slots) != stored_crc {
            return Err(Error::corrupt("index checksum mismatch"));
        }

        let mut entries =
            FxHashMap::with_capacity_and_hasher(n_entries, Default::default());
        for slot in slots.chunks_exact(slot_size) {
            if slot[0] == 0 {
                continue;
            }
            let key_len = u16::from_le_bytes([slot[1], slot[2]]) as usize;
            if key_len > max_key_size {
                return Err(Error::corrupt("index slot key overruns slot"));
            }
            let key = std::str::from_utf8(&slot[3..3 + key_len])
                .map_err(|_| Error::corrupt("index slot key is not UTF-8"))?
                .to_string();
            let loc_bytes = &slot[3 + max_key_size..];
            let location = Location {
                start: u64::from_le_bytes(loc_bytes[0..8].try_into().unwrap()),
                write_location: u64::from_le_bytes(loc_bytes[8..16].try_into().unwrap()),
                bytes_reserved: u64::from_le_bytes(loc_bytes[16..24].try_into().unwrap()),
            };
            entries.insert(key, location);
        }
        if entries.len() != n_entries {
            return Err(Error::corrupt(format!(
                "index holds {} entries, header claims {}",
                entries.len(),
                n_entries
            )));
        }

        Ok(DiskIndex {
            path: path.to_path_buf(),
            file,
            max_key_size,
            entries,
            sealed: true,
        })
    }

    /// Maximum key length fixed at creation.
    pub fn max_key_size(&self) -> usize {
        self.max_key_size
    }

    /// Number of indexed keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` is indexed.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The location stored for `key`.
    pub fn get(&self, key: &str) -> Option<Location> {
        self.entries.get(key).copied()
    }

    /// Insert or update the location for `key`.
    pub fn put(&mut self, key: &str, location: Location) {
        self.entries.insert(key.to_string(), location);
    }

    /// Write the table out and make the file durable.
    pub fn seal(&mut self) -> Result<()> {
        let n_entries = self.entries.len();
        let capacity = (n_entries * 2).max(16).next_power_of_two();
        let slot_size = SLOT_OVERHEAD + self.max_key_size;

        // Open addressing with linear probing over the final entry set.
        let mut placement: Vec<Option<(&String, &Location)>> = vec![None; capacity];
        for entry in &self.entries {
            let mut slot = slot_hash(entry.0) as usize & (capacity - 1);
            while placement[slot].is_some() {
                slot = (slot + 1) & (capacity - 1);
            }
            placement[slot] = Some(entry);
        }

        let mut slots = vec![0u8; capacity * slot_size];
        for (slot, entry) in placement.iter().enumerate() {
            let Some((key, location)) = entry else {
                continue;
            };
            let buf = &mut slots[slot * slot_size..(slot + 1) * slot_size];
            buf[0] = 1;
            buf[1..3].copy_from_slice(&(key.len() as u16).to_le_bytes());
            buf[3..3 + key.len()].copy_from_slice(key.as_bytes());
            let loc_bytes = &mut buf[3 + self.max_key_size..];
            loc_bytes[0..8].copy_from_slice(&location.start.to_le_bytes());
            loc_bytes[8..16].copy_from_slice(&location.write_location.to_le_bytes());
            loc_bytes[16..24].copy_from_slice(&location.bytes_reserved.to_le_bytes());
        }
        let crc = crc32fast::hash(&slots);

        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        let mut writer = BufWriter::new(&mut self.file);
        write_header_to(
            &mut writer,
            self.max_key_size,
            capacity as u64,
            n_entries as u64,
            crc,
        )?;
        writer.write_all(&slots)?;
        writer.flush()?;
        drop(writer);
        self.file.sync_all()?;
        self.sealed = true;
        Ok(())
    }

    /// Whether [`DiskIndex::seal`] has run (always true when opened).
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Path of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn slot_hash(key: &str) -> u64 {
    let mut hasher = FxHasher::default();
    key.as_bytes().hash(&mut hasher);
    hasher.finish()
}

fn write_header(
    file: &mut File,
    max_key_size: usize,
    capacity: u64,
    n_entries: u64,
    crc: u32,
) -> Result<()> {
    file.seek(SeekFrom::Start(0))?;
    write_header_to(file, max_key_size, capacity, n_entries, crc)
}

fn write_header_to<W: Write>(
    writer: &mut W,
    max_key_size: usize,
    capacity: u64,
    n_entries: u64,
    crc: u32,
) -> Result<()> {
    writer.write_all(&INDEX_MAGIC)?;
    writer.write_u32::<LittleEndian>(INDEX_FORMAT_VERSION)?;
    writer.write_u64::<LittleEndian>(max_key_size as u64)?;
    writer.write_u64::<LittleEndian>(capacity)?;
    writer.write_u64::<LittleEndian>(n_entries)?;
    writer.write_u32::<LittleEndian>(crc)?;
    Ok(())
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
