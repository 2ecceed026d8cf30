//! Single-file append-only node journal
//!
//! File format:
//! ```text
//! [HEADER: 64 bytes]
//!   - magic: 8 bytes ("BKINDEX\0")
//!   - version: 4 bytes (u32 LE)
//!   - width: 2 bytes (u16 LE)
//!   - reserved: 2 bytes
//!   - config_scalar: 8 bytes (u64 LE)
//!   - record_count: 8 bytes (u64 LE, as of the last sync)
//!   - reserved: 32 bytes
//!
//! [RECORDS: variable]
//!   - len: 4 bytes (u32 LE)
//!   - blob: type byte + zstd(bincode(NodeRecord))
//! ```
//!
//! The first record is the genesis node; every later record is one
//! successful insertion, in the order it was applied.
//!
//! A journal holds an exclusive lock on its file for as long as it is open,
//! so at most one handle appends to a given file.

use crate::model::NodeRecord;
use crate::store::blob::{Blob, BlobType};
use crate::tree::{TreeConfig, TreeStore};
use crate::{Error, Result, MAGIC, VERSION};
use std::fs::{File, OpenOptions, TryLockError};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const HEADER_SIZE: u64 = 64;

/// Append-only journal backing a [`TreeStore`]
pub struct Journal {
    path: PathBuf,
    file: File,
    /// End of the last complete record
    write_offset: u64,
    record_count: u64,
}

impl Journal {
    /// Create a journal holding every node currently in `tree`
    ///
    /// Fails if the file already exists. If anything fails after the file
    /// was created, the file is removed again.
    pub fn create(path: impl AsRef<Path>, tree: &TreeStore) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        discard_on_error(&path, Self::initialize(path.clone(), file, tree))
    }

    fn initialize(path: PathBuf, mut file: File, tree: &TreeStore) -> Result<Self> {
        lock(&file, &path)?;

        let config = tree.config();
        let mut header = [0u8; HEADER_SIZE as usize];
        header[0..8].copy_from_slice(MAGIC);
        header[8..12].copy_from_slice(&VERSION.to_le_bytes());
        header[12..14].copy_from_slice(&config.width.to_le_bytes());
        header[16..24].copy_from_slice(&config.config_scalar.to_le_bytes());
        file.write_all(&header)?;

        let mut journal = Journal {
            path,
            file,
            write_offset: HEADER_SIZE,
            record_count: 0,
        };
        for record in tree.records() {
            journal.append(&record)?;
        }
        journal.sync()?;

        tracing::info!(
            path = %journal.path.display(),
            width = config.width,
            nodes = tree.len(),
            "created journal"
        );
        Ok(journal)
    }

    /// Open a journal and rebuild its tree
    ///
    /// Every record is replayed through the insertion protocol and the
    /// result is audited, so a tampered file fails to open. A record cut
    /// short at the end of the file is dropped when everything before it
    /// covers the last synced count; a cut inside the synced prefix is
    /// `Corruption`.
    ///
    /// Fails with [`Error::Locked`] while another journal has the file open.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, TreeStore)> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        lock(&file, &path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)
            .map_err(|_| Error::InvalidFile("File too short for header".into()))?;

        if &header[0..8] != MAGIC {
            return Err(Error::InvalidFile("Invalid magic bytes".into()));
        }

        let version = u32::from_le_bytes(le_bytes(&header[8..12]));
        if version != VERSION {
            return Err(Error::VersionMismatch {
                expected: VERSION,
                found: version,
            });
        }

        let width = u16::from_le_bytes(le_bytes(&header[12..14]));
        let config_scalar = u64::from_le_bytes(le_bytes(&header[16..24]));
        let synced_count = u64::from_le_bytes(le_bytes(&header[24..32]));
        let config = TreeConfig::new(width, config_scalar);
        config.validate()?;

        let mut body = Vec::new();
        file.read_to_end(&mut body)?;

        let mut records = RecordReader::new(&body);
        let genesis = match records.next_blob()? {
            Some(blob) if blob.blob_type == BlobType::Genesis => blob.to_record()?,
            Some(_) => return Err(Error::Corruption("First record is not genesis".into())),
            None => return Err(Error::Corruption("Journal has no genesis record".into())),
        };
        if !genesis.id.is_root() {
            return Err(Error::Corruption(format!("Genesis record has id {}", genesis.id)));
        }

        let mut tree = TreeStore::new(config, genesis.value, genesis.commitment)?;
        while let Some(blob) = records.next_blob()? {
            if blob.blob_type != BlobType::Node {
                return Err(Error::Corruption("Second genesis record".into()));
            }
            tree.restore(&blob.to_record()?)?;
        }
        tree.verify()?;

        let record_count = tree.len() as u64;
        if record_count < synced_count {
            return Err(Error::Corruption(format!(
                "Header lists {} records, found {}",
                synced_count, record_count
            )));
        }

        let write_offset = HEADER_SIZE + records.offset() as u64;
        if records.is_torn() {
            tracing::warn!(
                path = %path.display(),
                nodes = record_count,
                dropped_bytes = body.len() - records.offset(),
                "dropping incomplete trailing record"
            );
            file.set_len(write_offset)?;
        }

        tracing::info!(path = %path.display(), nodes = tree.len(), "opened journal");

        let journal = Journal {
            path,
            file,
            write_offset,
            record_count,
        };
        Ok((journal, tree))
    }

    /// Append one record
    pub fn append(&mut self, record: &NodeRecord) -> Result<()> {
        let compressed = Blob::from_record(record)?.compress()?;
        let len = compressed.len() as u32;

        self.file.seek(SeekFrom::Start(self.write_offset))?;
        self.file.write_all(&len.to_le_bytes())?;
        self.file.write_all(&compressed)?;

        self.write_offset += 4 + len as u64;
        self.record_count += 1;
        Ok(())
    }

    /// Flush the record count and data to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(24))?;
        self.file.write_all(&self.record_count.to_le_bytes())?;
        self.file.sync_all()?;
        Ok(())
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.sync();
    }
}

fn lock(file: &File, path: &Path) -> Result<()> {
    match file.try_lock() {
        Ok(()) => Ok(()),
        Err(TryLockError::WouldBlock) => Err(Error::Locked(path.to_path_buf())),
        Err(TryLockError::Error(e)) => Err(e.into()),
    }
}

/// Remove a half-written file when its initialization failed
fn discard_on_error<T>(path: &Path, result: Result<T>) -> Result<T> {
    if result.is_err() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "could not remove partial journal");
        }
    }
    result
}

fn le_bytes<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}

/// Walks length-prefixed blobs in the journal body
///
/// Stops at the first record that runs past the end of the body and marks
/// the reader torn; `offset` then points at the start of that record.
struct RecordReader<'a> {
    body: &'a [u8],
    offset: usize,
    torn: bool,
}

impl<'a> RecordReader<'a> {
    fn new(body: &'a [u8]) -> Self {
        RecordReader {
            body,
            offset: 0,
            torn: false,
        }
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn is_torn(&self) -> bool {
        self.torn
    }

    fn next_blob(&mut self) -> Result<Option<Blob>> {
        let rest = &self.body[self.offset..];
        if rest.is_empty() || self.torn {
            return Ok(None);
        }
        let data = rest.get(0..4).and_then(|prefix| {
            let len = u32::from_le_bytes(le_bytes(prefix)) as usize;
            rest.get(4..4 + len)
        });
        let Some(data) = data else {
            self.torn = true;
            return Ok(None);
        };
        let blob = Blob::decompress(data)?;
        self.offset += 4 + data.len();
        Ok(Some(blob))
    }
}
