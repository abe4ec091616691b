use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A store mutation, as recorded in the WAL.
///
/// Values are kept as JSON text: bincode cannot decode self-describing
/// `serde_json::Value`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    Write { path: String, json: String },
    Update { path: String, json: String },
    Remove { path: String },
}

/// Encode a single mutation to [len][bincode][crc32] format.
fn encode_mutation(writer: &mut impl Write, mutation: &Mutation) -> io::Result<()> {
    let payload =
        bincode::serialize(mutation).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Append-only write-ahead log behind a durable `MemoryStore`.
///
/// Format per entry: `[u32: len][bincode: Mutation][u32: crc32]`.
/// A truncated or corrupt trailing entry (crash mid-write) is discarded on replay,
/// and [`Wal::recover`] cuts it off the file before new entries are appended.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    /// Entries in the log file, counting the snapshot written by the last compaction.
    appends_since_compact: usize,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    /// Replay the log at `path`, drop any invalid tail, and open it for appending.
    ///
    /// Appending after a torn entry would hide every later entry from the next
    /// replay, so the file is truncated to its last valid entry first.
    pub fn recover(path: &Path) -> io::Result<(Self, Vec<Mutation>)> {
        let (mutations, valid_len) = read_entries(path)?;
        if let Ok(meta) = fs::metadata(path) {
            if meta.len() > valid_len {
                tracing::warn!(
                    path = %path.display(),
                    discarded_bytes = meta.len() - valid_len,
                    "truncating invalid WAL tail"
                );
                let file = OpenOptions::new().write(true).open(path)?;
                file.set_len(valid_len)?;
                file.sync_all()?;
            }
        }
        let mut wal = Self::open(path)?;
        wal.appends_since_compact = mutations.len();
        Ok((wal, mutations))
    }

    /// Append one mutation and fsync before returning.
    pub fn append(&mut self, mutation: &Mutation) -> io::Result<()> {
        encode_mutation(&mut self.writer, mutation)?;
        self.appends_since_compact += 1;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> usize {
        self.appends_since_compact
    }

    /// Replace the log with `mutations`: write a temp file, fsync, rename over.
    pub fn compact(&mut self, mutations: &[Mutation]) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            for mutation in mutations {
                encode_mutation(&mut writer, mutation)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = mutations.len();
        Ok(())
    }

    /// Read every valid mutation from disk. A missing file replays as empty.
    pub fn replay(path: &Path) -> io::Result<Vec<Mutation>> {
        read_entries(path).map(|(mutations, _)| mutations)
    }
}

/// Valid mutations plus the byte length of the prefix that holds them.
fn read_entries(path: &Path) -> io::Result<(Vec<Mutation>, u64)> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    let mut mutations = Vec::new();
    let mut valid_len = 0u64;

    loop {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
        let len = u32::from_le_bytes(len_buf) as usize;

        let mut payload = vec![0u8; len];
        match reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
            Err(e) => return Err(e),
        }

        let mut crc_buf = [0u8; 4];
        match reader.read_exact(&mut crc_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
            Err(e) => return Err(e),
        }
        if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
            tracing::warn!(path = %path.display(), "WAL checksum mismatch, stopping replay");
            break;
        }

        match bincode::deserialize::<Mutation>(&payload) {
            Ok(mutation) => mutations.push(mutation),
            Err(_) => break,
        }
        valid_len += 8 + len as u64;
    }

    Ok((mutations, valid_len))
}
