use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::batch::WriteBatch;
use crate::config::SyncMode;
use crate::error::{LedgerError, LedgerResult};
use crate::memory::CommitJournal;

/// One committed transaction as persisted in the write-ahead log.
///
/// On-disk format:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized CommitRecord)]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Block height assigned to the commit.
    pub height: u64,
    pub tx_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub writes: WriteBatch,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Serialize `record` into one complete frame.
fn encode_frame(record: &CommitRecord) -> LedgerResult<Vec<u8>> {
    let payload =
        bincode::serialize(record).map_err(|e| LedgerError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len()).map_err(|_| {
        LedgerError::Serialization(format!("commit record too large: {} bytes", payload.len()))
    })?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// The frame found at the front of a byte slice.
#[derive(Debug, PartialEq, Eq)]
enum Frame<'a> {
    /// Checksum matched. `len` counts the header too.
    Intact { payload: &'a [u8], len: usize },
    Corrupt { expected: u32, actual: u32, len: usize },
    /// Too few bytes for the frame the header announces, or no usable header.
    Torn,
}

fn decode_frame(buf: &[u8]) -> Frame<'_> {
    let Some((header, rest)) = buf.split_first_chunk::<HEADER_SIZE>() else {
        return Frame::Torn;
    };
    let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let expected = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    // Appends never write an empty payload.
    if length == 0 || rest.len() < length {
        return Frame::Torn;
    }

    let payload = &rest[..length];
    let actual = crc32fast::hash(payload);
    let len = HEADER_SIZE + length;
    if actual == expected {
        Frame::Intact { payload, len }
    } else {
        Frame::Corrupt { expected, actual, len }
    }
}

/// The file a log appends to.
trait LogSink: Write + Send {
    fn sync(&mut self) -> io::Result<()>;
    /// Cut the file back to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl LogSink for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

struct WalWriter {
    sink: Box<dyn LogSink>,
    /// End of the last complete frame.
    offset: u64,
    /// Bytes past `offset` may be on disk from a failed append.
    dirty: bool,
}

impl WalWriter {
    fn write_frame(&mut self, frame: &[u8], sync_mode: SyncMode) -> io::Result<()> {
        self.sink.write_all(frame)?;
        self.sink.flush()?;
        if matches!(sync_mode, SyncMode::EveryWrite) {
            self.sink.sync()?;
        }
        Ok(())
    }

    fn discard_tail(&mut self) -> io::Result<()> {
        self.sink.truncate(self.offset)?;
        self.dirty = false;
        Ok(())
    }
}

/// Append-only, crash-recoverable log of committed transactions.
///
/// Records are serialized with bincode and framed with a length prefix and
/// a CRC32 checksum. Recovery reads the file front-to-back: a torn tail
/// ends recovery, a record failing its checksum is skipped.
///
/// A failed append leaves nothing behind: the partial frame is cut off
/// before the error is returned, or before the next append if that fails.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    sync_mode: SyncMode,
}

impl WriteAheadLog {
    /// Open (or create) the log at `path`.
    pub fn open(path: &Path, sync_mode: SyncMode) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = open_for_append(path)?;
        let offset = file.metadata()?.len();
        Ok(Self::with_sink(path, Box::new(file), offset, sync_mode))
    }

    fn with_sink(path: &Path, sink: Box<dyn LogSink>, offset: u64, sync_mode: SyncMode) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter {
                sink,
                offset,
                dirty: false,
            }),
            sync_mode,
        }
    }

    /// Append a record. Returns the byte offset it was written at.
    pub fn append(&self, record: &CommitRecord) -> LedgerResult<u64> {
        let frame = encode_frame(record)?;

        let mut w = self.lock()?;
        if w.dirty {
            w.discard_tail()?;
        }
        let entry_offset = w.offset;

        if let Err(e) = w.write_frame(&frame, self.sync_mode) {
            w.dirty = true;
            match w.discard_tail() {
                Ok(()) => {
                    warn!(offset = entry_offset, error = %e, "WAL append failed; partial frame removed");
                }
                Err(te) => warn!(
                    offset = entry_offset,
                    error = %e,
                    truncate_error = %te,
                    "WAL append failed; partial frame kept until next append"
                ),
            }
            return Err(e.into());
        }
        w.offset += frame.len() as u64;

        debug!(offset = entry_offset, height = record.height, len = frame.len(), "WAL append");
        Ok(entry_offset)
    }

    /// Read back every intact record, in append order.
    pub fn recover(&self) -> LedgerResult<Vec<CommitRecord>> {
        let bytes = fs::read(&self.path)?;
        let mut records = Vec::new();
        let mut offset = 0usize;

        while offset < bytes.len() {
            match decode_frame(&bytes[offset..]) {
                Frame::Intact { payload, len } => {
                    match bincode::deserialize::<CommitRecord>(payload) {
                        Ok(record) => records.push(record),
                        Err(e) => warn!(offset, error = %e, "undecodable WAL record; skipping"),
                    }
                    offset += len;
                }
                Frame::Corrupt { expected, actual, len } => {
                    warn!(offset, expected, actual, "CRC mismatch; skipping record");
                    offset += len;
                }
                Frame::Torn => {
                    warn!(offset, remaining = bytes.len() - offset, "torn WAL tail; stopping recovery");
                    break;
                }
            }
        }

        debug!(recovered = records.len(), "WAL recovery complete");
        Ok(records)
    }

    /// Atomically replace the log contents with `records`.
    ///
    /// The new log is written beside the old one and renamed over it.
    pub fn rewrite(&self, records: &[CommitRecord]) -> LedgerResult<()> {
        let mut w = self.lock()?;

        let tmp_path = self.path.with_extension("wal.tmp");
        let mut contents = Vec::new();
        for record in records {
            contents.extend_from_slice(&encode_frame(record)?);
        }
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&contents)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        w.sink = Box::new(open_for_append(&self.path)?);
        w.offset = contents.len() as u64;
        w.dirty = false;

        debug!(records = records.len(), bytes = w.offset, "WAL rewritten");
        Ok(())
    }

    /// Current end-of-log offset.
    pub fn offset(&self) -> LedgerResult<u64> {
        Ok(self.lock()?.offset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, WalWriter>> {
        self.writer.lock().map_err(LedgerError::poisoned)
    }
}

fn open_for_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).read(true).append(true).open(path)
}

impl CommitJournal for WriteAheadLog {
    fn record(&self, record: &CommitRecord) -> LedgerResult<()> {
        self.append(record).map(|_| ())
    }
}

impl std::fmt::Debug for WriteAheadLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteAheadLog")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    fn make_record(height: u64) -> CommitRecord {
        let mut writes = WriteBatch::new();
        writes.put(&height.to_string(), format!("value-{height}").as_bytes());
        if height % 2 == 0 {
            writes.delete("gone");
        }
        CommitRecord {
            height,
            tx_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            writes,
        }
    }

    #[test]
    fn append_and_recover() {
        let dir = tempfile::tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join("ledger.wal"), SyncMode::OsDefault).unwrap();

        let records: Vec<CommitRecord> = (1..=3).map(make_record).collect();
        for record in &records {
            wal.append(record).unwrap();
        }

        assert_eq!(wal.recover().unwrap(), records);
    }

    #[test]
    fn recover_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join("empty.wal"), SyncMode::EveryWrite).unwrap();
        assert!(wal.recover().unwrap().is_empty());
        assert_eq!(wal.offset().unwrap(), 0);
    }

    #[test]
    fn reopen_appends_after_existing_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.wal");
        {
            let wal = WriteAheadLog::open(&path, SyncMode::OsDefault).unwrap();
            wal.append(&make_record(1)).unwrap();
        }
        let wal = WriteAheadLog::open(&path, SyncMode::OsDefault).unwrap();
        assert!(wal.offset().unwrap() > 0);
        wal.append(&make_record(2)).unwrap();

        let heights: Vec<u64> = wal.recover().unwrap().iter().map(|r| r.height).collect();
        assert_eq!(heights, vec![1, 2]);
    }

    #[test]
    fn crc_mismatch_skips_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.wal");
        let second = make_record(2);
        {
            let wal = WriteAheadLog::open(&path, SyncMode::OsDefault).unwrap();
            wal.append(&make_record(1)).unwrap();
            wal.append(&second).unwrap();
        }

        // Flip the first payload byte of the first record.
        {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            let mut buf = [0u8; 1];
            file.read_exact(&mut buf).unwrap();
            buf[0] ^= 0xFF;
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            file.write_all(&buf).unwrap();
            file.sync_all().unwrap();
        }

        let wal = WriteAheadLog::open(&path, SyncMode::OsDefault).unwrap();
        assert_eq!(wal.recover().unwrap(), vec![second]);
    }

    #[test]
    fn torn_tail_stops_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.wal");
        let first = make_record(1);
        {
            let wal = WriteAheadLog::open(&path, SyncMode::OsDefault).unwrap();
            wal.append(&first).unwrap();
            wal.append(&make_record(2)).unwrap();
        }

        let len = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 3).unwrap();

        let wal = WriteAheadLog::open(&path, SyncMode::OsDefault).unwrap();
        assert_eq!(wal.recover().unwrap(), vec![first]);
    }

    #[test]
    fn rewrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.wal");
        let wal = WriteAheadLog::open(&path, SyncMode::OsDefault).unwrap();
        for height in 1..=5 {
            wal.append(&make_record(height)).unwrap();
        }

        let compacted = make_record(5);
        wal.rewrite(std::slice::from_ref(&compacted)).unwrap();
        assert_eq!(wal.recover().unwrap(), vec![compacted.clone()]);

        // Appends continue after the rewritten contents.
        let next = make_record(6);
        wal.append(&next).unwrap();
        assert_eq!(wal.recover().unwrap(), vec![compacted, next]);
        assert!(!path.with_extension("wal.tmp").exists());
    }

    #[test]
    fn decode_frame_classifies_bytes() {
        let frame = encode_frame(&make_record(1)).unwrap();
        assert!(matches!(decode_frame(&frame), Frame::Intact { len, .. } if len == frame.len()));
        assert_eq!(decode_frame(&frame[..frame.len() - 1]), Frame::Torn);
        assert_eq!(decode_frame(&frame[..3]), Frame::Torn);
        assert_eq!(decode_frame(&[0u8; HEADER_SIZE]), Frame::Torn);

        let mut flipped = frame.clone();
        *flipped.last_mut().unwrap() ^= 0xFF;
        assert!(matches!(decode_frame(&flipped), Frame::Corrupt { len, .. } if len == frame.len()));
    }

    #[derive(Default)]
    struct Faults {
        write: AtomicBool,
        sync: AtomicBool,
        truncate: AtomicBool,
    }

    /// A real log file whose writes, syncs or truncations can be made to fail.
    struct FaultySink {
        file: File,
        faults: Arc<Faults>,
    }

    impl Write for FaultySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.faults.write.load(Ordering::SeqCst) {
                // Half the frame reaches the disk before the device gives up.
                self.file.write_all(&buf[..buf.len() / 2])?;
                return Err(io::Error::other("no space left on device"));
            }
            self.file.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    impl LogSink for FaultySink {
        fn sync(&mut self) -> io::Result<()> {
            if self.faults.sync.load(Ordering::SeqCst) {
                return Err(io::Error::other("fsync failed"));
            }
            self.file.sync_all()
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            if self.faults.truncate.load(Ordering::SeqCst) {
                return Err(io::Error::other("truncate failed"));
            }
            self.file.set_len(len)
        }
    }

    fn faulty_log(path: &Path) -> (WriteAheadLog, Arc<Faults>) {
        let faults = Arc::new(Faults::default());
        let sink = FaultySink {
            file: open_for_append(path).unwrap(),
            faults: Arc::clone(&faults),
        };
        let wal = WriteAheadLog::with_sink(path, Box::new(sink), 0, SyncMode::EveryWrite);
        (wal, faults)
    }

    #[test]
    fn failed_write_leaves_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.wal");
        let (wal, faults) = faulty_log(&path);
        let first = make_record(1);
        wal.append(&first).unwrap();
        let end = wal.offset().unwrap();

        faults.write.store(true, Ordering::SeqCst);
        assert!(wal.append(&make_record(2)).is_err());
        assert_eq!(fs::metadata(&path).unwrap().len(), end);
        assert_eq!(wal.offset().unwrap(), end);

        faults.write.store(false, Ordering::SeqCst);
        let retry = make_record(2);
        assert_eq!(wal.append(&retry).unwrap(), end);
        assert_eq!(wal.recover().unwrap(), vec![first, retry]);
    }

    #[test]
    fn failed_sync_leaves_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.wal");
        let (wal, faults) = faulty_log(&path);

        faults.sync.store(true, Ordering::SeqCst);
        assert!(wal.append(&make_record(1)).is_err());
        assert!(wal.recover().unwrap().is_empty());

        faults.sync.store(false, Ordering::SeqCst);
        let next = make_record(1);
        wal.append(&next).unwrap();
        assert_eq!(wal.recover().unwrap(), vec![next]);
    }

    #[test]
    fn partial_frame_is_cut_before_next_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.wal");
        let (wal, faults) = faulty_log(&path);

        faults.write.store(true, Ordering::SeqCst);
        faults.truncate.store(true, Ordering::SeqCst);
        assert!(wal.append(&make_record(1)).is_err());
        assert!(fs::metadata(&path).unwrap().len() > 0);

        faults.write.store(false, Ordering::SeqCst);
        faults.truncate.store(false, Ordering::SeqCst);
        let next = make_record(1);
        assert_eq!(wal.append(&next).unwrap(), 0);
        assert_eq!(wal.recover().unwrap(), vec![next]);
    }
}
