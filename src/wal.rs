use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Encode a single event to `[len][bincode][crc32]`. Returns the bytes written.
fn encode_event(writer: &mut impl Write, event: &Event) -> io::Result<u64> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "event too large for WAL"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(8 + u64::from(len))
}

/// Why reading stopped before the end of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    Clean,
    Truncated,
    BadChecksum,
    Undecodable,
}

enum Entry {
    /// An intact event and its encoded size.
    Event(Event, u64),
    End(Tail),
}

/// Read the next entry; `Ok(Entry::End(..))` at EOF or at the first damaged entry.
fn read_entry(reader: &mut impl Read) -> io::Result<Entry> {
    let mut len_buf = [0u8; 4];
    if let Some(tail) = read_or_tail(reader, &mut len_buf, Tail::Clean)? {
        return Ok(Entry::End(tail));
    }
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    if let Some(tail) = read_or_tail(reader, &mut payload, Tail::Truncated)? {
        return Ok(Entry::End(tail));
    }

    let mut crc_buf = [0u8; 4];
    if let Some(tail) = read_or_tail(reader, &mut crc_buf, Tail::Truncated)? {
        return Ok(Entry::End(tail));
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(Entry::End(Tail::BadChecksum));
    }

    match bincode::deserialize::<Event>(&payload) {
        Ok(event) => Ok(Entry::Event(event, 8 + len as u64)),
        Err(_) => Ok(Entry::End(Tail::Undecodable)),
    }
}

fn read_or_tail(reader: &mut impl Read, buf: &mut [u8], on_eof: Tail) -> io::Result<Option<Tail>> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(Some(on_eof)),
        Err(e) => Err(e),
    }
}

/// Append-only write-ahead log of reservation events.
///
/// Format per entry: `[u32 LE: len][bincode: Event][u32 LE: crc32 of payload]`.
/// A torn or corrupt tail (crash mid-write) ends replay and is cut off, so the
/// next append lands right after the last intact entry.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
    /// File length covered by the last successful `flush_sync`.
    committed_len: u64,
    /// Bytes and events buffered since then.
    pending_len: u64,
    pending_appends: u64,
}

impl Wal {
    /// Open (or create) the WAL file at `path` for appending.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = Self::open_append(path)?;
        let committed_len = file.metadata()?.len();
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
            committed_len,
            pending_len: 0,
            pending_appends: 0,
        })
    }

    fn open_append(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    /// Append and fsync one event.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer an event without syncing. Durable only after `flush_sync()`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        self.pending_len += encode_event(&mut self.writer, event)?;
        self.pending_appends += 1;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.committed_len += self.pending_len;
        self.pending_len = 0;
        self.pending_appends = 0;
        Ok(())
    }

    /// Drop everything written since the last successful `flush_sync`,
    /// including any half-written entry that already reached the file.
    pub fn rollback(&mut self) -> io::Result<()> {
        let fresh = BufWriter::new(Self::open_append(&self.path)?);
        // into_parts hands back the buffer instead of flushing it.
        let (_, _unflushed) = std::mem::replace(&mut self.writer, fresh).into_parts();
        let file = self.writer.get_ref();
        file.set_len(self.committed_len)?;
        file.sync_all()?;
        self.appends_since_compact = self.appends_since_compact.saturating_sub(self.pending_appends);
        self.pending_len = 0;
        self.pending_appends = 0;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    fn compact_tmp_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// Write a compacted history to the side file and fsync it.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(Self::compact_tmp_path(path))?);
        for event in events {
            encode_event(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the side file over the WAL and reopen it for appending.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        fs::rename(Self::compact_tmp_path(&self.path), &self.path)?;
        let file = Self::open_append(&self.path)?;
        self.committed_len = file.metadata()?.len();
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        self.pending_len = 0;
        self.pending_appends = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    /// Read every intact event from the WAL at `path`. A missing file is an empty log.
    ///
    /// A torn or corrupt tail is truncated away, otherwise later appends would
    /// sit behind it and be unreachable on the next replay. An entry whose
    /// checksum matches but does not decode is refused instead: that is a
    /// format mismatch, not a crash artifact.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut intact_len = 0u64;

        loop {
            match read_entry(&mut reader)? {
                Entry::Event(event, size) => {
                    events.push(event);
                    intact_len += size;
                }
                Entry::End(Tail::Clean) => break,
                Entry::End(Tail::Undecodable) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "WAL {}: entry {} has a valid checksum but cannot be decoded",
                            path.display(),
                            events.len()
                        ),
                    ));
                }
                Entry::End(tail) => {
                    tracing::warn!(
                        "WAL {}: truncating damaged tail after {} events at byte {intact_len} ({tail:?})",
                        path.display(),
                        events.len()
                    );
                    let file = OpenOptions::new().write(true).open(path)?;
                    file.set_len(intact_len)?;
                    file.sync_all()?;
                    break;
                }
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("innkeep_test_wal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn created(id: ReservationId) -> Event {
        let reservation = Reservation {
            id,
            customer_name: format!("Guest {id}"),
            email: String::new(),
            phone: String::new(),
            rooms: vec!["105".into()],
            check_in: parse_stamp("2025-03-01T16:00").unwrap(),
            check_out: parse_stamp("2025-03-03T11:00").unwrap(),
        };
        let tasks = vec![CleaningTask {
            task_id: id,
            room: "105".into(),
            cleaning_date: reservation.checkout_date(),
            reservation_id: id,
            completed: false,
        }];
        Event::ReservationCreated { reservation, tasks }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.wal");
        let events = vec![
            created(1),
            Event::TaskCompletionSet { task_id: 1, reservation_id: 1, completed: true },
            Event::ReservationDeleted { id: 1 },
        ];
        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append(e).unwrap();
            }
        }
        assert_eq!(Wal::replay(&path).unwrap(), events);
    }

    #[test]
    fn replay_nonexistent_file() {
        let path = tmp_path("nonexistent.wal");
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn replay_drops_torn_tail() {
        let path = tmp_path("torn_tail.wal");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&created(1)).unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[9u8, 0, 0, 0, 1, 2]).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![created(1)]);
    }

    #[test]
    fn bad_checksum_tail_is_truncated_before_new_appends() {
        let path = tmp_path("bad_crc.wal");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&created(1)).unwrap();
        }
        let intact = fs::metadata(&path).unwrap().len();
        {
            let payload = bincode::serialize(&created(2)).unwrap();
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEADBEEFu32.to_le_bytes()).unwrap();
        }

        assert_eq!(Wal::replay(&path).unwrap(), vec![created(1)]);
        assert_eq!(fs::metadata(&path).unwrap().len(), intact);

        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&created(3)).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![created(1), created(3)]);
    }

    #[test]
    fn torn_tail_appends_survive_second_restart() {
        let path = tmp_path("torn_twice.wal");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&created(1)).unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[7u8; 7]).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![created(1)]);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&created(2)).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![created(1), created(2)]);
    }

    #[test]
    fn undecodable_entry_is_an_error() {
        let path = tmp_path("undecodable.wal");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&created(1)).unwrap();
        }
        {
            let payload = [0xFFu8; 4];
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&crc32fast::hash(&payload).to_le_bytes()).unwrap();
        }
        let before = fs::metadata(&path).unwrap().len();
        let err = Wal::replay(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(fs::metadata(&path).unwrap().len(), before);
    }

    #[test]
    fn rollback_discards_uncommitted_bytes() {
        let path = tmp_path("rollback.wal");
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&created(1)).unwrap();

        // A batch whose bytes reached the file but was never committed,
        // ending in a half-written entry.
        wal.append_buffered(&created(2)).unwrap();
        wal.writer.write_all(&[9u8, 0, 0, 0, 1]).unwrap();
        wal.writer.flush().unwrap();
        wal.rollback().unwrap();
        assert_eq!(wal.appends_since_compact(), 1);

        wal.append(&created(3)).unwrap();
        assert_eq!(Wal::replay(&path).unwrap(), vec![created(1), created(3)]);
    }

    #[test]
    fn rollback_drops_buffered_bytes() {
        let path = tmp_path("rollback_buffered.wal");
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&created(1)).unwrap();
        wal.append_buffered(&created(2)).unwrap();
        wal.rollback().unwrap();
        drop(wal);
        assert_eq!(Wal::replay(&path).unwrap(), vec![created(1)]);
    }

    #[test]
    fn compact_shrinks_and_accepts_appends() {
        let path = tmp_path("compact.wal");
        let mut wal = Wal::open(&path).unwrap();
        for id in 1..=10 {
            wal.append(&created(id)).unwrap();
            wal.append(&Event::ReservationDeleted { id }).unwrap();
        }
        wal.append(&created(11)).unwrap();
        let before = fs::metadata(&path).unwrap().len();

        let head = Event::SequencesAdvanced { next_reservation_id: 12, next_task_id: 12 };
        wal.compact(&[head.clone(), created(11)]).unwrap();
        assert_eq!(wal.appends_since_compact(), 0);
        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before, "compacted WAL should be smaller: {after} < {before}");

        wal.append(&created(12)).unwrap();
        assert_eq!(Wal::replay(&path).unwrap(), vec![head, created(11), created(12)]);
    }

    #[test]
    fn buffered_appends_count_until_compaction() {
        let path = tmp_path("buffered.wal");
        let mut wal = Wal::open(&path).unwrap();
        for id in 1..=4 {
            wal.append_buffered(&created(id)).unwrap();
        }
        assert_eq!(wal.appends_since_compact(), 4);
        wal.flush_sync().unwrap();
        assert_eq!(Wal::replay(&path).unwrap().len(), 4);
    }
}
