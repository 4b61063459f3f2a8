//! Open handles.
//!
//! A [`File`] is the per-open state machine: a capability set granted at
//! open time, a byte cursor, and the unread marker for the most recent
//! single-unit read. Handles over a mutable node go through that node's
//! lock on every operation (shared for bulk reads, exclusive for writes);
//! handles over a sealed node access it lock-free. Directory handles share
//! the type and expose [`File::read_dir`]; byte operations on them fail
//! with `InvalidArgument`.

use std::io::{self, SeekFrom};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{FsError, PathError, Result};
use crate::mode::{OpMode, OpenFlags};
use crate::node::{DirEntry, Dnode, DnodeRw, Inode, InodeRw, Metadata, NodeRef};

/// Reallocation threshold: content shorter than this doubles, longer
/// content grows by a quarter.
const SMALL_BUFFER: usize = 512;

/// Access to a file payload, lock-free for sealed nodes.
#[derive(Debug)]
enum Payload {
    Plain(Arc<Inode>),
    Locked(Arc<InodeRw>),
}

impl Payload {
    fn with_read<T>(&self, f: impl FnOnce(&Inode) -> T) -> T {
        match self {
            Payload::Plain(inode) => f(inode),
            Payload::Locked(inode) => f(&inode.payload().read()),
        }
    }

    fn with_write<T>(&self, f: impl FnOnce(&mut Inode) -> T) -> Result<T, FsError> {
        match self {
            // sealed handles never carry the write capability
            Payload::Plain(_) => Err(FsError::InvalidArgument),
            Payload::Locked(inode) => Ok(f(&mut inode.payload().write())),
        }
    }
}

/// Access to a directory payload.
#[derive(Debug)]
enum DirPayload {
    Plain(Arc<Dnode>),
    Locked(Arc<DnodeRw>),
}

impl DirPayload {
    fn entries(&self) -> Result<Vec<DirEntry>, FsError> {
        match self {
            DirPayload::Plain(dnode) => dnode.entries(),
            DirPayload::Locked(dnode) => dnode.entries(),
        }
    }
}

#[derive(Debug)]
enum Kind {
    File(Payload),
    Dir { payload: DirPayload, pos: usize },
}

/// An open handle to a file or directory.
///
/// The capability set is fixed at open time; an empty set marks a closed
/// handle. The cursor may sit past the end of the data (a later write
/// zero-fills the gap). `last_read` remembers the byte width of the most
/// recent single-unit read and gates the unread operations.
#[derive(Debug)]
pub struct File {
    name: String,
    kind: Kind,
    op_mode: OpMode,
    pos: u64,
    last_read: u8,
}

impl File {
    pub(crate) fn plain(name: &str, inode: Arc<Inode>, op_mode: OpMode) -> Self {
        Self {
            name: name.to_string(),
            kind: Kind::File(Payload::Plain(inode)),
            op_mode,
            pos: 0,
            last_read: 0,
        }
    }

    pub(crate) fn locked(name: &str, inode: Arc<InodeRw>, op_mode: OpMode) -> Self {
        Self {
            name: name.to_string(),
            kind: Kind::File(Payload::Locked(inode)),
            op_mode,
            pos: 0,
            last_read: 0,
        }
    }

    pub(crate) fn dir_plain(name: &str, dnode: Arc<Dnode>) -> Self {
        Self {
            name: name.to_string(),
            kind: Kind::Dir {
                payload: DirPayload::Plain(dnode),
                pos: 0,
            },
            op_mode: OpMode::READ | OpMode::SEEK,
            pos: 0,
            last_read: 0,
        }
    }

    pub(crate) fn dir_locked(name: &str, dnode: Arc<DnodeRw>) -> Self {
        Self {
            name: name.to_string(),
            kind: Kind::Dir {
                payload: DirPayload::Locked(dnode),
                pos: 0,
            },
            op_mode: OpMode::READ | OpMode::SEEK,
            pos: 0,
            last_read: 0,
        }
    }

    /// The terminal name this handle was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this handle refers to a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, Kind::Dir { .. })
    }

    /// Stat information for the underlying node.
    pub fn metadata(&self) -> Metadata {
        let node: NodeRef = match &self.kind {
            Kind::File(Payload::Plain(inode)) => NodeRef::File(Arc::clone(inode)),
            Kind::File(Payload::Locked(inode)) => NodeRef::FileRw(Arc::clone(inode)),
            Kind::Dir {
                payload: DirPayload::Plain(dnode),
                ..
            } => NodeRef::Dir(Arc::clone(dnode)),
            Kind::Dir {
                payload: DirPayload::Locked(dnode),
                ..
            } => NodeRef::DirRw(Arc::clone(dnode)),
        };
        Metadata::from_node(&self.name, &node)
    }

    fn err(&self, op: &'static str, source: FsError) -> PathError {
        PathError::new(op, self.name.as_str(), source)
    }

    /// Closed-handle and capability preconditions shared by every
    /// operation.
    fn check(&self, op: &'static str, required: OpMode) -> Result<()> {
        if self.op_mode.is_closed() {
            return Err(self.err(op, FsError::Closed));
        }
        if !self.op_mode.contains(required) {
            return Err(self.err(op, FsError::InvalidArgument));
        }
        Ok(())
    }

    fn file_payload(&self, op: &'static str) -> Result<&Payload> {
        match &self.kind {
            Kind::File(payload) => Ok(payload),
            Kind::Dir { .. } => Err(PathError::new(op, self.name.as_str(), FsError::InvalidArgument)),
        }
    }

    /// Read from the cursor, advancing it. Fails `Eof` with the cursor at
    /// or past the end of the data.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check("read", OpMode::READ)?;
        let pos: usize = self.pos as usize;
        let payload: &Payload = self.file_payload("read")?;
        let n: usize = payload
            .with_read(|inode| {
                if pos >= inode.data.len() {
                    return Err(FsError::Eof);
                }
                let n: usize = buf.len().min(inode.data.len() - pos);
                buf[..n].copy_from_slice(&inode.data[pos..pos + n]);
                Ok(n)
            })
            .map_err(|err| PathError::new("read", self.name.as_str(), err))?;
        self.pos += n as u64;
        self.last_read = 0;
        Ok(n)
    }

    /// Read at an absolute offset without touching the cursor. An offset at
    /// or past the end fails `Eof`; a read reaching the tail returns the
    /// short count.
    pub fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.check("readat", OpMode::READ | OpMode::SEEK)?;
        let payload: &Payload = self.file_payload("readat")?;
        payload
            .with_read(|inode| {
                let offset: usize = offset as usize;
                if offset >= inode.data.len() {
                    return Err(FsError::Eof);
                }
                let n: usize = buf.len().min(inode.data.len() - offset);
                buf[..n].copy_from_slice(&inode.data[offset..offset + n]);
                Ok(n)
            })
            .map_err(|err| PathError::new("readat", self.name.as_str(), err))
    }

    /// Read one byte, advancing the cursor and arming the unread marker.
    pub fn read_byte(&mut self) -> Result<u8> {
        self.check("readbyte", OpMode::READ)?;
        let pos: usize = self.pos as usize;
        let payload: &Payload = self.file_payload("readbyte")?;
        let byte: u8 = payload
            .with_read(|inode| inode.data.get(pos).copied().ok_or(FsError::Eof))
            .map_err(|err| PathError::new("readbyte", self.name.as_str(), err))?;
        self.pos += 1;
        self.last_read = 1;
        Ok(byte)
    }

    /// Rewind the most recent [`read_byte`](File::read_byte). Fails
    /// `InvalidArgument` when the last operation was not a single-byte
    /// read.
    pub fn unread_byte(&mut self) -> Result<()> {
        self.check("unreadbyte", OpMode::READ | OpMode::SEEK)?;
        self.file_payload("unreadbyte")?;
        if self.last_read != 1 {
            return Err(self.err("unreadbyte", FsError::InvalidArgument));
        }
        self.pos -= 1;
        self.last_read = 0;
        Ok(())
    }

    /// Read one UTF-8 character, advancing the cursor by its width and
    /// arming the unread marker. Invalid bytes decode as U+FFFD with
    /// width 1.
    pub fn read_char(&mut self) -> Result<(char, usize)> {
        self.check("readchar", OpMode::READ)?;
        let pos: usize = self.pos as usize;
        let payload: &Payload = self.file_payload("readchar")?;
        let (ch, width): (char, usize) = payload
            .with_read(|inode| {
                if pos >= inode.data.len() {
                    return Err(FsError::Eof);
                }
                Ok(decode_char(&inode.data[pos..]))
            })
            .map_err(|err| PathError::new("readchar", self.name.as_str(), err))?;
        self.pos += width as u64;
        self.last_read = width as u8;
        Ok((ch, width))
    }

    /// Rewind the most recent [`read_char`](File::read_char). Fails
    /// `InvalidArgument` when the last operation was not a read.
    pub fn unread_char(&mut self) -> Result<()> {
        self.check("unreadchar", OpMode::READ | OpMode::SEEK)?;
        self.file_payload("unreadchar")?;
        if self.last_read == 0 {
            return Err(self.err("unreadchar", FsError::InvalidArgument));
        }
        self.pos -= u64::from(self.last_read);
        self.last_read = 0;
        Ok(())
    }

    /// Drain everything from the cursor into `writer`, advancing the
    /// cursor by the amount written. Writer errors propagate.
    pub fn write_to<W: io::Write + ?Sized>(&mut self, writer: &mut W) -> Result<u64> {
        self.check("writeto", OpMode::READ)?;
        let pos: usize = self.pos as usize;
        let payload: &Payload = self.file_payload("writeto")?;
        let written: Result<usize, FsError> = payload.with_read(|inode| {
            if pos >= inode.data.len() {
                return Err(FsError::Eof);
            }
            writer.write(&inode.data[pos..]).map_err(FsError::from)
        });
        match written {
            Ok(n) => {
                self.pos += n as u64;
                self.last_read = 0;
                Ok(n as u64)
            }
            Err(FsError::Eof) => Err(self.err("writeto", FsError::Eof)),
            Err(err) => {
                self.last_read = 0;
                Err(self.err("writeto", err))
            }
        }
    }

    /// Move the cursor. Seeking past the end is allowed (a later write
    /// zero-fills the gap); a target below zero clamps the cursor to zero
    /// and fails `InvalidArgument`.
    pub fn seek(&mut self, from: SeekFrom) -> Result<u64> {
        self.check("seek", OpMode::SEEK)?;
        let payload: &Payload = self.file_payload("seek")?;
        let target: i64 = match from {
            SeekFrom::Start(offset) => offset.min(i64::MAX as u64) as i64,
            SeekFrom::Current(delta) => (self.pos as i64).saturating_add(delta),
            SeekFrom::End(delta) => {
                payload.with_read(|inode| inode.data.len() as i64).saturating_add(delta)
            }
        };
        self.last_read = 0;
        if target < 0 {
            self.pos = 0;
            return Err(self.err("seek", FsError::InvalidArgument));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    fn write_bytes(&mut self, op: &'static str, buf: &[u8]) -> Result<usize> {
        self.check(op, OpMode::WRITE)?;
        let pos: usize = self.pos as usize;
        let payload: &Payload = self.file_payload(op)?;
        payload
            .with_write(|inode| {
                grow(&mut inode.data, pos + buf.len());
                inode.data[pos..pos + buf.len()].copy_from_slice(buf);
                inode.modtime = SystemTime::now();
            })
            .map_err(|err| PathError::new(op, self.name.as_str(), err))?;
        self.pos += buf.len() as u64;
        self.last_read = 0;
        Ok(buf.len())
    }

    /// Write at the cursor, growing the data as needed, advancing the
    /// cursor and refreshing the modification time.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.write_bytes("write", buf)
    }

    /// [`write`](File::write) for a string slice.
    pub fn write_str(&mut self, s: &str) -> Result<usize> {
        self.write_bytes("writestr", s.as_bytes())
    }

    /// [`write`](File::write) for a single byte.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_bytes("writebyte", &[byte]).map(|_| ())
    }

    /// [`write`](File::write) for one UTF-8 encoded character.
    pub fn write_char(&mut self, ch: char) -> Result<usize> {
        let mut encoded: [u8; 4] = [0; 4];
        let s: &str = ch.encode_utf8(&mut encoded);
        self.write_bytes("writechar", s.as_bytes())
    }

    /// Write at an absolute offset without touching the cursor.
    pub fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        self.check("writeat", OpMode::WRITE | OpMode::SEEK)?;
        let payload: &Payload = self.file_payload("writeat")?;
        payload
            .with_write(|inode| {
                let offset: usize = offset as usize;
                grow(&mut inode.data, offset + buf.len());
                inode.data[offset..offset + buf.len()].copy_from_slice(buf);
                inode.modtime = SystemTime::now();
            })
            .map_err(|err| PathError::new("writeat", self.name.as_str(), err))?;
        Ok(buf.len())
    }

    /// Drain `reader` into the file from the cursor until it is exhausted,
    /// extending the length to the final cursor position. Reader errors
    /// propagate.
    pub fn read_from<R: io::Read + ?Sized>(&mut self, reader: &mut R) -> Result<u64> {
        self.check("readfrom", OpMode::WRITE)?;
        let mut count: u64 = 0;
        loop {
            let pos: usize = self.pos as usize;
            let payload: &Payload = self.file_payload("readfrom")?;
            let n: usize = payload
                .with_write(|inode| {
                    grow(&mut inode.data, pos + 1);
                    let capacity: usize = inode.data.capacity();
                    inode.data.resize(capacity, 0);
                    match reader.read(&mut inode.data[pos..]) {
                        Ok(n) => {
                            inode.data.truncate(pos + n);
                            Ok(n)
                        }
                        Err(err) => {
                            inode.data.truncate(pos);
                            Err(FsError::from(err))
                        }
                    }
                })
                .and_then(|read| read)
                .map_err(|err| PathError::new("readfrom", self.name.as_str(), err))?;
            if n == 0 {
                return Ok(count);
            }
            count += n as u64;
            self.pos += n as u64;
        }
    }

    /// Close the handle, clearing its capability set and cursor. A second
    /// close fails `Closed`. Closing a directory handle is always a no-op.
    pub fn close(&mut self) -> Result<()> {
        if matches!(self.kind, Kind::Dir { .. }) {
            return Ok(());
        }
        if self.op_mode.is_closed() {
            return Err(self.err("close", FsError::Closed));
        }
        self.op_mode = OpMode::CLOSED;
        self.pos = 0;
        self.last_read = 0;
        Ok(())
    }

    /// Read directory entries from the directory cursor.
    ///
    /// With `n <= 0` every remaining entry is returned and the cursor stays
    /// in place; with `n > 0` up to `n` entries are returned, the cursor
    /// advances, and the end of the listing fails `Eof`.
    pub fn read_dir(&mut self, n: isize) -> Result<Vec<DirEntry>> {
        match &mut self.kind {
            Kind::File(_) => Err(PathError::new(
                "readdir",
                self.name.as_str(),
                FsError::InvalidArgument,
            )),
            Kind::Dir { payload, pos } => {
                let entries: Vec<DirEntry> = payload
                    .entries()
                    .map_err(|err| PathError::new("readdir", self.name.as_str(), err))?;
                let start: usize = (*pos).min(entries.len());
                if n <= 0 {
                    return Ok(entries[start..].to_vec());
                }
                let take: usize = (n as usize).min(entries.len() - start);
                if take == 0 {
                    return Err(PathError::new(
                        "readdir",
                        self.name.as_str(),
                        FsError::Eof,
                    ));
                }
                *pos = start + take;
                Ok(entries[start..start + take].to_vec())
            }
        }
    }

    /// Post-open adjustments for `TRUNCATE` and `APPEND`.
    pub(crate) fn apply_open_flags(&mut self, flags: OpenFlags) -> Result<(), FsError> {
        if flags.contains(OpenFlags::TRUNCATE) {
            match &self.kind {
                Kind::File(payload) => payload.with_write(|inode| {
                    inode.data.clear();
                    inode.modtime = SystemTime::now();
                })?,
                Kind::Dir { .. } => return Err(FsError::InvalidArgument),
            }
        }
        if flags.contains(OpenFlags::APPEND) {
            if let Kind::File(payload) = &self.kind {
                self.pos = payload.with_read(|inode| inode.data.len() as u64);
            }
        }
        Ok(())
    }
}

impl io::Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match File::read(self, buf) {
            Ok(n) => Ok(n),
            Err(err) if matches!(err.source, FsError::Eof) => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
}

impl io::Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        File::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for File {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        File::seek(self, pos).map_err(io::Error::from)
    }
}

/// Grow `data` so that `size` bytes are addressable.
///
/// Spare capacity is used in place (zero-filling the gap, so sparse ranges
/// read as zeroes). A reallocation reserves `2 * size` while the current
/// content is shorter than [`SMALL_BUFFER`] and `size + size / 4` beyond
/// that.
fn grow(data: &mut Vec<u8>, size: usize) {
    if size <= data.len() {
        return;
    }
    if size <= data.capacity() {
        data.resize(size, 0);
        return;
    }
    let capacity: usize = if data.len() < SMALL_BUFFER {
        size * 2
    } else {
        size + size / 4
    };
    let mut grown: Vec<u8> = Vec::with_capacity(capacity);
    grown.extend_from_slice(data);
    grown.resize(size, 0);
    *data = grown;
}

/// Decode one UTF-8 character from the front of `bytes`; invalid sequences
/// decode as U+FFFD with width 1.
fn decode_char(bytes: &[u8]) -> (char, usize) {
    let first: u8 = match bytes.first() {
        Some(byte) => *byte,
        None => return (char::REPLACEMENT_CHARACTER, 1),
    };
    if first < 0x80 {
        return (first as char, 1);
    }
    let width: usize = match first {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => return (char::REPLACEMENT_CHARACTER, 1),
    };
    if bytes.len() < width {
        return (char::REPLACEMENT_CHARACTER, 1);
    }
    match std::str::from_utf8(&bytes[..width]) {
        Ok(s) => match s.chars().next() {
            Some(ch) => (ch, width),
            None => (char::REPLACEMENT_CHARACTER, 1),
        },
        Err(_) => (char::REPLACEMENT_CHARACTER, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::FileMode;

    fn open(data: &[u8], op_mode: OpMode) -> File {
        let inode = Arc::new(InodeRw::new(FileMode::new(0o666), data.to_vec()));
        File::locked("test", inode, op_mode)
    }

    fn rw(data: &[u8]) -> File {
        open(data, OpMode::READ | OpMode::WRITE | OpMode::SEEK)
    }

    // ========================================================================
    // Lifecycle and capabilities
    // ========================================================================

    #[test]
    fn test_closed_handle() {
        let mut f: File = rw(b"data");
        f.close().unwrap();

        let mut buf: [u8; 4] = [0; 4];
        let err: PathError = f.read(&mut buf).unwrap_err();
        assert_eq!(err.op, "read");
        assert!(matches!(err.source, FsError::Closed));
        assert!(matches!(f.write(b"x").unwrap_err().source, FsError::Closed));
        assert!(matches!(f.seek(SeekFrom::Start(0)).unwrap_err().source, FsError::Closed));

        let err: PathError = f.close().unwrap_err();
        assert_eq!(err.op, "close");
        assert!(matches!(err.source, FsError::Closed));
    }

    #[test]
    fn test_missing_capability() {
        let mut f: File = open(b"data", OpMode::SEEK);
        let mut buf: [u8; 4] = [0; 4];
        assert!(matches!(f.read(&mut buf).unwrap_err().source, FsError::InvalidArgument));

        let mut f: File = open(b"data", OpMode::READ);
        // readat needs the seek capability too
        assert!(matches!(
            f.read_at(&mut buf, 0).unwrap_err().source,
            FsError::InvalidArgument
        ));
        assert!(matches!(f.write(b"x").unwrap_err().source, FsError::InvalidArgument));
    }

    // ========================================================================
    // Reads
    // ========================================================================

    #[test]
    fn test_read_to_end_then_eof() {
        let mut f: File = rw(b"Hello, World");
        let mut buf: [u8; 5] = [0; 5];

        assert_eq!(f.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"Hello");
        assert_eq!(f.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b", Wor");
        assert_eq!(f.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ld");

        let err: PathError = f.read(&mut buf).unwrap_err();
        assert!(matches!(err.source, FsError::Eof));
    }

    #[test]
    fn test_io_read_maps_eof_to_zero() {
        let mut f: File = rw(b"abc");
        let mut out: Vec<u8> = Vec::new();
        io::Read::read_to_end(&mut f, &mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_read_at_does_not_move_cursor() {
        let mut f: File = rw(b"Hello, World");
        let mut buf: [u8; 5] = [0; 5];

        assert_eq!(f.read_at(&mut buf, 7).unwrap(), 5);
        assert_eq!(&buf, b"World");

        // cursor still at the start
        assert_eq!(f.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"Hello");

        // short read at the tail
        let mut big: [u8; 32] = [0; 32];
        assert_eq!(f.read_at(&mut big, 10).unwrap(), 2);
        assert!(matches!(f.read_at(&mut big, 12).unwrap_err().source, FsError::Eof));
    }

    #[test]
    fn test_read_byte_unread_byte() {
        let mut f: File = rw(b"ab");

        assert_eq!(f.read_byte().unwrap(), b'a');
        f.unread_byte().unwrap();
        assert_eq!(f.read_byte().unwrap(), b'a');
        assert_eq!(f.read_byte().unwrap(), b'b');

        f.unread_byte().unwrap();
        let err: PathError = f.unread_byte().unwrap_err();
        assert_eq!(err.op, "unreadbyte");
        assert!(matches!(err.source, FsError::InvalidArgument));
    }

    #[test]
    fn test_unread_byte_after_other_operation() {
        let mut f: File = rw(b"abc");
        f.read_byte().unwrap();
        f.seek(SeekFrom::Start(1)).unwrap();
        assert!(matches!(f.unread_byte().unwrap_err().source, FsError::InvalidArgument));
    }

    #[test]
    fn test_read_char_multibyte() {
        let mut f: File = rw("héllo".as_bytes());

        assert_eq!(f.read_char().unwrap(), ('h', 1));
        assert_eq!(f.read_char().unwrap(), ('é', 2));
        f.unread_char().unwrap();
        assert_eq!(f.read_char().unwrap(), ('é', 2));
        assert!(matches!(f.unread_char(), Ok(())));
        assert!(matches!(f.unread_char().unwrap_err().source, FsError::InvalidArgument));
    }

    #[test]
    fn test_read_char_invalid_utf8() {
        let mut f: File = rw(&[0xFF, b'a']);
        assert_eq!(f.read_char().unwrap(), (char::REPLACEMENT_CHARACTER, 1));
        assert_eq!(f.read_char().unwrap(), ('a', 1));
    }

    #[test]
    fn test_write_to_drains_from_cursor() {
        let mut f: File = rw(b"Hello, World");
        f.seek(SeekFrom::Start(7)).unwrap();

        let mut out: Vec<u8> = Vec::new();
        assert_eq!(f.write_to(&mut out).unwrap(), 5);
        assert_eq!(out, b"World");
        assert!(matches!(f.write_to(&mut out).unwrap_err().source, FsError::Eof));
    }

    // ========================================================================
    // Seeks
    // ========================================================================

    #[test]
    fn test_seek_whences() {
        let mut f: File = rw(b"0123456789");
        assert_eq!(f.seek(SeekFrom::Start(4)).unwrap(), 4);
        assert_eq!(f.seek(SeekFrom::Current(3)).unwrap(), 7);
        assert_eq!(f.seek(SeekFrom::End(-2)).unwrap(), 8);
        // seeking past the end is allowed
        assert_eq!(f.seek(SeekFrom::End(10)).unwrap(), 20);
    }

    #[test]
    fn test_seek_below_zero_clamps() {
        let mut f: File = rw(b"0123456789");
        f.seek(SeekFrom::Start(5)).unwrap();

        let err: PathError = f.seek(SeekFrom::Current(-9)).unwrap_err();
        assert_eq!(err.op, "seek");
        assert!(matches!(err.source, FsError::InvalidArgument));
        // cursor clamped to zero
        assert_eq!(f.read_byte().unwrap(), b'0');
    }

    #[test]
    fn test_seek_clears_unread_marker() {
        let mut f: File = rw(b"ab");
        f.read_byte().unwrap();
        f.seek(SeekFrom::Current(0)).unwrap();
        assert!(matches!(f.unread_byte().unwrap_err().source, FsError::InvalidArgument));
    }

    // ========================================================================
    // Writes
    // ========================================================================

    #[test]
    fn test_write_then_read_back() {
        let mut f: File = rw(b"");
        assert_eq!(f.write(b"Hello").unwrap(), 5);
        assert_eq!(f.write_str(", World").unwrap(), 7);

        f.seek(SeekFrom::Start(0)).unwrap();
        let mut out: Vec<u8> = Vec::new();
        io::Read::read_to_end(&mut f, &mut out).unwrap();
        assert_eq!(out, b"Hello, World");
    }

    #[test]
    fn test_write_overwrites_middle() {
        let mut f: File = rw(b"Hello, World");
        f.seek(SeekFrom::Start(7)).unwrap();
        f.write(b"Rust!").unwrap();

        f.seek(SeekFrom::Start(0)).unwrap();
        let mut out: Vec<u8> = Vec::new();
        io::Read::read_to_end(&mut f, &mut out).unwrap();
        assert_eq!(out, b"Hello, Rust!");
    }

    #[test]
    fn test_sparse_write_reads_zeroes() {
        let mut f: File = rw(b"ab");
        f.seek(SeekFrom::Start(6)).unwrap();
        f.write(b"cd").unwrap();

        f.seek(SeekFrom::Start(0)).unwrap();
        let mut out: Vec<u8> = Vec::new();
        io::Read::read_to_end(&mut f, &mut out).unwrap();
        assert_eq!(out, b"ab\0\0\0\0cd");
    }

    #[test]
    fn test_write_at_keeps_cursor() {
        let mut f: File = rw(b"Hello, World");
        assert_eq!(f.write_at(b"Moon!", 7).unwrap(), 5);
        assert_eq!(f.read_byte().unwrap(), b'H');

        let mut out: [u8; 5] = [0; 5];
        f.read_at(&mut out, 7).unwrap();
        assert_eq!(&out, b"Moon!");
    }

    #[test]
    fn test_write_byte_and_char() {
        let mut f: File = rw(b"");
        f.write_byte(b'x').unwrap();
        assert_eq!(f.write_char('é').unwrap(), 2);

        f.seek(SeekFrom::Start(0)).unwrap();
        let mut out: Vec<u8> = Vec::new();
        io::Read::read_to_end(&mut f, &mut out).unwrap();
        assert_eq!(out, "xé".as_bytes());
    }

    #[test]
    fn test_growth_across_small_buffer_threshold() {
        let mut f: File = rw(b"");
        let chunk: Vec<u8> = vec![7u8; 100];
        for _ in 0..8 {
            f.write(&chunk).unwrap();
        }

        f.seek(SeekFrom::Start(0)).unwrap();
        let mut out: Vec<u8> = Vec::new();
        io::Read::read_to_end(&mut f, &mut out).unwrap();
        assert_eq!(out.len(), 800);
        assert!(out.iter().all(|b| *b == 7));
    }

    #[test]
    fn test_grow_policy() {
        let mut data: Vec<u8> = Vec::new();
        grow(&mut data, 10);
        assert_eq!(data.len(), 10);
        assert_eq!(data.capacity(), 20);

        // within capacity: reslice without reallocating
        grow(&mut data, 15);
        assert_eq!(data.len(), 15);
        assert_eq!(data.capacity(), 20);

        // long content grows by a quarter
        let mut data: Vec<u8> = vec![1; 600];
        data.shrink_to_fit();
        grow(&mut data, 1000);
        assert_eq!(data.len(), 1000);
        assert_eq!(data.capacity(), 1250);
        assert_eq!(data[599], 1);
        assert_eq!(data[600], 0);
    }

    #[test]
    fn test_read_from_cursor() {
        let mut f: File = rw(b"");
        let mut source = io::Cursor::new(b"streamed data".to_vec());
        assert_eq!(f.read_from(&mut source).unwrap(), 13);

        f.seek(SeekFrom::Start(0)).unwrap();
        let mut out: Vec<u8> = Vec::new();
        io::Read::read_to_end(&mut f, &mut out).unwrap();
        assert_eq!(out, b"streamed data");
    }

    #[test]
    fn test_read_from_truncates_tail() {
        let mut f: File = rw(b"a much longer original payload");
        let mut source = io::Cursor::new(b"short".to_vec());
        f.read_from(&mut source).unwrap();

        f.seek(SeekFrom::Start(0)).unwrap();
        let mut out: Vec<u8> = Vec::new();
        io::Read::read_to_end(&mut f, &mut out).unwrap();
        assert_eq!(out, b"short");
    }

    #[test]
    fn test_read_from_requires_write() {
        let mut f: File = open(b"", OpMode::READ | OpMode::SEEK);
        let mut source = io::Cursor::new(b"data".to_vec());
        assert!(matches!(
            f.read_from(&mut source).unwrap_err().source,
            FsError::InvalidArgument
        ));
    }

    // ========================================================================
    // Directory handles
    // ========================================================================

    fn open_dir(entry_names: &[&str]) -> File {
        let dnode = Arc::new(DnodeRw::new(FileMode::PERM));
        for name in entry_names {
            dnode
                .set_entry(DirEntry::new(
                    *name,
                    NodeRef::FileRw(Arc::new(InodeRw::new(FileMode::new(0o644), Vec::new()))),
                ))
                .unwrap();
        }
        File::dir_locked("dir", dnode)
    }

    #[test]
    fn test_byte_ops_on_directory_fail_invalid() {
        let mut d: File = open_dir(&["a"]);
        let mut buf: [u8; 4] = [0; 4];

        let err: PathError = d.read(&mut buf).unwrap_err();
        assert_eq!(err.op, "read");
        assert!(matches!(err.source, FsError::InvalidArgument));

        let err: PathError = d.write_at(b"x", 0).unwrap_err();
        assert_eq!(err.op, "writeat");
        assert!(matches!(err.source, FsError::InvalidArgument));

        assert!(matches!(d.seek(SeekFrom::Start(0)).unwrap_err().source, FsError::InvalidArgument));
    }

    #[test]
    fn test_read_dir_advances_cursor() {
        let mut d: File = open_dir(&["a", "b", "c"]);

        let first: Vec<DirEntry> = d.read_dir(2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].name(), "a");
        assert_eq!(first[1].name(), "b");

        let second: Vec<DirEntry> = d.read_dir(2).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name(), "c");

        let err: PathError = d.read_dir(1).unwrap_err();
        assert!(matches!(err.source, FsError::Eof));
    }

    #[test]
    fn test_read_dir_bulk_does_not_advance() {
        let mut d: File = open_dir(&["a", "b"]);

        assert_eq!(d.read_dir(0).unwrap().len(), 2);
        assert_eq!(d.read_dir(-1).unwrap().len(), 2);

        // cursor still at the start for counted reads
        assert_eq!(d.read_dir(1).unwrap()[0].name(), "a");
        // bulk read returns the remainder, cursor untouched
        assert_eq!(d.read_dir(0).unwrap()[0].name(), "b");
        assert_eq!(d.read_dir(1).unwrap()[0].name(), "b");
    }

    #[test]
    fn test_read_dir_on_file_fails_invalid() {
        let mut f: File = rw(b"data");
        let err: PathError = f.read_dir(1).unwrap_err();
        assert_eq!(err.op, "readdir");
        assert!(matches!(err.source, FsError::InvalidArgument));
    }

    #[test]
    fn test_dir_close_is_idempotent() {
        let mut d: File = open_dir(&[]);
        d.close().unwrap();
        d.close().unwrap();
    }

    #[test]
    fn test_metadata() {
        let f: File = rw(b"abcd");
        let meta: Metadata = f.metadata();
        assert_eq!(meta.name(), "test");
        assert_eq!(meta.len(), 4);
        assert!(!meta.is_dir());
    }
}
