//! Append-only event log.
//!
//! Entry layout: `[u32 len][payload][u32 crc32]`, little endian, where `len`
//! counts only the payload and the payload is an encoded [`Event`].
//!
//! A batch becomes durable as a whole or not at all: [`Wal::commit`] writes
//! and fsyncs the staged frames, and on any failure cuts the file back to its
//! last durable length. If even that fails the log is poisoned and refuses
//! further commits until a compaction rewrites it from memory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;
use tracing::{error, warn};

use crate::codec::{self, CodecError};
use crate::model::Event;

const FRAME_OVERHEAD: usize = 8;

#[derive(Debug, Error)]
enum FrameError {
    #[error("torn entry")]
    Torn,
    #[error("checksum mismatch")]
    Checksum,
    #[error("undecodable entry: {0}")]
    Decode(#[from] CodecError),
}

fn put_frame(buf: &mut BytesMut, event: &Event) {
    let payload = codec::encode_event(event);
    buf.reserve(payload.len() + FRAME_OVERHEAD);
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(&payload);
    buf.put_u32_le(crc32fast::hash(&payload));
}

/// Parse the frame at the front of `buf`, returning the event and its size on disk.
fn take_frame(mut buf: &[u8]) -> Result<(Event, usize), FrameError> {
    if buf.remaining() < FRAME_OVERHEAD {
        return Err(FrameError::Torn);
    }
    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len + 4 {
        return Err(FrameError::Torn);
    }
    let (payload, mut rest) = buf.split_at(len);
    if rest.get_u32_le() != crc32fast::hash(payload) {
        return Err(FrameError::Checksum);
    }
    Ok((codec::decode_event(payload)?, len + FRAME_OVERHEAD))
}

/// Events in the valid prefix of the log and that prefix's length in bytes.
fn scan(path: &Path) -> io::Result<(Vec<Event>, u64, u64)> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0, 0)),
        Err(e) => return Err(e),
    };
    let mut events = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        match take_frame(&data[offset..]) {
            Ok((event, size)) => {
                events.push(event);
                offset += size;
            }
            Err(e) => {
                warn!(
                    "WAL {}: {e} at byte {offset} after {} events, ignoring the rest",
                    path.display(),
                    events.len()
                );
                break;
            }
        }
    }
    Ok((events, offset as u64, data.len() as u64))
}

fn open_for_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

pub struct Wal {
    file: File,
    path: PathBuf,
    /// Bytes on disk that have been fsynced as part of a whole batch.
    durable_len: u64,
    staged: BytesMut,
    staged_events: u64,
    appends_since_compact: u64,
    poisoned: Option<String>,
    #[cfg(test)]
    injected_failure: Option<io::ErrorKind>,
}

impl Wal {
    /// Open (or create) the log and return the events it holds. Anything
    /// after the last valid entry is cut off so new entries stay reachable.
    pub fn open(path: &Path) -> io::Result<(Self, Vec<Event>)> {
        let (events, valid_len, file_len) = scan(path)?;
        let file = open_for_append(path)?;
        if valid_len < file_len {
            warn!(
                "WAL {}: discarding {} trailing bytes",
                path.display(),
                file_len - valid_len
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        Ok((Self::attach(file, path, valid_len), events))
    }

    fn attach(file: File, path: &Path, durable_len: u64) -> Self {
        Self {
            file,
            path: path.to_path_buf(),
            durable_len,
            staged: BytesMut::new(),
            staged_events: 0,
            appends_since_compact: 0,
            poisoned: None,
            #[cfg(test)]
            injected_failure: None,
        }
    }

    /// Read the valid prefix of the log without opening it for writing.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        scan(path).map(|(events, _, _)| events)
    }

    /// Queue an event for the next [`commit`](Self::commit). Nothing touches disk.
    pub fn stage(&mut self, event: &Event) {
        put_frame(&mut self.staged, event);
        self.staged_events += 1;
    }

    /// Write and fsync everything staged. On error the staged events are
    /// dropped and the file holds exactly what it held before the call.
    pub fn commit(&mut self) -> io::Result<()> {
        let events = std::mem::take(&mut self.staged_events);
        let frames = self.staged.split();
        if let Some(reason) = &self.poisoned {
            return Err(io::Error::other(format!("WAL is poisoned: {reason}")));
        }
        if frames.is_empty() {
            return Ok(());
        }
        match self.write_durably(&frames) {
            Ok(()) => {
                self.durable_len += frames.len() as u64;
                self.appends_since_compact += events;
                Ok(())
            }
            Err(e) => Err(self.roll_back(e)),
        }
    }

    fn write_durably(&mut self, frames: &[u8]) -> io::Result<()> {
        #[cfg(test)]
        {
            if let Some(kind) = self.injected_failure.take() {
                // Leave half a batch behind, as a full disk would
                self.file.write_all(&frames[..frames.len() / 2])?;
                return Err(io::Error::from(kind));
            }
        }
        self.file.write_all(frames)?;
        self.file.sync_data()
    }

    /// Cut the file back to `durable_len` after a failed write. Returns the
    /// error the batch's callers should see.
    fn roll_back(&mut self, cause: io::Error) -> io::Error {
        let restored = self
            .file
            .set_len(self.durable_len)
            .and_then(|()| self.file.sync_all());
        match restored {
            Ok(()) => {
                warn!(
                    "WAL {}: commit failed ({cause}), rolled back to {} bytes",
                    self.path.display(),
                    self.durable_len
                );
                cause
            }
            Err(e) => {
                let reason = format!("commit failed ({cause}) and rollback failed ({e})");
                error!("WAL {}: {reason}", self.path.display());
                self.poisoned = Some(reason.clone());
                io::Error::other(reason)
            }
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Replace the log with `events` through a temp file and rename.
    /// Clears a poisoned state: the new file is built from memory alone.
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        let mut frames = BytesMut::new();
        for event in events {
            put_frame(&mut frames, event);
        }
        let tmp_path = self.path.with_extension("wal.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&frames)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        self.file = open_for_append(&self.path)?;
        self.durable_len = frames.len() as u64;
        self.appends_since_compact = 0;
        if let Some(reason) = self.poisoned.take() {
            warn!("WAL {}: rewritten after earlier failure: {reason}", self.path.display());
        }
        Ok(())
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make the next commit write half its batch and then fail with `kind`.
    #[cfg(test)]
    pub(crate) fn fail_next_write(&mut self, kind: io::ErrorKind) {
        self.injected_failure = Some(kind);
    }
}
