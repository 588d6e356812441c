//! Length-prefixed framing over a raw byte stream.
//!
//! Every unit on the wire carries an explicit length: strings a big-endian
//! u32 followed by UTF-8 bytes, file payloads a big-endian u64 followed by
//! exactly that many raw bytes. Nothing is newline-delimited, so message
//! text and file content may contain any byte without corrupting framing.

use std::io::{self, Read, Write};

use crate::error::{RelayError, Result};

/// Upper bound for a single string frame. An oversized frame is drained to
/// its declared length and rejected, which keeps the stream in sync.
pub const MAX_STRING_LEN: u32 = 64 * 1024;

const RELAY_BUF: usize = 8 * 1024;

/// Write a length-prefixed string frame to `w`.
pub fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    let len = u32::try_from(s.len()).map_err(|_| {
        RelayError::MalformedCommand("string frame too large to encode".to_string())
    })?;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(s.as_bytes())?;
    w.flush()?;
    Ok(())
}

/// Read one complete string frame from `r`. Never returns a partial frame:
/// a close mid-frame is `ConnectionClosed`, invalid UTF-8 or an oversized
/// length is `MalformedCommand` with the frame consumed.
pub fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_STRING_LEN {
        drain_exact(r, len as u64)?;
        return Err(RelayError::MalformedCommand(format!(
            "string frame of {} bytes exceeds the {} byte cap",
            len, MAX_STRING_LEN
        )));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|_| RelayError::MalformedCommand("string frame is not valid UTF-8".to_string()))
}

/// Write a big-endian u64, used as the size prefix of a file payload.
pub fn write_u64<W: Write>(w: &mut W, value: u64) -> Result<()> {
    w.write_all(&value.to_be_bytes())?;
    w.flush()?;
    Ok(())
}

pub fn read_u64<R: Read>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

/// Which side of a byte relay failed. The distinction matters to the
/// router: a broken sink still leaves `remaining` unread bytes on the
/// source that must be drained before the next protocol unit.
#[derive(Debug)]
pub enum RelayFailure {
    /// The source ended or failed before the declared length was produced.
    Source(RelayError),
    /// The sink rejected a write; `remaining` bytes are still on the source.
    Sink { remaining: u64 },
}

/// Copy exactly `len` bytes from `from` into `to` through a fixed buffer,
/// never holding the whole payload in memory.
pub fn relay_exact<R: Read, W: Write>(
    from: &mut R,
    to: &mut W,
    len: u64,
) -> std::result::Result<(), RelayFailure> {
    let mut buf = [0u8; RELAY_BUF];
    let mut remaining = len;
    while remaining > 0 {
        let want = remaining.min(RELAY_BUF as u64) as usize;
        let n = match from.read(&mut buf[..want]) {
            Ok(0) => return Err(RelayFailure::Source(RelayError::TruncatedTransfer)),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(RelayFailure::Source(e.into())),
        };
        if to.write_all(&buf[..n]).is_err() {
            return Err(RelayFailure::Sink {
                remaining: remaining - n as u64,
            });
        }
        remaining -= n as u64;
    }
    if to.flush().is_err() {
        return Err(RelayFailure::Sink { remaining: 0 });
    }
    Ok(())
}

/// Consume and discard exactly `len` bytes, keeping the stream position
/// well-defined when a payload must be rejected.
pub fn drain_exact<R: Read>(r: &mut R, len: u64) -> Result<()> {
    match relay_exact(r, &mut io::sink(), len) {
        Err(RelayFailure::Source(e)) => Err(e),
        // io::sink() never rejects a write
        _ => Ok(()),
    }
}
