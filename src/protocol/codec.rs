//! Protocol codec
//!
//! Incremental RESP encoding and decoding over `BytesMut` buffers.
//!
//! Decoders return `Ok(None)` while the buffer holds only part of a frame
//! and leave the buffer untouched; once a whole frame is present it is
//! consumed from the front of the buffer.

use std::io::{Read, Write};

use bytes::{Buf, BytesMut};

use super::{Command, Reply};
use crate::error::{EmberError, Result};

/// Maximum bulk string size (16 MB)
pub const MAX_BULK_SIZE: usize = 16 * 1024 * 1024;

/// Maximum number of arguments in one request
pub const MAX_ARGS: usize = 1024 * 1024;

/// Maximum inline request line, and maximum `*`/`$` header line
const MAX_INLINE_SIZE: usize = 64 * 1024;

/// Upper bound on slots reserved up front for a declared array length
const PREALLOC_LIMIT: usize = 1024;

const CRLF: &[u8] = b"\r\n";

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode an argument array as a RESP request
pub fn encode_request(args: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        put_bulk(&mut out, arg);
    }
    out
}

/// Encode a command as a RESP request
pub fn encode_command(command: &Command) -> Vec<u8> {
    encode_request(&command.to_args())
}

/// Take one request's argument array off the front of `buf`
///
/// Accepts both multibulk (`*`) and inline requests. Blank inline lines
/// are skipped.
pub fn decode_request(buf: &mut BytesMut) -> Result<Option<Vec<Vec<u8>>>> {
    loop {
        let parsed = if buf.first() == Some(&b'*') {
            parse_multibulk(buf)?
        } else {
            parse_inline(buf)?
        };

        match parsed {
            Some((args, consumed)) => {
                buf.advance(consumed);
                if args.is_empty() {
                    continue;
                }
                return Ok(Some(args));
            }
            None => return Ok(None),
        }
    }
}

fn parse_multibulk(buf: &[u8]) -> Result<Option<(Vec<Vec<u8>>, usize)>> {
    let Some((line, mut pos)) = read_header_line(buf, 1)? else {
        return Ok(None);
    };
    let count = parse_len(line, MAX_ARGS, "argument count")?;

    let mut args = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    for _ in 0..count {
        match buf.get(pos) {
            None => return Ok(None),
            Some(b'$') => {}
            Some(other) => {
                return Err(EmberError::Protocol(format!(
                    "expected '$', got '{}'",
                    *other as char
                )))
            }
        }
        let Some((line, start)) = read_header_line(buf, pos + 1)? else {
            return Ok(None);
        };
        let len = parse_len(line, MAX_BULK_SIZE, "bulk length")?;
        let end = start + len;
        if buf.len() < end + CRLF.len() {
            return Ok(None);
        }
        if &buf[end..end + CRLF.len()] != CRLF {
            return Err(EmberError::Protocol(
                "bulk string not terminated by CRLF".to_string(),
            ));
        }
        args.push(buf[start..end].to_vec());
        pos = end + CRLF.len();
    }

    Ok(Some((args, pos)))
}

fn parse_inline(buf: &[u8]) -> Result<Option<(Vec<Vec<u8>>, usize)>> {
    let Some(newline) = buf.iter().position(|b| *b == b'\n') else {
        if buf.len() > MAX_INLINE_SIZE {
            return Err(EmberError::Protocol("inline request too long".to_string()));
        }
        return Ok(None);
    };

    let line = buf[..newline].strip_suffix(b"\r").unwrap_or(&buf[..newline]);
    let args = line
        .split(|b| b.is_ascii_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_vec())
        .collect();

    Ok(Some((args, newline + 1)))
}

// =============================================================================
// Reply Encoding/Decoding
// =============================================================================

/// Encode a reply to bytes
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    let mut out = Vec::new();
    put_reply(&mut out, reply);
    out
}

fn put_reply(out: &mut Vec<u8>, reply: &Reply) {
    match reply {
        Reply::Simple(text) => put_line(out, b'+', text.as_bytes()),
        Reply::Error(text) => put_line(out, b'-', text.as_bytes()),
        Reply::Integer(n) => put_line(out, b':', n.to_string().as_bytes()),
        Reply::Bulk(data) => put_bulk(out, data),
        Reply::Null => out.extend_from_slice(b"$-1\r\n"),
        Reply::Array(items) => {
            put_line(out, b'*', items.len().to_string().as_bytes());
            for item in items {
                put_reply(out, item);
            }
        }
    }
}

/// Take one reply off the front of `buf`
pub fn decode_reply(buf: &mut BytesMut) -> Result<Option<Reply>> {
    match parse_reply(buf, 0)? {
        Some((reply, consumed)) => {
            buf.advance(consumed);
            Ok(Some(reply))
        }
        None => Ok(None),
    }
}

fn parse_reply(buf: &[u8], pos: usize) -> Result<Option<(Reply, usize)>> {
    let Some(&tag) = buf.get(pos) else {
        return Ok(None);
    };
    let Some((line, next)) = read_header_line(buf, pos + 1)? else {
        return Ok(None);
    };

    let reply = match tag {
        b'+' => (Reply::Simple(String::from_utf8_lossy(line).into_owned()), next),
        b'-' => (Reply::Error(String::from_utf8_lossy(line).into_owned()), next),
        b':' => (Reply::Integer(parse_int(line)?), next),
        b'$' => {
            if line == b"-1" {
                (Reply::Null, next)
            } else {
                let len = parse_len(line, MAX_BULK_SIZE, "bulk length")?;
                let end = next + len;
                if buf.len() < end + CRLF.len() {
                    return Ok(None);
                }
                (Reply::Bulk(buf[next..end].to_vec()), end + CRLF.len())
            }
        }
        b'*' => {
            if line == b"-1" {
                (Reply::Null, next)
            } else {
                let count = parse_len(line, MAX_ARGS, "array length")?;
                let mut items = Vec::with_capacity(count.min(PREALLOC_LIMIT));
                let mut cursor = next;
                for _ in 0..count {
                    match parse_reply(buf, cursor)? {
                        Some((item, after)) => {
                            items.push(item);
                            cursor = after;
                        }
                        None => return Ok(None),
                    }
                }
                (Reply::Array(items), cursor)
            }
        }
        other => {
            return Err(EmberError::Protocol(format!(
                "unknown reply type '{}'",
                other as char
            )))
        }
    };

    Ok(Some(reply))
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(&encode_command(command))?;
    writer.flush()?;
    Ok(())
}

/// Write a reply to a stream
pub fn write_reply<W: Write>(writer: &mut W, reply: &Reply) -> Result<()> {
    writer.write_all(&encode_reply(reply))?;
    writer.flush()?;
    Ok(())
}

/// Read one complete reply from a stream
///
/// Bytes past the end of the reply stay in `buf` for the next call.
pub fn read_reply<R: Read>(reader: &mut R, buf: &mut BytesMut) -> Result<Reply> {
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(reply) = decode_reply(buf)? {
            return Ok(reply);
        }
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Err(EmberError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-reply",
            )));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Line starting at `pos`, and the position just past its CRLF
fn read_line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(pos..)?;
    let end = rest.windows(CRLF.len()).position(|w| w == CRLF)?;
    Some((&rest[..end], pos + end + CRLF.len()))
}

/// [`read_line`] that rejects a line still unterminated past `MAX_INLINE_SIZE`
fn read_header_line(buf: &[u8], pos: usize) -> Result<Option<(&[u8], usize)>> {
    match read_line(buf, pos) {
        Some(found) => Ok(Some(found)),
        None if buf.len().saturating_sub(pos) > MAX_INLINE_SIZE => Err(EmberError::Protocol(
            "protocol line too long".to_string(),
        )),
        None => Ok(None),
    }
}

fn parse_int(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            EmberError::Protocol(format!(
                "invalid integer '{}'",
                String::from_utf8_lossy(line)
            ))
        })
}

fn parse_len(line: &[u8], max: usize, what: &str) -> Result<usize> {
    let n = parse_int(line)?;
    if n < 0 || n as u64 > max as u64 {
        return Err(EmberError::Protocol(format!("invalid {}: {}", what, n)));
    }
    Ok(n as usize)
}

fn put_line(out: &mut Vec<u8>, tag: u8, body: &[u8]) {
    out.push(tag);
    out.extend_from_slice(body);
    out.extend_from_slice(CRLF);
}

fn put_bulk(out: &mut Vec<u8>, data: &[u8]) {
    put_line(out, b'$', data.len().to_string().as_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(CRLF);
}
