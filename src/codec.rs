//! Entry Codec: the on-disk frame format for one log entry.
//!
//! The frame is a text-oriented, length-prefixed multi-bulk representation
//! modeled on a simple Redis-protocol-style encoding:
//!
//! ```text
//! *4\r\n
//! $<len>\r\n<index>\r\n
//! $<len>\r\n<term>\r\n
//! $<len>\r\n<command_name>\r\n
//! $<len>\r\n<command>\r\n
//! ```
//!
//! Encode is deterministic. Decode is strict: any malformed header, length,
//! or numeric field is an [`Error::InvalidFormat`]; a frame that starts but
//! doesn't finish before EOF is an [`Error::UnexpectedEof`].

use std::io::{BufRead, Read};

use crate::entry::Entry;
use crate::error::{Error, Result};

const FIELD_COUNT: usize = 4;

/// Encodes an entry to its on-disk frame. `decode(&encode(e)) == e` for all
/// well-formed entries.
pub fn encode(entry: &Entry) -> Vec<u8> {
    let index = entry.index.to_string();
    let term = entry.term.to_string();
    let fields: [&[u8]; FIELD_COUNT] =
        [index.as_bytes(), term.as_bytes(), entry.command_name.as_bytes(), entry.command.as_slice()];
    let mut buf = Vec::new();
    buf.extend_from_slice(format!("*{FIELD_COUNT}\r\n").as_bytes());
    for field in fields {
        buf.extend_from_slice(format!("${}\r\n", field.len()).as_bytes());
        buf.extend_from_slice(field);
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

/// Returns the encoded frame length of `entry` without allocating the
/// intermediate fields twice (used by the store for position bookkeeping).
pub fn encoded_size(entry: &Entry) -> u64 {
    encode(entry).len() as u64
}

/// Decodes one frame from `reader`. Returns `Ok(None)` on a clean EOF at a
/// frame boundary (normal end of log), and `Ok(Some((entry, frame_len)))` on
/// success. Any EOF encountered mid-frame surfaces as
/// [`Error::UnexpectedEof`]; any malformed header/length/field surfaces as
/// [`Error::InvalidFormat`].
pub fn decode(reader: &mut impl BufRead) -> Result<Option<(Entry, u64)>> {
    let header = match read_crlf_line(reader)? {
        None => return Ok(None),
        Some(line) => line,
    };
    let mut consumed = header.len() as u64 + 2;

    if header.first() != Some(&b'*') {
        return Err(Error::InvalidFormat("expected '*' frame header".into()));
    }
    let argc = parse_ascii_int(&header[1..])?;
    if argc < 1 {
        return Err(Error::InvalidFormat(format!("frame declares {argc} fields")));
    }

    let mut fields: Vec<Vec<u8>> = Vec::with_capacity(argc as usize);
    for _ in 0..argc {
        let len_line = read_crlf_line(reader)?.ok_or(Error::UnexpectedEof)?;
        consumed += len_line.len() as u64 + 2;
        if len_line.first() != Some(&b'$') {
            return Err(Error::InvalidFormat("expected '$' field header".into()));
        }
        let len = parse_ascii_int(&len_line[1..])?;
        if len < 0 {
            return Err(Error::InvalidFormat("negative field length".into()));
        }
        let len = len as usize;

        let mut field = vec![0u8; len];
        read_exact_or_eof(reader, &mut field)?;
        consumed += len as u64;

        let mut crlf = [0u8; 2];
        read_exact_or_eof(reader, &mut crlf)?;
        if crlf != *b"\r\n" {
            return Err(Error::InvalidFormat("missing CRLF after field".into()));
        }
        consumed += 2;

        fields.push(field);
    }

    if fields.len() != FIELD_COUNT {
        return Err(Error::InvalidFormat(format!(
            "expected {FIELD_COUNT} fields for a log entry, got {}",
            fields.len()
        )));
    }

    let index = parse_ascii_u64(&fields[0])?;
    let term = parse_ascii_u64(&fields[1])?;
    let command_name = String::from_utf8(fields[2].clone())
        .map_err(|_| Error::InvalidFormat("command name is not valid utf8".into()))?;
    let command = fields[3].clone();

    Ok(Some((Entry { index, term, command_name, command }, consumed)))
}

/// Reads bytes up to (and consuming) the next `\r\n`, returning the bytes
/// before it. Returns `Ok(None)` if EOF occurs before any byte is read (a
/// clean frame boundary); returns `Err(UnexpectedEof)` if EOF occurs after
/// some bytes were read but before the terminator.
fn read_crlf_line(reader: &mut impl BufRead) -> Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = reader.read(&mut byte)?;
        if n == 0 {
            return if buf.is_empty() { Ok(None) } else { Err(Error::UnexpectedEof) };
        }
        if byte[0] == b'\r' {
            let n = reader.read(&mut byte)?;
            if n == 0 {
                return Err(Error::UnexpectedEof);
            }
            if byte[0] != b'\n' {
                return Err(Error::InvalidFormat("missing CRLF terminator".into()));
            }
            return Ok(Some(buf));
        }
        buf.push(byte[0]);
    }
}

fn read_exact_or_eof(reader: &mut impl BufRead, buf: &mut [u8]) -> Result<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::UnexpectedEof),
        Err(err) => Err(Error::Io(err)),
    }
}

fn parse_ascii_int(bytes: &[u8]) -> Result<i64> {
    let s = std::str::from_utf8(bytes)
        .map_err(|_| Error::InvalidFormat("non-utf8 numeric field".into()))?;
    s.trim_end().parse::<i64>().map_err(|_| Error::InvalidFormat(format!("not a number: {s:?}")))
}

fn parse_ascii_u64(bytes: &[u8]) -> Result<u64> {
    let s = std::str::from_utf8(bytes)
        .map_err(|_| Error::InvalidFormat("non-utf8 numeric field".into()))?;
    s.parse::<u64>().map_err(|_| Error::InvalidFormat(format!("not a non-negative integer: {s:?}")))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn entry(index: Index, term: Term, name: &str, command: &str) -> Entry {
        Entry::new(index, term, name, command.as_bytes().to_vec())
    }

    use crate::entry::{Index, Term};

    #[test]
    fn round_trip() {
        let e = entry(1, 1, "SET", "x 1");
        let frame = encode(&e);
        let mut cursor = Cursor::new(frame.clone());
        let (decoded, len) = decode(&mut cursor).unwrap().expect("frame");
        assert_eq!(decoded, e);
        assert_eq!(len, frame.len() as u64);
        assert_eq!(encoded_size(&e), frame.len() as u64);
    }

    #[test]
    fn deterministic_encoding() {
        let e = entry(42, 7, "INCR", "c");
        assert_eq!(encode(&e), encode(&e));
    }

    #[test]
    fn clean_eof_at_boundary_is_none() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(decode(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn eof_mid_frame_is_unexpected_eof() {
        let mut frame = encode(&entry(1, 1, "SET", "x 1"));
        frame.truncate(frame.len() - 4);
        let mut cursor = Cursor::new(frame);
        match decode(&mut cursor) {
            Err(Error::UnexpectedEof) => {}
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
    }

    #[test]
    fn bad_header_byte_is_invalid_format() {
        let mut cursor = Cursor::new(b"#4\r\n".to_vec());
        match decode(&mut cursor) {
            Err(Error::InvalidFormat(_)) => {}
            other => panic!("expected InvalidFormat, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_index_is_invalid_format() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"*4\r\n");
        buf.extend_from_slice(b"$3\r\nabc\r\n");
        buf.extend_from_slice(b"$1\r\n1\r\n");
        buf.extend_from_slice(b"$3\r\nSET\r\n");
        buf.extend_from_slice(b"$3\r\nx 1\r\n");
        let mut cursor = Cursor::new(buf);
        match decode(&mut cursor) {
            Err(Error::InvalidFormat(_)) => {}
            other => panic!("expected InvalidFormat, got {other:?}"),
        }
    }

    #[test]
    fn sequential_frames_decode_in_order() {
        let e1 = entry(1, 1, "SET", "x 1");
        let e2 = entry(2, 1, "SET", "y 2");
        let mut buf = encode(&e1);
        buf.extend(encode(&e2));
        let mut cursor = Cursor::new(buf);
        let (d1, _) = decode(&mut cursor).unwrap().unwrap();
        let (d2, _) = decode(&mut cursor).unwrap().unwrap();
        assert_eq!(d1, e1);
        assert_eq!(d2, e2);
        assert!(decode(&mut cursor).unwrap().is_none());
    }
}
