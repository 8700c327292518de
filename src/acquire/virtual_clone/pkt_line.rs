// src/acquire/virtual_clone/pkt_line.rs

//! The pkt-line framing of the git wire protocol and side-band demultiplexing.

use crate::errors::{Error, Result};

/// One frame read from a pkt-line stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PktLine<'a> {
    /// `0000`
    Flush,
    /// `0001`, protocol v2 only.
    Delim,
    /// `0002`, protocol v2 only.
    ResponseEnd,
    Data(&'a [u8]),
}

/// Encodes `payload` as a data pkt-line.
///
/// # Examples
/// ```
/// use repodigest::acquire::virtual_clone::pkt_line::encode;
///
/// assert_eq!(encode(b"done\n"), b"0009done\n".to_vec());
/// ```
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = format!("{:04x}", payload.len() + 4).into_bytes();
    out.extend_from_slice(payload);
    out
}

/// A flush packet.
pub const FLUSH: &[u8] = b"0000";

/// Reads consecutive pkt-lines from a byte slice.
#[derive(Debug)]
pub struct PktReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PktReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Reads the next frame, or `None` at end of input.
    pub fn next_line(&mut self) -> Result<Option<PktLine<'a>>> {
        let rest = self.remaining();
        if rest.is_empty() {
            return Ok(None);
        }
        if rest.len() < 4 {
            return Err(protocol_error("truncated pkt-line header"));
        }
        let len_text = std::str::from_utf8(&rest[..4])
            .map_err(|_| protocol_error("non-ASCII pkt-line header"))?;
        let len = usize::from_str_radix(len_text, 16)
            .map_err(|_| protocol_error(&format!("invalid pkt-line length '{}'", len_text)))?;
        let line = match len {
            0 => PktLine::Flush,
            1 => PktLine::Delim,
            2 => PktLine::ResponseEnd,
            3 => return Err(protocol_error("invalid pkt-line length 3")),
            n if n > rest.len() => return Err(protocol_error("truncated pkt-line payload")),
            n => {
                self.pos += n;
                return Ok(Some(PktLine::Data(&rest[4..n])));
            }
        };
        self.pos += 4;
        Ok(Some(line))
    }
}

/// Strips one trailing `\n` from a text payload.
pub fn trim_lf(payload: &[u8]) -> &[u8] {
    payload.strip_suffix(b"\n").unwrap_or(payload)
}

/// Collects band-1 (pack data) from side-band frames until a flush or end of input.
///
/// Band 2 is progress text and is logged; band 3 is a fatal remote error.
pub fn demux_side_band(reader: &mut PktReader<'_>) -> Result<Vec<u8>> {
    let mut pack = Vec::new();
    while let Some(line) = reader.next_line()? {
        let payload = match line {
            PktLine::Data(payload) => payload,
            PktLine::Flush => break,
            _ => continue,
        };
        let Some((&band, body)) = payload.split_first() else {
            continue;
        };
        match band {
            1 => pack.extend_from_slice(body),
            2 => log::debug!("remote: {}", String::from_utf8_lossy(body).trim_end()),
            3 => {
                return Err(Error::NetworkOrProtocolError(format!(
                    "remote error: {}",
                    String::from_utf8_lossy(body).trim()
                )))
            }
            other => {
                return Err(protocol_error(&format!("unknown side-band channel {}", other)))
            }
        }
    }
    Ok(pack)
}

fn protocol_error(message: &str) -> Error {
    Error::NetworkOrProtocolError(format!("git protocol: {}", message))
}
