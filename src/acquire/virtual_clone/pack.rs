// src/acquire/virtual_clone/pack.rs

//! Packfile decoding: entry headers, zlib bodies, OFS/REF delta resolution.

use super::objects::{ObjectId, ObjectKind, ObjectStore};
use crate::errors::{Error, Result};
use flate2::bufread::ZlibDecoder;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::io::Read;

const OFS_DELTA: u8 = 6;
const REF_DELTA: u8 = 7;

/// How an entry's content is stored in the pack.
#[derive(Debug)]
enum EntryBody {
    Full(ObjectKind),
    OfsDelta { base_offset: usize },
    RefDelta { base: ObjectId },
}

#[derive(Debug)]
struct PackEntry {
    offset: usize,
    body: EntryBody,
    data: Vec<u8>,
}

/// Decodes a version 2 or 3 packfile into `store`, returning the number of objects.
///
/// The trailing SHA-1 checksum is verified. Deltas may reference bases by
/// offset or by id; bases must be in the same pack (thin packs are never
/// requested).
pub fn decode_pack(pack: &[u8], store: &mut ObjectStore) -> Result<usize> {
    if pack.len() < 12 + 20 || &pack[..4] != b"PACK" {
        return Err(pack_error("missing PACK signature"));
    }
    let version = u32::from_be_bytes([pack[4], pack[5], pack[6], pack[7]]);
    if version != 2 && version != 3 {
        return Err(pack_error(&format!("unsupported pack version {}", version)));
    }
    let count = u32::from_be_bytes([pack[8], pack[9], pack[10], pack[11]]) as usize;

    let body_end = pack.len() - 20;
    let expected: [u8; 20] = Sha1::digest(&pack[..body_end]).into();
    if expected[..] != pack[body_end..] {
        return Err(pack_error("checksum mismatch"));
    }

    let mut pos = 12;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let (entry, next) = read_entry(pack, pos, body_end)?;
        entries.push(entry);
        pos = next;
    }
    if pos != body_end {
        log::debug!("{} trailing bytes after the last pack entry", body_end - pos);
    }

    resolve(entries, store)?;
    log::debug!("Decoded {} pack objects", count);
    Ok(count)
}

/// Parses one entry at `start`, returning it and the offset of the next one.
fn read_entry(pack: &[u8], start: usize, end: usize) -> Result<(PackEntry, usize)> {
    let mut pos = start;
    let mut next_byte = || -> Result<u8> {
        let b = *pack
            .get(pos)
            .filter(|_| pos < end)
            .ok_or_else(|| pack_error("truncated entry header"))?;
        pos += 1;
        Ok(b)
    };

    let mut byte = next_byte()?;
    let type_code = (byte >> 4) & 0x07;
    let mut size = (byte & 0x0f) as u64;
    let mut shift = 4;
    while byte & 0x80 != 0 {
        byte = next_byte()?;
        size |= ((byte & 0x7f) as u64) << shift;
        shift += 7;
    }

    let body = match type_code {
        OFS_DELTA => {
            let mut b = next_byte()?;
            let mut distance = (b & 0x7f) as usize;
            while b & 0x80 != 0 {
                b = next_byte()?;
                distance = ((distance + 1) << 7) | (b & 0x7f) as usize;
            }
            let base_offset = start
                .checked_sub(distance)
                .ok_or_else(|| pack_error("delta base offset before pack start"))?;
            EntryBody::OfsDelta { base_offset }
        }
        REF_DELTA => {
            let mut id = [0u8; 20];
            for slot in id.iter_mut() {
                *slot = next_byte()?;
            }
            EntryBody::RefDelta {
                base: ObjectId::from_bytes(id),
            }
        }
        code => EntryBody::Full(
            ObjectKind::from_pack_type(code)
                .ok_or_else(|| pack_error(&format!("unknown object type {}", code)))?,
        ),
    };

    let (data, consumed) = inflate(&pack[pos..end], size as usize)?;
    Ok((
        PackEntry {
            offset: start,
            body,
            data,
        },
        pos + consumed,
    ))
}

/// Inflates one zlib stream from the front of `input`, returning the bytes and
/// how much of `input` the stream occupied.
fn inflate(input: &[u8], expected_size: usize) -> Result<(Vec<u8>, usize)> {
    let mut decoder = ZlibDecoder::new(input);
    let mut out = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| pack_error(&format!("zlib: {}", e)))?;
    if out.len() != expected_size {
        return Err(pack_error(&format!(
            "inflated {} bytes, header declared {}",
            out.len(),
            expected_size
        )));
    }
    Ok((out, decoder.total_in() as usize))
}

/// Resolves deltas and inserts every object into `store`.
fn resolve(entries: Vec<PackEntry>, store: &mut ObjectStore) -> Result<()> {
    // offset -> (kind, id) for every object resolved so far.
    let mut by_offset: HashMap<usize, (ObjectKind, ObjectId)> = HashMap::new();
    let mut pending = Vec::new();

    for entry in entries {
        match entry.body {
            EntryBody::Full(kind) => {
                let id = store.insert(kind, entry.data);
                by_offset.insert(entry.offset, (kind, id));
            }
            _ => pending.push(entry),
        }
    }

    // Each pass resolves every delta whose base is already known; chains
    // resolve over successive passes.
    while !pending.is_empty() {
        let before = pending.len();
        let mut still_pending = Vec::new();
        for entry in pending {
            let base_id = match &entry.body {
                EntryBody::OfsDelta { base_offset } => by_offset.get(base_offset).map(|(_, id)| *id),
                EntryBody::RefDelta { base } => store.get(base).map(|_| *base),
                EntryBody::Full(_) => None,
            };
            let Some(base_id) = base_id else {
                still_pending.push(entry);
                continue;
            };
            let (kind, base_data) = store
                .get(&base_id)
                .ok_or_else(|| pack_error("delta base vanished"))?;
            let data = apply_delta(base_data, &entry.data)?;
            let id = store.insert(kind, data);
            by_offset.insert(entry.offset, (kind, id));
        }
        if still_pending.len() == before {
            return Err(pack_error(&format!(
                "{} deltas reference bases missing from the pack",
                before
            )));
        }
        pending = still_pending;
    }
    Ok(())
}

/// Reads a little-endian base-128 size from the front of a delta.
fn read_varint(data: &[u8], pos: &mut usize) -> Result<usize> {
    let mut value = 0usize;
    let mut shift = 0;
    loop {
        let byte = *data
            .get(*pos)
            .ok_or_else(|| pack_error("truncated delta header"))?;
        *pos += 1;
        value |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(pack_error("delta size overflow"));
        }
    }
}

/// Applies a git delta (copy/insert instructions) to `base`.
///
/// # Examples
/// ```
/// use repodigest::acquire::virtual_clone::apply_delta;
///
/// // base 5 bytes, result 8 bytes: copy "hello" (offset 0, size 5), insert "!!!".
/// let delta = [5, 8, 0x90, 5, 3, b'!', b'!', b'!'];
/// assert_eq!(apply_delta(b"hello", &delta).unwrap(), b"hello!!!".to_vec());
/// ```
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let mut pos = 0;
    let source_size = read_varint(delta, &mut pos)?;
    if source_size != base.len() {
        return Err(pack_error("delta base size mismatch"));
    }
    let target_size = read_varint(delta, &mut pos)?;
    let mut out = Vec::with_capacity(target_size);

    while pos < delta.len() {
        let cmd = delta[pos];
        pos += 1;
        if cmd & 0x80 != 0 {
            let mut offset = 0usize;
            let mut size = 0usize;
            for i in 0..4 {
                if cmd & (1 << i) != 0 {
                    let b = *delta.get(pos).ok_or_else(|| pack_error("truncated copy"))?;
                    offset |= (b as usize) << (8 * i);
                    pos += 1;
                }
            }
            for i in 0..3 {
                if cmd & (0x10 << i) != 0 {
                    let b = *delta.get(pos).ok_or_else(|| pack_error("truncated copy"))?;
                    size |= (b as usize) << (8 * i);
                    pos += 1;
                }
            }
            if size == 0 {
                size = 0x10000;
            }
            let chunk = offset
                .checked_add(size)
                .and_then(|end| base.get(offset..end))
                .ok_or_else(|| pack_error("delta copy out of range"))?;
            out.extend_from_slice(chunk);
        } else if cmd != 0 {
            let len = cmd as usize;
            let chunk = delta
                .get(pos..pos + len)
                .ok_or_else(|| pack_error("truncated insert"))?;
            out.extend_from_slice(chunk);
            pos += len;
        } else {
            return Err(pack_error("reserved delta opcode 0"));
        }
    }

    if out.len() != target_size {
        return Err(pack_error("delta result size mismatch"));
    }
    Ok(out)
}

fn pack_error(message: &str) -> Error {
    Error::NetworkOrProtocolError(format!("packfile: {}", message))
}
