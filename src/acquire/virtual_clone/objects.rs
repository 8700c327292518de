// src/acquire/virtual_clone/objects.rs

//! Git object ids and an in-memory object store.

use crate::errors::{Error, Result};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fmt;

/// Git object types that can appear in a packfile after delta resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    /// The numeric type used in pack entry headers.
    pub fn from_pack_type(code: u8) -> Option<Self> {
        match code {
            1 => Some(ObjectKind::Commit),
            2 => Some(ObjectKind::Tree),
            3 => Some(ObjectKind::Blob),
            4 => Some(ObjectKind::Tag),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Commit => "commit",
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
            ObjectKind::Tag => "tag",
        }
    }
}

/// A 20-byte SHA-1 object id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parses a 40-character hex id.
    ///
    /// # Examples
    /// ```
    /// use repodigest::acquire::virtual_clone::ObjectId;
    ///
    /// let id = ObjectId::from_hex("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391").unwrap();
    /// assert_eq!(id.to_string(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    /// assert!(ObjectId::from_hex("xyz").is_none());
    /// ```
    pub fn from_hex(hex_str: &str) -> Option<Self> {
        let bytes = hex::decode(hex_str.trim()).ok()?;
        let array: [u8; 20] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    /// Hashes `data` the way git does: `"<kind> <len>\0" + data`.
    ///
    /// # Examples
    /// ```
    /// use repodigest::acquire::virtual_clone::{ObjectId, ObjectKind};
    ///
    /// // The well-known id of the empty blob.
    /// assert_eq!(
    ///     ObjectId::hash_object(ObjectKind::Blob, b"").to_string(),
    ///     "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
    /// );
    /// ```
    pub fn hash_object(kind: ObjectKind, data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(format!("{} {}\0", kind.as_str(), data.len()).as_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self)
    }
}

/// One path found while walking a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedEntry {
    pub path: String,
    pub is_dir: bool,
    /// Blob id for files.
    pub blob: Option<ObjectId>,
    pub size: u64,
}

/// Decoded objects keyed by id. Lives only as long as the snapshot using it.
#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: HashMap<ObjectId, (ObjectKind, Vec<u8>)>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object and returns its id.
    pub fn insert(&mut self, kind: ObjectKind, data: Vec<u8>) -> ObjectId {
        let id = ObjectId::hash_object(kind, &data);
        self.objects.entry(id).or_insert((kind, data));
        id
    }

    pub fn get(&self, id: &ObjectId) -> Option<(ObjectKind, &[u8])> {
        self.objects.get(id).map(|(k, d)| (*k, d.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn require(&self, id: &ObjectId, expected: ObjectKind) -> Result<&[u8]> {
        match self.get(id) {
            Some((kind, data)) if kind == expected => Ok(data),
            Some((kind, _)) => Err(Error::NetworkOrProtocolError(format!(
                "object {} is a {}, expected a {}",
                id,
                kind.as_str(),
                expected.as_str()
            ))),
            None => Err(Error::NetworkOrProtocolError(format!(
                "object {} missing from pack",
                id
            ))),
        }
    }

    /// Follows annotated tags down to a commit and returns that commit's tree id.
    pub fn commit_tree(&self, id: &ObjectId) -> Result<ObjectId> {
        let mut current = *id;
        // Tag chains are short; cap them anyway.
        for _ in 0..16 {
            match self.get(&current) {
                Some((ObjectKind::Tag, data)) => {
                    current = header_id(data, "object ")?;
                }
                Some((ObjectKind::Commit, data)) => return header_id(data, "tree "),
                _ => {
                    self.require(&current, ObjectKind::Commit)?;
                }
            }
        }
        Err(Error::NetworkOrProtocolError(format!(
            "tag chain starting at {} is too deep",
            id
        )))
    }

    /// Lists every path reachable from `root`, depth-first in tree order.
    pub fn walk_tree(&self, root: &ObjectId) -> Result<Vec<WalkedEntry>> {
        let mut out = Vec::new();
        self.walk_into(root, "", &mut out)?;
        Ok(out)
    }

    fn walk_into(&self, tree: &ObjectId, prefix: &str, out: &mut Vec<WalkedEntry>) -> Result<()> {
        let data = self.require(tree, ObjectKind::Tree)?;
        for entry in parse_tree(data)? {
            let path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", prefix, entry.name)
            };
            match entry.mode.as_str() {
                "40000" | "040000" => {
                    out.push(WalkedEntry {
                        path: path.clone(),
                        is_dir: true,
                        blob: None,
                        size: 0,
                    });
                    self.walk_into(&entry.id, &path, out)?;
                }
                // Submodule: the commit lives in another repository.
                "160000" => log::debug!("Skipping submodule {}", path),
                _ => {
                    let size = self.require(&entry.id, ObjectKind::Blob)?.len() as u64;
                    out.push(WalkedEntry {
                        path,
                        is_dir: false,
                        blob: Some(entry.id),
                        size,
                    });
                }
            }
        }
        Ok(())
    }
}

struct RawTreeEntry {
    mode: String,
    name: String,
    id: ObjectId,
}

/// Parses `<mode> <name>\0<20-byte id>` records.
fn parse_tree(mut data: &[u8]) -> Result<Vec<RawTreeEntry>> {
    let malformed = || Error::NetworkOrProtocolError("malformed tree object".to_string());
    let mut entries = Vec::new();
    while !data.is_empty() {
        let space = data.iter().position(|&b| b == b' ').ok_or_else(malformed)?;
        let nul = data.iter().position(|&b| b == 0).ok_or_else(malformed)?;
        if nul < space || data.len() < nul + 21 {
            return Err(malformed());
        }
        let mode = String::from_utf8_lossy(&data[..space]).into_owned();
        let name = String::from_utf8_lossy(&data[space + 1..nul]).into_owned();
        let mut id = [0u8; 20];
        id.copy_from_slice(&data[nul + 1..nul + 21]);
        entries.push(RawTreeEntry {
            mode,
            name,
            id: ObjectId(id),
        });
        data = &data[nul + 21..];
    }
    Ok(entries)
}

/// Reads the id following `key` on one of the header lines of a commit or tag.
fn header_id(data: &[u8], key: &str) -> Result<ObjectId> {
    let text = String::from_utf8_lossy(data);
    text.lines()
        .take_while(|line| !line.is_empty())
        .find_map(|line| line.strip_prefix(key))
        .and_then(ObjectId::from_hex)
        .ok_or_else(|| {
            Error::NetworkOrProtocolError(format!("object has no '{}' header", key.trim()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_bytes(entries: &[(&str, &str, ObjectId)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (mode, name, id) in entries {
            out.extend_from_slice(mode.as_bytes());
            out.push(b' ');
            out.extend_from_slice(name.as_bytes());
            out.push(0);
            out.extend_from_slice(id.as_bytes());
        }
        out
    }

    #[test]
    fn test_walk_nested_tree() {
        let mut store = ObjectStore::new();
        let readme = store.insert(ObjectKind::Blob, b"hello\n".to_vec());
        let lib = store.insert(ObjectKind::Blob, b"pub fn x() {}\n".to_vec());
        let src = store.insert(ObjectKind::Tree, tree_bytes(&[("100644", "lib.rs", lib)]));
        let root = store.insert(
            ObjectKind::Tree,
            tree_bytes(&[("100644", "README", readme), ("40000", "src", src)]),
        );
        let commit_body = format!(
            "tree {}\nauthor A <a@x> 0 +0000\ncommitter A <a@x> 0 +0000\n\nmsg\n",
            root
        );
        let commit = store.insert(ObjectKind::Commit, commit_body.into_bytes());

        let tree = store.commit_tree(&commit).unwrap();
        assert_eq!(tree, root);
        let walked = store.walk_tree(&tree).unwrap();
        let paths: Vec<(&str, bool, u64)> = walked
            .iter()
            .map(|e| (e.path.as_str(), e.is_dir, e.size))
            .collect();
        assert_eq!(
            paths,
            vec![("README", false, 6), ("src", true, 0), ("src/lib.rs", false, 14)]
        );
    }

    #[test]
    fn test_annotated_tag_is_peeled() {
        let mut store = ObjectStore::new();
        let root = store.insert(ObjectKind::Tree, Vec::new());
        let commit = store.insert(
            ObjectKind::Commit,
            format!("tree {}\n\nmsg\n", root).into_bytes(),
        );
        let tag = store.insert(
            ObjectKind::Tag,
            format!("object {}\ntype commit\ntag v1\n\nrelease\n", commit).into_bytes(),
        );
        assert_eq!(store.commit_tree(&tag).unwrap(), root);
    }

    #[test]
    fn test_missing_object_is_protocol_error() {
        let store = ObjectStore::new();
        let id = ObjectId::hash_object(ObjectKind::Tree, b"");
        assert!(matches!(
            store.walk_tree(&id),
            Err(Error::NetworkOrProtocolError(_))
        ));
    }

    #[test]
    fn test_submodules_are_skipped() {
        let mut store = ObjectStore::new();
        let foreign = ObjectId::hash_object(ObjectKind::Commit, b"elsewhere");
        let root = store.insert(ObjectKind::Tree, tree_bytes(&[("160000", "dep", foreign)]));
        assert!(store.walk_tree(&root).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_tree_is_rejected() {
        assert!(parse_tree(b"100644 name\0short").is_err());
    }
}
