//! In-process shallow fetch over the git smart-HTTP protocol (v0/v1).
//!
//! The exchange is the one `git clone --depth 1` performs over HTTP:
//! 1. `GET <repo>/info/refs?service=git-upload-pack` for the ref advertisement
//! 2. `POST <repo>/git-upload-pack` with `want <id>`, `deepen 1`, `done`
//! 3. demultiplex the side-band response into a packfile
//! 4. decode the pack into an [`ObjectStore`] and walk the commit's tree
//!
//! Nothing touches the disk; the store is dropped with the snapshot.

mod objects;
mod pack;
pub mod pkt_line;

pub use objects::{ObjectId, ObjectKind, ObjectStore, WalkedEntry};
pub use pack::{apply_delta, decode_pack};

use super::http::{build_client, check_status};
use super::{Acquirer, Snapshot};
use crate::constants::{PROGRESS_ACQUIRED, USER_AGENT};
use crate::core_types::RawEntry;
use crate::errors::{Error, Result};
use crate::progress::Progress;
use crate::reference::RepoReference;
use anyhow::anyhow;
use async_trait::async_trait;
use pkt_line::{demux_side_band, encode, trim_lf, PktLine, PktReader, FLUSH};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;

const ADVERTISEMENT_CONTENT_TYPE: &str = "application/x-git-upload-pack-advertisement";
const REQUEST_CONTENT_TYPE: &str = "application/x-git-upload-pack-request";
const RESULT_CONTENT_TYPE: &str = "application/x-git-upload-pack-result";

/// Blobs are already in memory; reads never wait on I/O.
const MEMORY_READ_CONCURRENCY: usize = 64;

/// The refs and capabilities a server advertised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    pub refs: HashMap<String, ObjectId>,
    pub capabilities: Vec<String>,
}

impl Advertisement {
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c == name)
    }

    /// The branch `HEAD` points at, from the `symref=HEAD:refs/heads/<b>` capability.
    pub fn head_branch(&self) -> Option<&str> {
        self.capabilities
            .iter()
            .find_map(|c| c.strip_prefix("symref=HEAD:"))
            .and_then(|target| target.strip_prefix("refs/heads/"))
    }

    /// Picks the object to fetch: `refs/heads/<branch>`, then `refs/tags/<branch>`,
    /// or `HEAD` when no branch is requested. Returns the id and the branch name.
    pub fn select(&self, branch: Option<&str>) -> Result<(ObjectId, Option<String>)> {
        match branch {
            Some(name) => {
                let candidates = [format!("refs/heads/{}", name), format!("refs/tags/{}", name)];
                candidates
                    .iter()
                    .find_map(|r| self.refs.get(r))
                    .map(|id| (*id, Some(name.to_string())))
                    .ok_or_else(|| {
                        Error::NotFound(format!("Remote branch '{}' not found", name))
                    })
            }
            None => self
                .refs
                .get("HEAD")
                .map(|id| (*id, self.head_branch().map(str::to_string)))
                .ok_or_else(|| Error::NotFound("Repository has no HEAD (empty?)".to_string())),
        }
    }
}

/// Parses the body of `GET info/refs?service=git-upload-pack`.
pub fn parse_advertisement(body: &[u8]) -> Result<Advertisement> {
    let mut reader = PktReader::new(body);
    let mut adv = Advertisement::default();
    let mut first_ref = true;

    while let Some(line) = reader.next_line()? {
        let PktLine::Data(payload) = line else {
            continue;
        };
        let payload = trim_lf(payload);
        if payload.starts_with(b"# service=") || payload == b"version 1" {
            continue;
        }
        if let Some(msg) = payload.strip_prefix(b"ERR ") {
            return Err(Error::NetworkOrProtocolError(format!(
                "remote error: {}",
                String::from_utf8_lossy(msg)
            )));
        }

        let (ref_part, caps) = match payload.iter().position(|&b| b == 0) {
            Some(nul) => (&payload[..nul], Some(&payload[nul + 1..])),
            None => (payload, None),
        };
        if first_ref {
            if let Some(caps) = caps {
                adv.capabilities = String::from_utf8_lossy(caps)
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
            }
            first_ref = false;
        }

        let text = String::from_utf8_lossy(ref_part);
        let Some((id_hex, name)) = text.split_once(' ') else {
            return Err(Error::NetworkOrProtocolError(format!(
                "malformed ref line '{}'",
                text
            )));
        };
        // Empty repositories advertise a zero id named `capabilities^{}`.
        if name == "capabilities^{}" {
            continue;
        }
        let id = ObjectId::from_hex(id_hex).ok_or_else(|| {
            Error::NetworkOrProtocolError(format!("malformed object id '{}'", id_hex))
        })?;
        adv.refs.insert(name.to_string(), id);
    }
    Ok(adv)
}

/// Builds the `git-upload-pack` request body for a depth-1 fetch of `want`.
pub fn build_upload_request(want: &ObjectId, adv: &Advertisement) -> Vec<u8> {
    let mut caps: Vec<String> = ["side-band-64k", "ofs-delta", "shallow", "no-progress"]
        .iter()
        .filter(|c| adv.has_capability(c))
        .map(|c| c.to_string())
        .collect();
    if !adv.has_capability("side-band-64k") && adv.has_capability("side-band") {
        caps.insert(0, "side-band".to_string());
    }
    caps.push(format!("agent={}", USER_AGENT));

    let mut body = encode(format!("want {} {}\n", want, caps.join(" ")).as_bytes());
    if adv.has_capability("shallow") {
        body.extend(encode(b"deepen 1\n"));
    }
    body.extend_from_slice(FLUSH);
    body.extend(encode(b"done\n"));
    body
}

/// Extracts the packfile from a `git-upload-pack` response.
pub fn extract_pack(response: &[u8], side_band: bool) -> Result<Vec<u8>> {
    let mut reader = PktReader::new(response);
    // Shallow-update lines and flushes precede the NAK/ACK that starts the pack.
    loop {
        match reader.next_line()? {
            None => {
                return Err(Error::NetworkOrProtocolError(
                    "upload-pack response ended before the pack".to_string(),
                ))
            }
            Some(PktLine::Data(payload)) => {
                let payload = trim_lf(payload);
                if payload == b"NAK" || payload.starts_with(b"ACK ") {
                    break;
                }
                if let Some(msg) = payload.strip_prefix(b"ERR ") {
                    return Err(Error::NetworkOrProtocolError(format!(
                        "remote error: {}",
                        String::from_utf8_lossy(msg)
                    )));
                }
                if !(payload.starts_with(b"shallow ") || payload.starts_with(b"unshallow ")) {
                    log::debug!(
                        "Ignoring unexpected pre-pack line: {}",
                        String::from_utf8_lossy(payload)
                    );
                }
            }
            Some(_) => continue,
        }
    }

    if side_band {
        demux_side_band(&mut reader)
    } else {
        Ok(reader.remaining().to_vec())
    }
}

/// Fetches repositories over smart HTTP into memory.
#[derive(Debug, Clone)]
pub struct VirtualCloneAcquirer {
    client: Client,
    cors_proxy: Option<String>,
}

impl VirtualCloneAcquirer {
    pub fn new(cors_proxy: Option<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(None)?,
            cors_proxy: cors_proxy.map(|p| p.trim_end_matches('/').to_string()),
        })
    }

    /// The repository URL requests go to, routed through the relay when configured.
    pub fn repo_base_url(&self, reference: &RepoReference) -> String {
        match &self.cors_proxy {
            Some(proxy) => format!(
                "{}/{}/{}/{}.git",
                proxy,
                reference.authority(),
                reference.owner,
                reference.repo
            ),
            None => reference.clone_url(),
        }
    }

    fn authorize(
        &self,
        request: RequestBuilder,
        reference: &RepoReference,
        token: Option<&str>,
    ) -> RequestBuilder {
        match token {
            Some(token) => {
                let (user, password) = reference.provider.basic_auth(token);
                request.basic_auth(user, password)
            }
            None => request,
        }
    }

    async fn fetch_advertisement(
        &self,
        base: &str,
        reference: &RepoReference,
        token: Option<&str>,
    ) -> Result<Advertisement> {
        let url = format!("{}/info/refs?service=git-upload-pack", base);
        log::debug!("Fetching ref advertisement from {}", url);
        let response = self
            .authorize(self.client.get(&url), reference, token)
            .send()
            .await?;
        let response = check_status(response, "ref advertisement").await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with(ADVERTISEMENT_CONTENT_TYPE) {
            return Err(Error::NetworkOrProtocolError(format!(
                "{} does not speak smart HTTP (content type '{}')",
                reference.host, content_type
            )));
        }
        parse_advertisement(&response.bytes().await?)
    }

    async fn fetch_pack(
        &self,
        base: &str,
        reference: &RepoReference,
        token: Option<&str>,
        body: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let url = format!("{}/git-upload-pack", base);
        log::debug!("Requesting pack from {}", url);
        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, REQUEST_CONTENT_TYPE)
            .header(ACCEPT, RESULT_CONTENT_TYPE)
            .body(body);
        let response = self.authorize(request, reference, token).send().await?;
        let response = check_status(response, "upload-pack").await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Acquirer for VirtualCloneAcquirer {
    async fn acquire(
        &self,
        reference: &RepoReference,
        token: Option<&str>,
        progress: &Progress,
    ) -> Result<Box<dyn Snapshot>> {
        let base = self.repo_base_url(reference);
        progress.report(5, "Fetching refs");
        let adv = self.fetch_advertisement(&base, reference, token).await?;
        let (want, branch) = adv.select(reference.branch.as_deref())?;
        log::debug!("Fetching {} ({:?}) from {}", want, branch, reference.short_name());

        progress.report(15, "Negotiating pack");
        let side_band = adv.has_capability("side-band-64k") || adv.has_capability("side-band");
        let response = self
            .fetch_pack(&base, reference, token, build_upload_request(&want, &adv))
            .await?;

        progress.report(35, "Decoding pack");
        let (store, walked) = tokio::task::spawn_blocking(move || -> Result<_> {
            let pack = extract_pack(&response, side_band)?;
            let mut store = ObjectStore::new();
            decode_pack(&pack, &mut store)?;
            let tree = store.commit_tree(&want)?;
            let walked = store.walk_tree(&tree)?;
            Ok((store, walked))
        })
        .await
        .map_err(|e| Error::Internal(anyhow!("pack decoding panicked: {}", e)))??;

        let mut entries = Vec::with_capacity(walked.len());
        let mut blobs = HashMap::new();
        for item in walked {
            if item.is_dir {
                entries.push(RawEntry::dir(item.path));
            } else {
                if let Some(id) = item.blob {
                    blobs.insert(item.path.clone(), id);
                }
                entries.push(RawEntry::file(item.path, item.size));
            }
        }
        log::info!(
            "Fetched {} in memory ({} objects, {} entries)",
            reference.short_name(),
            store.len(),
            entries.len()
        );
        progress.report(PROGRESS_ACQUIRED, "Fetch complete");

        Ok(Box::new(VirtualSnapshot {
            store,
            entries,
            blobs,
            branch,
        }))
    }
}

struct VirtualSnapshot {
    store: ObjectStore,
    entries: Vec<RawEntry>,
    blobs: HashMap<String, ObjectId>,
    branch: Option<String>,
}

#[async_trait]
impl Snapshot for VirtualSnapshot {
    fn entries(&self) -> &[RawEntry] {
        &self.entries
    }

    fn resolved_branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    fn read_concurrency(&self) -> usize {
        MEMORY_READ_CONCURRENCY
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(path)
            .and_then(|id| self.store.get(id))
            .map(|(_, data)| data.to_vec())
            .ok_or_else(|| Error::NotFound(format!("'{}' is not in the fetched tree", path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAD_ID: &str = "1111111111111111111111111111111111111111";
    const DEV_ID: &str = "2222222222222222222222222222222222222222";

    fn advertisement_body() -> Vec<u8> {
        let mut body = encode(b"# service=git-upload-pack\n");
        body.extend_from_slice(FLUSH);
        body.extend(encode(
            format!(
                "{} HEAD\0multi_ack side-band-64k ofs-delta shallow symref=HEAD:refs/heads/main agent=git/2\n",
                HEAD_ID
            )
            .as_bytes(),
        ));
        body.extend(encode(format!("{} refs/heads/main\n", HEAD_ID).as_bytes()));
        body.extend(encode(format!("{} refs/heads/dev\n", DEV_ID).as_bytes()));
        body.extend_from_slice(FLUSH);
        body
    }

    #[test]
    fn test_parse_advertisement() {
        let adv = parse_advertisement(&advertisement_body()).unwrap();
        assert_eq!(adv.refs.len(), 3);
        assert!(adv.has_capability("side-band-64k"));
        assert_eq!(adv.head_branch(), Some("main"));
    }

    #[test]
    fn test_select_refs() {
        let adv = parse_advertisement(&advertisement_body()).unwrap();
        let (id, branch) = adv.select(None).unwrap();
        assert_eq!(id.to_string(), HEAD_ID);
        assert_eq!(branch.as_deref(), Some("main"));

        let (id, branch) = adv.select(Some("dev")).unwrap();
        assert_eq!(id.to_string(), DEV_ID);
        assert_eq!(branch.as_deref(), Some("dev"));

        assert!(matches!(adv.select(Some("nope")), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_empty_repository_has_no_head() {
        let mut body = encode(b"# service=git-upload-pack\n");
        body.extend_from_slice(FLUSH);
        body.extend(encode(
            b"0000000000000000000000000000000000000000 capabilities^{}\0side-band-64k\n",
        ));
        body.extend_from_slice(FLUSH);
        let adv = parse_advertisement(&body).unwrap();
        assert!(adv.refs.is_empty());
        assert!(matches!(adv.select(None), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_upload_request_only_uses_advertised_capabilities() {
        let adv = parse_advertisement(&advertisement_body()).unwrap();
        let want = ObjectId::from_hex(HEAD_ID).unwrap();
        let body = String::from_utf8(build_upload_request(&want, &adv)).unwrap();
        assert!(body.contains("want 1111111111111111111111111111111111111111 side-band-64k ofs-delta shallow agent=repodigest/"));
        assert!(!body.contains("no-progress"));
        assert!(body.contains("deepen 1\n"));
        assert!(body.ends_with("00000009done\n"));
    }

    #[test]
    fn test_extract_pack_skips_shallow_section() {
        let mut response = encode(format!("shallow {}\n", HEAD_ID).as_bytes());
        response.extend_from_slice(FLUSH);
        response.extend(encode(b"NAK\n"));
        response.extend(encode(b"\x01PACKDATA"));
        response.extend_from_slice(FLUSH);
        assert_eq!(extract_pack(&response, true).unwrap(), b"PACKDATA".to_vec());

        let mut plain = encode(b"NAK\n");
        plain.extend_from_slice(b"PACKRAW");
        assert_eq!(extract_pack(&plain, false).unwrap(), b"PACKRAW".to_vec());
    }

    #[test]
    fn test_extract_pack_reports_err_lines() {
        let response = encode(b"ERR upload-pack: not our ref\n");
        assert!(matches!(
            extract_pack(&response, true),
            Err(Error::NetworkOrProtocolError(_))
        ));
    }

    #[test]
    fn test_repo_base_url_with_proxy() {
        let reference = RepoReference::resolve("gitlab.com/group/project").unwrap();
        let direct = VirtualCloneAcquirer::new(None).unwrap();
        assert_eq!(direct.repo_base_url(&reference), "https://gitlab.com/group/project.git");
        let proxied = VirtualCloneAcquirer::new(Some("https://relay.example/".into())).unwrap();
        assert_eq!(
            proxied.repo_base_url(&reference),
            "https://relay.example/gitlab.com/group/project.git"
        );
    }
}
