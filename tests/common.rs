// tests/common.rs

#![allow(dead_code)] // Each integration test uses a different subset of these helpers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use std::collections::BTreeSet;
use std::process::Command;
use std::sync::Arc;

// Helper function to get the binary command
pub fn repodigest_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("repodigest"))
}

/// Serves `router` on an ephemeral localhost port and returns its base URL.
pub async fn serve(router: Router) -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{}", addr))
}

// --- Mock GitHub API and raw-content host ---

/// A repository as the mock GitHub serves it.
#[derive(Clone, Debug)]
pub struct MockRepo {
    pub owner: String,
    pub repo: String,
    pub default_branch: String,
    pub files: Vec<(String, Vec<u8>)>,
    /// When set, requests must carry `Authorization: Bearer <token>`.
    pub required_token: Option<String>,
}

impl MockRepo {
    pub fn new(owner: &str, repo: &str, files: &[(&str, &[u8])]) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            default_branch: "master".to_string(),
            files: files
                .iter()
                .map(|(p, b)| (p.to_string(), b.to_vec()))
                .collect(),
            required_token: None,
        }
    }

    pub fn private(mut self, token: &str) -> Self {
        self.required_token = Some(token.to_string());
        self
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        match &self.required_token {
            None => true,
            Some(token) => headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v == format!("Bearer {}", token))
                .unwrap_or(false),
        }
    }

    fn matches(&self, owner: &str, repo: &str) -> bool {
        self.owner == owner && self.repo == repo
    }

    fn tree_json(&self) -> serde_json::Value {
        let mut dirs = BTreeSet::new();
        for (path, _) in &self.files {
            let mut current = path.as_str();
            while let Some((parent, _)) = current.rsplit_once('/') {
                dirs.insert(parent.to_string());
                current = parent;
            }
        }
        let mut tree: Vec<serde_json::Value> = dirs
            .into_iter()
            .map(|d| serde_json::json!({ "path": d, "type": "tree", "mode": "040000" }))
            .collect();
        tree.extend(self.files.iter().map(|(path, bytes)| {
            serde_json::json!({ "path": path, "type": "blob", "mode": "100644", "size": bytes.len() })
        }));
        serde_json::json!({ "sha": "0000", "tree": tree, "truncated": false })
    }
}

fn bad_credentials() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "message": "Bad credentials" })),
    )
        .into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "message": "Not Found" })),
    )
        .into_response()
}

async fn repo_info(
    State(mock): State<Arc<MockRepo>>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !mock.authorized(&headers) {
        return bad_credentials();
    }
    if !mock.matches(&owner, &repo) {
        return not_found();
    }
    Json(serde_json::json!({
        "full_name": format!("{}/{}", owner, repo),
        "default_branch": mock.default_branch,
    }))
    .into_response()
}

async fn tree_listing(
    State(mock): State<Arc<MockRepo>>,
    Path((owner, repo, branch)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if !mock.authorized(&headers) {
        return bad_credentials();
    }
    if !mock.matches(&owner, &repo) || branch != mock.default_branch {
        return not_found();
    }
    Json(mock.tree_json()).into_response()
}

async fn raw_file(
    State(mock): State<Arc<MockRepo>>,
    Path((owner, repo, branch, path)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if !mock.authorized(&headers) {
        return bad_credentials();
    }
    if !mock.matches(&owner, &repo) || branch != mock.default_branch {
        return not_found();
    }
    match mock.files.iter().find(|(p, _)| *p == path) {
        Some((_, bytes)) => (StatusCode::OK, bytes.clone()).into_response(),
        None => not_found(),
    }
}

/// Starts a mock `api.github.com` and `raw.githubusercontent.com` for `mock`.
///
/// Returns `(api_base_url, raw_base_url)`.
pub async fn spawn_github(mock: MockRepo) -> anyhow::Result<(String, String)> {
    let mock = Arc::new(mock);
    let api = Router::new()
        .route("/repos/:owner/:repo", get(repo_info))
        .route("/repos/:owner/:repo/git/trees/:branch", get(tree_listing))
        .with_state(mock.clone());
    let raw = Router::new()
        .route("/:owner/:repo/:branch/*path", get(raw_file))
        .with_state(mock);
    Ok((serve(api).await?, serve(raw).await?))
}

// --- Fixture repositories built with libgit2 ---

/// Creates a non-bare repository in `dir` on branch `main` with one commit holding `files`.
pub fn fixture_repo(
    dir: &std::path::Path,
    files: &[(&str, &[u8])],
) -> anyhow::Result<(git2::Repository, git2::Oid)> {
    let mut opts = git2::RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = git2::Repository::init_opts(dir, &opts)?;

    let commit = {
        let mut index = repo.index()?;
        for (path, bytes) in files {
            let full = dir.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full, bytes)?;
            index.add_path(std::path::Path::new(path))?;
        }
        index.write()?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let sig = git2::Signature::now("Fixture", "fixture@example.com")?;
        repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])?
    };
    Ok((repo, commit))
}

/// A packfile holding `commit` and everything reachable from its tree.
pub fn pack_for(repo: &git2::Repository, commit: git2::Oid) -> anyhow::Result<Vec<u8>> {
    let mut builder = repo.packbuilder()?;
    builder.insert_commit(commit)?;
    let mut buf = git2::Buf::new();
    builder.write_buf(&mut buf)?;
    Ok(buf.to_vec())
}

// --- Mock smart-HTTP git server ---

fn pkt(payload: &[u8]) -> Vec<u8> {
    let mut out = format!("{:04x}", payload.len() + 4).into_bytes();
    out.extend_from_slice(payload);
    out
}

/// The `Authorization` value a client sends for HTTP basic auth.
pub fn basic_auth_header(user: &str, password: Option<&str>) -> String {
    let credentials = format!("{}:{}", user, password.unwrap_or_default());
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(credentials)
    )
}

struct SmartHttp {
    head: String,
    pack: Vec<u8>,
    /// When set, both endpoints require exactly this `Authorization` header.
    authorization: Option<String>,
}

impl SmartHttp {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        match &self.authorization {
            None => true,
            Some(expected) => headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v == expected)
                .unwrap_or(false),
        }
    }
}

fn auth_required() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"git\"")],
        "authentication required",
    )
        .into_response()
}

async fn info_refs(State(server): State<Arc<SmartHttp>>, headers: HeaderMap) -> Response {
    if !server.authorized(&headers) {
        return auth_required();
    }
    let mut body = pkt(b"# service=git-upload-pack\n");
    body.extend_from_slice(b"0000");
    body.extend(pkt(
        format!(
            "{} HEAD\0side-band-64k ofs-delta shallow no-progress symref=HEAD:refs/heads/main agent=git/mock\n",
            server.head
        )
        .as_bytes(),
    ));
    body.extend(pkt(format!("{} refs/heads/main\n", server.head).as_bytes()));
    body.extend_from_slice(b"0000");
    (
        [(
            header::CONTENT_TYPE,
            "application/x-git-upload-pack-advertisement",
        )],
        body,
    )
        .into_response()
}

async fn upload_pack(
    State(server): State<Arc<SmartHttp>>,
    headers: HeaderMap,
    request: Bytes,
) -> Response {
    if !server.authorized(&headers) {
        return auth_required();
    }
    let text = String::from_utf8_lossy(&request);
    if !text.contains(&format!("want {}", server.head)) {
        return (StatusCode::BAD_REQUEST, "unexpected want").into_response();
    }
    let mut body = Vec::new();
    if text.contains("deepen 1") {
        body.extend(pkt(format!("shallow {}\n", server.head).as_bytes()));
        body.extend_from_slice(b"0000");
    }
    body.extend(pkt(b"NAK\n"));
    for chunk in server.pack.chunks(65515) {
        let mut framed = vec![1u8];
        framed.extend_from_slice(chunk);
        body.extend(pkt(&framed));
    }
    body.extend_from_slice(b"0000");
    (
        [(header::CONTENT_TYPE, "application/x-git-upload-pack-result")],
        body,
    )
        .into_response()
}

/// Serves `pack` for `owner/repo` over smart HTTP; returns the server's base URL.
pub async fn spawn_smart_http(
    owner: &str,
    repo: &str,
    head: git2::Oid,
    pack: Vec<u8>,
) -> anyhow::Result<String> {
    spawn_smart_http_at(&format!("/{}/{}.git", owner, repo), head, pack, None).await
}

/// Serves `pack` under the repository path `prefix` (e.g. `/gitlab.com/o/r.git`
/// when standing in for a CORS relay), optionally requiring `authorization`.
pub async fn spawn_smart_http_at(
    prefix: &str,
    head: git2::Oid,
    pack: Vec<u8>,
    authorization: Option<String>,
) -> anyhow::Result<String> {
    let state = Arc::new(SmartHttp {
        head: head.to_string(),
        pack,
        authorization,
    });
    let router = Router::new()
        .route(&format!("{}/info/refs", prefix), get(info_refs))
        .route(&format!("{}/git-upload-pack", prefix), post(upload_pack))
        .with_state(state);
    serve(router).await
}
