//! Handles the reading stage of the pipeline.
//!
//! Selected files are read from the snapshot in fixed-width batches: every
//! read of a batch runs concurrently, batches run strictly one after another,
//! and progress moves from 50 towards 100 after each batch. Bytes are decoded
//! as UTF-8; anything else becomes the binary sentinel instead of an error.

use crate::acquire::Snapshot;
use crate::constants::{PROGRESS_ACQUIRED, PROGRESS_TOTAL};
use crate::core_types::{FileRecord, RawEntry};
use crate::errors::Result;
use crate::filtering::decode_content;
use crate::progress::Progress;
use futures::future::join_all;
use log::debug;

mod tokens;

pub use tokens::{count_tokens, estimate_tokens, estimate_tokens_async, format_token_count};

/// Reads and decodes `files` in the order given.
///
/// # Errors
/// The first failed read aborts the whole stage; decode problems never do.
pub async fn read_files(
    snapshot: &dyn Snapshot,
    files: &[RawEntry],
    progress: &Progress,
) -> Result<Vec<FileRecord>> {
    let width = snapshot.read_concurrency().max(1);
    let total = files.len() as u64;
    let mut records = Vec::with_capacity(files.len());

    for batch in files.chunks(width) {
        let reads = batch.iter().map(|entry| snapshot.read_file(&entry.path));
        let results = join_all(reads).await;

        for (entry, result) in batch.iter().zip(results) {
            let bytes = result?;
            let content = decode_content(bytes);
            if content.is_binary() {
                debug!("Binary content in {}", entry.path);
            }
            records.push(FileRecord {
                path: entry.path.clone(),
                size: entry.size,
                content,
            });
        }

        progress.report_fraction(
            PROGRESS_ACQUIRED,
            PROGRESS_TOTAL,
            records.len() as u64,
            total,
            format!("Read {}/{} files", records.len(), total),
        );
    }

    if files.is_empty() {
        progress.report(PROGRESS_TOTAL, "No files to read");
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::FileContent;
    use crate::errors::Error;
    use crate::progress::channel;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MemorySnapshot {
        files: HashMap<String, Vec<u8>>,
        entries: Vec<RawEntry>,
        width: usize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MemorySnapshot {
        fn new(files: &[(&str, &[u8])], width: usize) -> Self {
            Self {
                entries: files
                    .iter()
                    .map(|(p, b)| RawEntry::file(*p, b.len() as u64))
                    .collect(),
                files: files
                    .iter()
                    .map(|(p, b)| (p.to_string(), b.to_vec()))
                    .collect(),
                width,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Snapshot for MemorySnapshot {
        fn entries(&self) -> &[RawEntry] {
            &self.entries
        }
        fn resolved_branch(&self) -> Option<&str> {
            None
        }
        fn read_concurrency(&self) -> usize {
            self.width
        }
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| Error::NotFound(path.to_string()))
        }
    }

    #[tokio::test]
    async fn test_reads_in_order_with_binary_sentinel() {
        let snapshot = MemorySnapshot::new(
            &[
                ("a.txt", &b"alpha"[..]),
                ("b.bin", &[0u8, 159, 146, 150][..]),
                ("c.txt", &b"gamma"[..]),
            ],
            2,
        );
        let entries = snapshot.entries().to_vec();
        let records = read_files(&snapshot, &entries, &Progress::disabled())
            .await
            .unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.bin", "c.txt"]);
        assert_eq!(records[0].content, FileContent::Text("alpha".into()));
        assert_eq!(records[1].content, FileContent::Binary);
    }

    #[tokio::test]
    async fn test_batches_never_exceed_width() {
        let data: Vec<(String, Vec<u8>)> = (0..12)
            .map(|i| (format!("f{}.txt", i), b"x".to_vec()))
            .collect();
        let borrowed: Vec<(&str, &[u8])> = data
            .iter()
            .map(|(p, b)| (p.as_str(), b.as_slice()))
            .collect();
        let snapshot = MemorySnapshot::new(&borrowed, 5);
        let entries = snapshot.entries().to_vec();
        read_files(&snapshot, &entries, &Progress::disabled())
            .await
            .unwrap();
        let max = snapshot.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 5, "max in flight was {}", max);
        assert!(max > 1, "reads within a batch should overlap");
    }

    #[tokio::test]
    async fn test_progress_reaches_100_after_last_batch() {
        let snapshot = MemorySnapshot::new(&[("a", &b"1"[..]), ("b", &b"2"[..]), ("c", &b"3"[..])], 2);
        let entries = snapshot.entries().to_vec();
        let (progress, events) = channel();
        progress.report(PROGRESS_ACQUIRED, "acquired");
        read_files(&snapshot, &entries, &progress).await.unwrap();
        drop(progress);
        let values: Vec<u64> = events.map(|e| e.current).collect().await;
        assert_eq!(values, vec![50, 83, 100]);
    }

    #[tokio::test]
    async fn test_read_failure_propagates() {
        let snapshot = MemorySnapshot::new(&[("a", &b"1"[..])], 1);
        let missing = vec![RawEntry::file("ghost", 1)];
        let result = read_files(&snapshot, &missing, &Progress::disabled()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
