// src/output/content.rs

use crate::constants::FILE_SEPARATOR;
use crate::core_types::FileRecord;
use log::debug;

/// Concatenates files in the order given, each framed by a `File:` header.
///
/// Every block is the separator, `File: <path>`, the separator again, the
/// content (or the binary sentinel) and one blank line.
///
/// # Examples
///
/// ```
/// use repodigest::core_types::{FileContent, FileRecord};
/// use repodigest::output::aggregate;
///
/// let files = vec![FileRecord {
///     path: "README".to_string(),
///     size: 5,
///     content: FileContent::Text("hello".to_string()),
/// }];
/// let sep = "=".repeat(48);
/// assert_eq!(aggregate(&files), format!("{sep}\nFile: README\n{sep}\nhello\n\n"));
/// ```
pub fn aggregate(files: &[FileRecord]) -> String {
    let capacity: usize = files
        .iter()
        .map(|f| f.content.as_str().len() + f.path.len() + 2 * FILE_SEPARATOR.len() + 12)
        .sum();
    let mut out = String::with_capacity(capacity);
    for file in files {
        out.push_str(&file_block(&file.path, file.content.as_str()));
    }
    debug!("Aggregated {} files into {} bytes", files.len(), out.len());
    out
}

fn file_block(path: &str, content: &str) -> String {
    format!(
        "{sep}\nFile: {path}\n{sep}\n{content}\n\n",
        sep = FILE_SEPARATOR,
        path = path,
        content = content
    )
}

/// Recovers ordered `(path, content)` pairs from a digest (`tree + "\n\n" + content`).
///
/// The parser is naive: a file whose content itself contains a blank line
/// followed by a separator and `File: ` header will be split there.
pub fn parse_digest(digest: &str) -> Vec<(String, String)> {
    let header = format!("{}\nFile: ", FILE_SEPARATOR);
    let boundary = format!("\n\n{}", header);
    let mut pairs = Vec::new();

    let mut rest = match digest.find(&header) {
        Some(start) => &digest[start..],
        None => return pairs,
    };

    while let Some(after_header) = rest.strip_prefix(header.as_str()) {
        let Some((path, after_path)) = after_header.split_once('\n') else {
            break;
        };
        let Some(body) = after_path
            .strip_prefix(FILE_SEPARATOR)
            .and_then(|s| s.strip_prefix('\n'))
        else {
            break;
        };
        match body.find(&boundary) {
            Some(end) => {
                pairs.push((path.to_string(), body[..end].to_string()));
                rest = &body[end + 2..];
            }
            None => {
                let content = body.strip_suffix("\n\n").unwrap_or(body);
                pairs.push((path.to_string(), content.to_string()));
                break;
            }
        }
    }
    pairs
}
