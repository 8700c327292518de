//! Renders the digest: the directory tree, the concatenated file contents,
//! and the summary block, plus writing the finished document out.

mod content;
mod summary;
mod tree;
mod writer;

pub use content::{aggregate, parse_digest};
pub use summary::{summarize, with_token_estimate};
pub use tree::{build_tree, compare_paths, sort_entries};
pub use writer::{render_document, write_document, OutputDestination};
