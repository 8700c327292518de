// src/processing/tokens.rs

use crate::constants::{EXACT_TOKEN_LIMIT_BYTES, TOKEN_CHUNK_BYTES};
use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;

/// The `o200k_base` encoder, loaded on first use. `None` if it failed to load.
static ENCODER: Lazy<Option<CoreBPE>> = Lazy::new(|| match tiktoken_rs::o200k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        log::warn!("Token estimation unavailable: {}", e);
        None
    }
});

/// Splits `text` into pieces of at most `max` bytes on char boundaries,
/// cutting after the last newline of a window when there is one.
fn chunks(text: &str, max: usize) -> Vec<&str> {
    let max = max.max(4);
    let mut out = Vec::new();
    let mut rest = text;
    while rest.len() > max {
        let mut end = max;
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if let Some(newline) = rest[..end].rfind('\n') {
            if newline > 0 {
                end = newline + 1;
            }
        }
        let (head, tail) = rest.split_at(end);
        out.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

/// Counts `o200k_base` tokens in `text`, or `None` if the encoder is unavailable.
///
/// BPE merging is superlinear in the length of a single piece, so the text is
/// encoded in bounded chunks. Past [`EXACT_TOKEN_LIMIT_BYTES`] the count is
/// approximated as one token per four bytes.
///
/// This is CPU bound; async callers should use [`estimate_tokens_async`].
pub fn count_tokens(text: &str) -> Option<usize> {
    let bpe = ENCODER.as_ref()?;
    if text.len() > EXACT_TOKEN_LIMIT_BYTES {
        log::debug!(
            "Approximating token count for {} bytes of text",
            text.len()
        );
        return Some(text.len().div_ceil(4));
    }
    Some(
        chunks(text, TOKEN_CHUNK_BYTES)
            .into_iter()
            .map(|chunk| bpe.encode_ordinary(chunk).len())
            .sum(),
    )
}

/// Formats a token count: plain below 1 000, `k` below 1 000 000, `M` above.
///
/// # Examples
///
/// ```
/// use repodigest::processing::format_token_count;
///
/// assert_eq!(format_token_count(500), "500");
/// assert_eq!(format_token_count(1_500), "1.5k");
/// assert_eq!(format_token_count(2_500_000), "2.5M");
/// ```
pub fn format_token_count(count: usize) -> String {
    if count < 1_000 {
        count.to_string()
    } else if count < 1_000_000 {
        format!("{:.1}k", count as f64 / 1_000.0)
    } else {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    }
}

/// Estimates and formats the token count of `text`. `None` when estimation fails.
pub fn estimate_tokens(text: &str) -> Option<String> {
    count_tokens(text).map(format_token_count)
}

/// [`estimate_tokens`] on the blocking pool, so timeouts and cancellation of
/// the calling task still take effect while the encoder runs.
pub async fn estimate_tokens_async(text: String) -> Option<String> {
    match tokio::task::spawn_blocking(move || estimate_tokens(&text)).await {
        Ok(estimate) => estimate,
        Err(e) => {
            log::warn!("Token estimation task failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_boundaries() {
        assert_eq!(format_token_count(0), "0");
        assert_eq!(format_token_count(999), "999");
        assert_eq!(format_token_count(1_000), "1.0k");
        assert_eq!(format_token_count(999_999), "1000.0k");
        assert_eq!(format_token_count(1_000_000), "1.0M");
    }

    #[test]
    fn test_estimate_small_text() {
        // The encoder ships inside the crate, so estimation should succeed offline.
        let estimate = estimate_tokens("Hello, world!").expect("encoder should load");
        let n: usize = estimate.parse().unwrap();
        assert!(n > 0 && n < 10);
    }

    #[test]
    fn test_empty_text_has_zero_tokens() {
        assert_eq!(count_tokens(""), Some(0));
    }

    #[test]
    fn test_chunks_cover_text_on_char_boundaries() {
        let text = format!("{}\n{}é{}", "a".repeat(10), "b".repeat(7), "c".repeat(30));
        let pieces = chunks(&text, 16);
        assert_eq!(pieces.concat(), text);
        assert!(pieces.iter().all(|p| p.len() <= 16));
        // The first cut lands after the newline.
        assert_eq!(pieces[0], format!("{}\n", "a".repeat(10)));
        assert_eq!(chunks("", 16), Vec::<&str>::new());
    }

    #[test]
    fn test_long_single_line_is_counted_in_chunks() {
        let text = "x".repeat(TOKEN_CHUNK_BYTES * 3 + 17);
        let n = count_tokens(&text).expect("encoder should load");
        assert!(n > 0 && n <= text.len());
    }

    #[test]
    fn test_huge_text_is_approximated() {
        let text = "y".repeat(EXACT_TOKEN_LIMIT_BYTES + 5);
        assert_eq!(count_tokens(&text), Some((text.len() + 3) / 4));
    }

    #[tokio::test]
    async fn test_async_estimate_matches_blocking() {
        let text = "fn main() { println!(\"hi\"); }".to_string();
        assert_eq!(estimate_tokens_async(text.clone()).await, estimate_tokens(&text));
    }
}
