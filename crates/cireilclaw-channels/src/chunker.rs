//! Splits outbound content into platform-sized chunks, tracking open code
//! fences across the split so no chunk ever ends mid-fence.

/// Stays safely under every supported platform's single-message limit
/// (e.g. Discord's 2000 chars).
const CHUNK_LIMIT: usize = 1800;

/// Split `text` into chunks of at most [`CHUNK_LIMIT`] bytes, preferring a
/// newline/space boundary within the window. A fence left open by a cut is
/// closed at the end of that chunk and reopened with the same marker line
/// at the start of the next one, so every chunk is independently valid
/// Markdown.
pub fn split_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;
    let mut open_fence: Option<String> = None;

    loop {
        if remaining.len() <= CHUNK_LIMIT {
            if !remaining.is_empty() || !chunks.is_empty() {
                chunks.push(reopen(&open_fence) + remaining);
            }
            break;
        }

        let window_end = char_boundary_at_or_below(remaining, CHUNK_LIMIT);
        let window = &remaining[..window_end];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .unwrap_or(window_end);

        let piece = &remaining[..split_at];
        let closing_state = track_fences(piece, open_fence.clone());

        let mut chunk = reopen(&open_fence);
        chunk.push_str(piece);
        if closing_state.is_some() {
            chunk.push_str("\n```");
        }
        chunks.push(chunk);

        open_fence = closing_state;
        remaining = remaining[split_at..].trim_start();
    }

    if chunks.is_empty() {
        chunks.push(String::new());
    }
    chunks
}

fn reopen(marker: &Option<String>) -> String {
    match marker {
        Some(m) => format!("{m}\n"),
        None => String::new(),
    }
}

/// Walk `piece` line by line, toggling fence state. `None` means not
/// currently inside a fence — per the source's `openFence !== null` check,
/// entering a fence-start line while `None` arms it; encountering another
/// fence line while armed closes it.
fn track_fences(piece: &str, mut state: Option<String>) -> Option<String> {
    for line in piece.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            state = match state {
                None => Some(trimmed.to_string()),
                Some(_) => None,
            };
        }
    }
    state
}

fn char_boundary_at_or_below(s: &str, limit: usize) -> usize {
    if s.len() <= limit {
        return s.len();
    }
    let mut end = limit;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = split_chunks("hello");
        assert_eq!(chunks, vec!["hello".to_string()]);
    }

    #[test]
    fn empty_text_is_single_empty_chunk() {
        assert_eq!(split_chunks(""), vec![String::new()]);
    }

    #[test]
    fn no_chunk_exceeds_limit() {
        let text = "word ".repeat(1000);
        for chunk in split_chunks(&text) {
            assert!(chunk.len() <= CHUNK_LIMIT + "```".len());
        }
    }

    #[test]
    fn splits_reconstruct_with_single_newline_separator() {
        let line = "a".repeat(1000);
        let text = format!("{line}\n{line}");
        let chunks = split_chunks(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(format!("{}\n{}", chunks[0], chunks[1]), text);
    }

    #[test]
    fn unclosed_fence_is_closed_at_cut_and_reopened() {
        let body = "x".repeat(CHUNK_LIMIT + 200);
        let text = format!("intro\n```rust\n{body}\nend\n```\noutro");
        let chunks = split_chunks(&text);
        assert!(chunks.len() >= 2);
        // every chunk but the last is valid Markdown on its own: an even
        // number of fence-start lines, i.e. it doesn't end mid-fence.
        for chunk in &chunks[..chunks.len() - 1] {
            let fence_lines = chunk.lines().filter(|l| l.trim_start().starts_with("```")).count();
            assert_eq!(fence_lines % 2, 0, "chunk ends inside an open fence: {chunk:?}");
        }
        assert!(chunks[1].starts_with("```rust\n"));
    }

    #[test]
    fn very_long_unbroken_word_still_splits() {
        let text = "x".repeat(CHUNK_LIMIT * 3);
        let chunks = split_chunks(&text);
        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.len() <= CHUNK_LIMIT);
        }
    }
}
