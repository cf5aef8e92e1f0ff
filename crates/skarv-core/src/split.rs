// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Markdown-safe split points for incremental text rendering.
//!
//! Long model responses are flushed to the transcript in finalized blocks so
//! the UI never re-renders the whole message.  A block may only end at a
//! line boundary that is outside a code fence and not inside an unclosed
//! inline span on the final line.

/// Byte index of the last safe split point in `text`: the position just
/// after a newline that is not inside a ``` fence.  Returns 0 when no safe
/// split exists (no newline yet, or everything after the last boundary is
/// fenced).
pub fn find_last_safe_split_point(text: &str) -> usize {
    let mut in_fence = false;
    let mut last_safe = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        offset += line.len();
        if !in_fence && line.ends_with('\n') {
            last_safe = offset;
        }
    }
    last_safe
}

/// Whether the final (partial) line of `text` has an unclosed inline code
/// span.  Used to keep a pending block pending rather than flushing a broken
/// backtick pair into the transcript.
pub fn has_unclosed_inline_span(text: &str) -> bool {
    let tail = text.rsplit('\n').next().unwrap_or(text);
    tail.matches('`').count() % 2 == 1
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_newline_means_no_split() {
        assert_eq!(find_last_safe_split_point("partial line"), 0);
    }

    #[test]
    fn splits_after_last_complete_line() {
        let text = "first line\nsecond line\npartial";
        let split = find_last_safe_split_point(text);
        assert_eq!(&text[..split], "first line\nsecond line\n");
    }

    #[test]
    fn split_at_end_when_text_ends_with_newline() {
        let text = "one\ntwo\n";
        assert_eq!(find_last_safe_split_point(text), text.len());
    }

    #[test]
    fn never_splits_inside_a_code_fence() {
        let text = "intro\n```rust\nlet x = 1;\nlet y = 2;\n";
        let split = find_last_safe_split_point(text);
        assert_eq!(&text[..split], "intro\n");
    }

    #[test]
    fn splits_after_a_closed_fence() {
        let text = "intro\n```\ncode\n```\nafter\n";
        assert_eq!(find_last_safe_split_point(text), text.len());
    }

    #[test]
    fn reopened_fence_moves_split_back() {
        let text = "a\n```\ncode\n```\nb\n```\nmore code\n";
        let split = find_last_safe_split_point(text);
        assert_eq!(&text[..split], "a\n```\ncode\n```\nb\n");
    }

    #[test]
    fn indented_fence_markers_still_toggle() {
        let text = "a\n  ```\ncode\n";
        let split = find_last_safe_split_point(text);
        assert_eq!(&text[..split], "a\n");
    }

    #[test]
    fn empty_text_has_no_split() {
        assert_eq!(find_last_safe_split_point(""), 0);
    }

    #[test]
    fn unclosed_inline_span_detection() {
        assert!(has_unclosed_inline_span("see `code"));
        assert!(!has_unclosed_inline_span("see `code`"));
        assert!(!has_unclosed_inline_span("done\n`a` then `b`"));
        assert!(has_unclosed_inline_span("closed `x`\nnow `open"));
    }
}
