//! Removal of the model's thinking markup.
//!
//! Reasoning models wrap their trace in `<think>...</think>` and sometimes
//! leave a bare `Thinking:` label behind. None of it may reach the user.

use std::sync::LazyLock;

use regex::Regex;

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Everything outside a span that must not be split across fragments.
const OUTSIDE_MARKERS: [&str; 3] = [OPEN_TAG, "Thinking:", "thinking:"];

static THINK_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("Invalid think-span regex"));

static THINKING_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Thinking:|thinking:").expect("Invalid thinking-label regex"));

/// Strip thinking spans and labels from a complete response, then trim.
pub fn clean_response(text: &str) -> String {
    let without_spans = THINK_SPAN_RE.replace_all(text, "");
    let without_labels = THINKING_LABEL_RE.replace_all(&without_spans, "");
    without_labels.trim().to_string()
}

/// Incremental cleaner for streamed fragments.
///
/// Tracks whether the stream is inside a thinking span so that a span opened
/// in one fragment and closed in a later one is suppressed entirely, and holds
/// back a fragment tail that could be the start of a tag or label. Fragments are not
/// trimmed: whitespace between tokens is meaningful.
#[derive(Debug, Default)]
pub struct StreamCleaner {
    in_think: bool,
    carry: String,
}

impl StreamCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next raw fragment, returning the text safe to show.
    pub fn feed(&mut self, fragment: &str) -> String {
        let mut text = std::mem::take(&mut self.carry);
        text.push_str(fragment);

        let mut out = String::new();
        let mut rest = text.as_str();

        loop {
            if self.in_think {
                match rest.find(CLOSE_TAG) {
                    Some(pos) => {
                        rest = &rest[pos + CLOSE_TAG.len()..];
                        self.in_think = false;
                    }
                    None => {
                        let keep = partial_tag_suffix(rest, CLOSE_TAG);
                        self.carry = rest[rest.len() - keep..].to_string();
                        break;
                    }
                }
            } else {
                match rest.find(OPEN_TAG) {
                    Some(pos) => {
                        out.push_str(&rest[..pos]);
                        rest = &rest[pos + OPEN_TAG.len()..];
                        self.in_think = true;
                    }
                    None => {
                        let keep = OUTSIDE_MARKERS
                            .iter()
                            .map(|marker| partial_tag_suffix(rest, marker))
                            .max()
                            .unwrap_or(0);
                        out.push_str(&rest[..rest.len() - keep]);
                        self.carry = rest[rest.len() - keep..].to_string();
                        break;
                    }
                }
            }
        }

        THINKING_LABEL_RE.replace_all(&out, "").into_owned()
    }

    /// Release any held-back text once the stream has ended.
    pub fn finish(&mut self) -> String {
        let carry = std::mem::take(&mut self.carry);
        if self.in_think {
            String::new()
        } else {
            THINKING_LABEL_RE.replace_all(&carry, "").into_owned()
        }
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `tag`.
fn partial_tag_suffix(text: &str, tag: &str) -> usize {
    let max = (tag.len() - 1).min(text.len());
    (1..=max)
        .rev()
        .find(|&n| text.is_char_boundary(text.len() - n) && tag.starts_with(&text[text.len() - n..]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_think_span() {
        assert_eq!(clean_response("<think>reasoning</think>Hello"), "Hello");
    }

    #[test]
    fn test_clean_removes_multiline_think_span() {
        let text = "<think>\nstep one\nstep two\n</think>\n\nHere you go!";
        assert_eq!(clean_response(text), "Here you go!");
    }

    #[test]
    fn test_clean_removes_multiple_spans_non_greedy() {
        let text = "<think>a</think>keep<think>b</think> this";
        assert_eq!(clean_response(text), "keep this");
    }

    #[test]
    fn test_clean_strips_thinking_prefix() {
        assert_eq!(clean_response("Thinking: Sure, here is a song."), "Sure, here is a song.");
        assert_eq!(clean_response("thinking: ok"), "ok");
    }

    #[test]
    fn test_clean_leaves_plain_text() {
        assert_eq!(clean_response("  just text \n"), "just text");
    }

    #[test]
    fn test_clean_unclosed_span_is_left_alone() {
        // Only paired markers are removed.
        assert_eq!(clean_response("<think>never closed"), "<think>never closed");
    }

    #[test]
    fn test_stream_cleaner_single_fragment() {
        let mut cleaner = StreamCleaner::new();
        assert_eq!(cleaner.feed("<think>hmm</think>Hello"), "Hello");
    }

    #[test]
    fn test_stream_cleaner_span_across_fragments() {
        let mut cleaner = StreamCleaner::new();
        let mut out = String::new();
        for frag in ["<think>", "the user", " wants jazz", "</think>", "Sure", ", jazz it is"] {
            out.push_str(&cleaner.feed(frag));
        }
        out.push_str(&cleaner.finish());
        assert_eq!(out, "Sure, jazz it is");
    }

    #[test]
    fn test_stream_cleaner_tag_split_across_fragments() {
        let mut cleaner = StreamCleaner::new();
        let mut out = String::new();
        for frag in ["Hi <thi", "nk>secret</th", "ink> there"] {
            out.push_str(&cleaner.feed(frag));
        }
        out.push_str(&cleaner.finish());
        assert_eq!(out, "Hi  there");
    }

    #[test]
    fn test_stream_cleaner_preserves_token_spacing() {
        let mut cleaner = StreamCleaner::new();
        assert_eq!(cleaner.feed("Hello"), "Hello");
        assert_eq!(cleaner.feed(" world"), " world");
    }

    #[test]
    fn test_stream_cleaner_releases_lone_angle_bracket() {
        let mut cleaner = StreamCleaner::new();
        assert_eq!(cleaner.feed("a <"), "a ");
        assert_eq!(cleaner.feed(" b"), "< b");
        let mut cleaner = StreamCleaner::new();
        assert_eq!(cleaner.feed("x <"), "x ");
        assert_eq!(cleaner.finish(), "<");
    }

    #[test]
    fn test_stream_cleaner_drops_unterminated_span_on_finish() {
        let mut cleaner = StreamCleaner::new();
        assert_eq!(cleaner.feed("<think>still going"), "");
        assert_eq!(cleaner.finish(), "");
    }

    #[test]
    fn test_stream_cleaner_strips_label() {
        let mut cleaner = StreamCleaner::new();
        assert_eq!(cleaner.feed("Thinking: ok"), " ok");
    }

    #[test]
    fn test_stream_cleaner_strips_label_split_across_fragments() {
        let mut cleaner = StreamCleaner::new();
        assert_eq!(cleaner.feed("Think"), "");
        assert_eq!(cleaner.feed("ing: hi"), " hi");

        let mut cleaner = StreamCleaner::new();
        let mut out = String::new();
        for frag in ["ok thin", "king", ": fine"] {
            out.push_str(&cleaner.feed(frag));
        }
        out.push_str(&cleaner.finish());
        assert_eq!(out, "ok  fine");
    }

    #[test]
    fn test_stream_cleaner_releases_unfinished_label_prefix() {
        let mut cleaner = StreamCleaner::new();
        assert_eq!(cleaner.feed("Hello"), "Hello");
        assert_eq!(cleaner.feed(" Thin"), " ");
        assert_eq!(cleaner.feed("gs"), "Things");
        assert_eq!(cleaner.finish(), "");
    }

    #[test]
    fn test_partial_tag_suffix() {
        assert_eq!(partial_tag_suffix("abc<th", OPEN_TAG), 3);
        assert_eq!(partial_tag_suffix("abc", OPEN_TAG), 0);
        assert_eq!(partial_tag_suffix("<", CLOSE_TAG), 1);
        assert_eq!(partial_tag_suffix("x</thin", CLOSE_TAG), 6);
        assert_eq!(partial_tag_suffix("", OPEN_TAG), 0);
    }
}
