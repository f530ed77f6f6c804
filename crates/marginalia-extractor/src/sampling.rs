//! Bounded sampling of long texts
//!
//! All positions are character indices, so slicing never splits a code point.

/// Hard ceiling on a sample, whatever budget is requested (characters)
pub const MAX_SAMPLE_CHARS: usize = 30_000;

/// Byte offset of the character at `char_idx`, or the text length past the end
fn byte_offset(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

/// Characters `[start, end)` of `text`, clamped to its bounds
fn char_slice(text: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let from = byte_offset(text, start);
    let to = from + byte_offset(&text[from..], end - start);
    &text[from..to]
}

/// Build the beginning/middle/end sample of a book
///
/// With `L` characters of text and `budget = min(L, max_chars, MAX_SAMPLE_CHARS)`, the sample
/// concatenates the first `budget / 3` characters, `budget / 3` characters
/// starting at `max(0, L / 2 - budget / 6)`, and the last `budget / 3`
/// characters. The result never exceeds `budget` characters.
///
/// # Examples
///
/// ```
/// use marginalia_extractor::build_sample;
///
/// let text = "abcdefghijkl";
/// assert_eq!(build_sample(text, 6), "abfgkl");
/// ```
pub fn build_sample(text: &str, max_chars: usize) -> String {
    let len = text.chars().count();
    let budget = len.min(max_chars).min(MAX_SAMPLE_CHARS);
    let third = budget / 3;

    let beginning = char_slice(text, 0, third);
    let middle_start = (len / 2).saturating_sub(budget / 6);
    let middle = char_slice(text, middle_start, (middle_start + third).min(len));
    let end = char_slice(text, len.saturating_sub(third), len);

    let mut sample = String::with_capacity(beginning.len() + middle.len() + end.len());
    sample.push_str(beginning);
    sample.push_str(middle);
    sample.push_str(end);
    sample
}

/// Beginning, middle and end excerpts quoted in a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Excerpts<'a> {
    /// First `n` characters
    pub beginning: &'a str,
    /// `n` characters centered on the midpoint, saturating at the bounds
    pub middle: &'a str,
    /// Last `n` characters
    pub end: &'a str,
}

/// Cut three `n`-character excerpts from a sample
pub fn excerpts(sample: &str, n: usize) -> Excerpts<'_> {
    let len = sample.chars().count();
    let mid = len / 2;
    let half = n / 2;

    Excerpts {
        beginning: char_slice(sample, 0, n.min(len)),
        middle: char_slice(sample, mid.saturating_sub(half), (mid + half).min(len)),
        end: char_slice(sample, len.saturating_sub(n), len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_text_sample() {
        assert_eq!(build_sample("abcdefghijkl", 6), "abfgkl");
        assert_eq!(build_sample("", 30_000), "");
        assert_eq!(build_sample("ab", 30_000), "");
    }

    #[test]
    fn test_sample_under_budget_covers_three_regions() {
        let text = format!("{}{}{}", "a".repeat(300), "b".repeat(300), "c".repeat(300));
        let sample = build_sample(&text, 30_000);
        assert_eq!(sample.chars().count(), 900);
        assert_eq!(sample, text);
    }

    #[test]
    fn test_long_text_is_bounded() {
        let text = format!("{}{}{}", "a".repeat(50_000), "b".repeat(50_000), "c".repeat(50_000));
        let sample = build_sample(&text, 30_000);
        assert_eq!(sample.chars().count(), 30_000);
        assert!(sample.starts_with(&"a".repeat(10_000)));
        assert!(sample.ends_with(&"c".repeat(10_000)));
        assert_eq!(&sample[10_000..20_000], "b".repeat(10_000));
    }

    #[test]
    fn test_oversized_budget_is_capped() {
        let text = "x".repeat(100_000);
        assert_eq!(build_sample(&text, 90_000).chars().count(), MAX_SAMPLE_CHARS);
        assert_eq!(build_sample(&text, usize::MAX).chars().count(), MAX_SAMPLE_CHARS);
    }

    #[test]
    fn test_multibyte_text_is_not_split() {
        let text = "ééééééééé";
        let sample = build_sample(text, 6);
        assert_eq!(sample.chars().count(), 6);
    }

    #[test]
    fn test_excerpts_of_short_sample() {
        let parts = excerpts("0123456789", 4);
        assert_eq!(parts.beginning, "0123");
        assert_eq!(parts.middle, "3456");
        assert_eq!(parts.end, "6789");

        let parts = excerpts("abc", 5_000);
        assert_eq!(parts.beginning, "abc");
        assert_eq!(parts.middle, "abc");
        assert_eq!(parts.end, "abc");
    }

    proptest! {
        #[test]
        fn prop_sample_never_exceeds_budget(text in "\\PC{1,400}", max in 1usize..600) {
            let len = text.chars().count();
            let sample = build_sample(&text, max);
            prop_assert!(sample.chars().count() <= len.min(max));
        }

        #[test]
        fn prop_sample_starts_and_ends_like_text(text in "[a-z]{3,400}") {
            let sample = build_sample(&text, 30_000);
            let third = text.len() / 3;
            prop_assert!(text.starts_with(&sample[..third]));
            prop_assert!(text.ends_with(&sample[sample.len() - third..]));
        }
    }
}
