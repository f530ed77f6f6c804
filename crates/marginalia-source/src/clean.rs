//! Boilerplate stripping for Project Gutenberg plain-text files

/// Markers that open the licensed text, earliest occurrence wins
pub const START_MARKERS: [&str; 5] = [
    "*** START OF THIS PROJECT GUTENBERG EBOOK",
    "*** START OF THE PROJECT GUTENBERG EBOOK",
    "*END*THE SMALL PRINT",
    "*** START OF THE PROJECT GUTENBERG",
    "This eBook is for the use of anyone anywhere",
];

/// Markers that close the licensed text
///
/// Each marker's last occurrence is considered; the earliest of those wins.
pub const END_MARKERS: [&str; 5] = [
    "*** END OF THIS PROJECT GUTENBERG EBOOK",
    "*** END OF THE PROJECT GUTENBERG EBOOK",
    "End of Project Gutenberg's",
    "End of the Project Gutenberg",
    "End of Project Gutenberg",
];

/// Lines containing any of these are dropped
const BOILERPLATE_FRAGMENTS: [&str; 2] = ["Project Gutenberg", "www.gutenberg.org"];

/// Cleaned text at or below this many characters counts as nothing usable
pub const MIN_CONTENT_CHARS: usize = 100;

/// Strip the preamble, postamble and boilerplate lines from a raw book
///
/// Returns an empty string when what remains is too short to analyze.
///
/// # Examples
///
/// ```
/// use marginalia_source::clean_book_content;
///
/// let body = "It was a dark and stormy night. ".repeat(5);
/// let raw = format!(
///     "Header\n*** START OF THE PROJECT GUTENBERG EBOOK X ***\n{}\n*** END OF THE PROJECT GUTENBERG EBOOK X ***\nLicense",
///     body
/// );
/// assert_eq!(clean_book_content(&raw), body.trim());
/// assert_eq!(clean_book_content("too short"), "");
/// ```
pub fn clean_book_content(raw: &str) -> String {
    let mut content = raw;

    let start = START_MARKERS
        .iter()
        .filter_map(|marker| content.find(marker))
        .min();
    if let Some(pos) = start {
        if let Some(offset) = content[pos..].find('\n') {
            content = &content[pos + offset + 1..];
        }
    }

    let end = END_MARKERS
        .iter()
        .filter_map(|marker| content.rfind(marker))
        .min();
    if let Some(pos) = end {
        if let Some(line_start) = content[..pos].rfind('\n') {
            content = &content[..line_start];
        }
    }

    let cleaned = content
        .split('\n')
        .filter(|line| !BOILERPLATE_FRAGMENTS.iter().any(|frag| line.contains(frag)))
        .collect::<Vec<_>>()
        .join("\n");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() > MIN_CONTENT_CHARS {
        cleaned.to_string()
    } else {
        String::new()
    }
}
