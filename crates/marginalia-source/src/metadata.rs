//! Catalogue page scraping
//!
//! Each field falls back to a sentinel when its selector matches nothing.

use marginalia_domain::{BookId, BookMetadata};
use scraper::{ElementRef, Html, Selector};

/// Extract book metadata from a catalogue page
///
/// `base_url` resolves a relative cover image path and builds the default
/// cover URL.
pub fn parse_metadata(html: &str, id: &BookId, base_url: &str) -> BookMetadata {
    let document = Html::parse_document(html);
    let unknown = BookMetadata::unknown(id.clone());

    BookMetadata {
        title: first_text(&document, r#"h1[itemprop="name"]"#).unwrap_or(unknown.title),
        author: first_text(&document, r#"a[itemprop="creator"]"#).unwrap_or(unknown.author),
        language: extract_language(&document).unwrap_or(unknown.language),
        subjects: all_text(&document, r#"td[property="dcterms:subject"] a"#),
        release_date: first_text(&document, r#"td[itemprop="datePublished"]"#)
            .unwrap_or(unknown.release_date),
        download_count: extract_downloads(&document),
        cover_url: extract_cover_url(&document, id, base_url),
        id: unknown.id,
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document.select(&sel).next().map(element_text)
}

fn all_text(document: &Html, selector: &str) -> Vec<String> {
    match Selector::parse(selector) {
        Ok(sel) => document.select(&sel).map(element_text).collect(),
        Err(_) => Vec::new(),
    }
}

/// First data cell of the first table row mentioning "Language"
fn extract_language(document: &Html) -> Option<String> {
    let rows = Selector::parse("tr").ok()?;
    let cells = Selector::parse("td").ok()?;

    document
        .select(&rows)
        .find(|row| row.text().any(|t| t.contains("Language")))
        .and_then(|row| row.select(&cells).next())
        .map(element_text)
}

/// Digits of the download counter, concatenated
fn extract_downloads(document: &Html) -> u64 {
    first_text(document, r#"td[itemprop="interactionCount"]"#)
        .map(|text| text.chars().filter(char::is_ascii_digit).collect::<String>())
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

fn extract_cover_url(document: &Html, id: &BookId, base_url: &str) -> String {
    let src = Selector::parse(r#"img[src*="cover"]"#)
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|img| img.value().attr("src").map(str::to_string))
        });

    match src {
        Some(src) if src.starts_with('/') => format!("{}{}", base_url, src),
        Some(src) => src,
        None => format!("{}/cache/epub/{}/pg{}.cover.medium.jpg", base_url, id, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.gutenberg.org";

    const PAGE: &str = r#"<!DOCTYPE html>
<html><body>
  <h1 itemprop="name"> Romeo and Juliet </h1>
  <img class="cover-art" src="/cache/epub/1513/pg1513.cover.medium.jpg">
  <table class="bibrec">
    <tr><th>Author</th><td><a itemprop="creator" href="/ebooks/author/65">Shakespeare, William, 1564-1616</a></td></tr>
    <tr><th>Language</th><td>English</td></tr>
    <tr><th>Subject</th><td property="dcterms:subject"><a href="/ebooks/subject/1">Vendetta -- Drama</a></td></tr>
    <tr><th>Subject</th><td property="dcterms:subject"><a href="/ebooks/subject/2">Youth -- Drama</a></td></tr>
    <tr><th>Release Date</th><td itemprop="datePublished">Nov 1, 1998</td></tr>
    <tr><th>Downloads</th><td itemprop="interactionCount">73,654 downloads in the last 30 days.</td></tr>
  </table>
</body></html>"#;

    fn id() -> BookId {
        BookId::parse("1513").unwrap()
    }

    #[test]
    fn test_parse_full_page() {
        let meta = parse_metadata(PAGE, &id(), BASE);
        assert_eq!(meta.title, "Romeo and Juliet");
        assert_eq!(meta.author, "Shakespeare, William, 1564-1616");
        assert_eq!(meta.language, "English");
        assert_eq!(meta.subjects, vec!["Vendetta -- Drama", "Youth -- Drama"]);
        assert_eq!(meta.release_date, "Nov 1, 1998");
        assert_eq!(meta.download_count, 7365430);
        assert_eq!(
            meta.cover_url,
            "https://www.gutenberg.org/cache/epub/1513/pg1513.cover.medium.jpg"
        );
    }

    #[test]
    fn test_empty_page_uses_sentinels() {
        let meta = parse_metadata("<html><body></body></html>", &id(), BASE);
        assert_eq!(meta.id, id());
        assert_eq!(meta.title, "Unknown Title");
        assert_eq!(meta.author, "Unknown Author");
        assert_eq!(meta.language, "Unknown Language");
        assert!(meta.subjects.is_empty());
        assert_eq!(meta.release_date, "Unknown Release Date");
        assert_eq!(meta.download_count, 0);
        assert_eq!(
            meta.cover_url,
            "https://www.gutenberg.org/cache/epub/1513/pg1513.cover.medium.jpg"
        );
    }

    #[test]
    fn test_absolute_cover_url_kept() {
        let html = r#"<html><body><img src="https://cdn.example.org/cover.png"></body></html>"#;
        let meta = parse_metadata(html, &id(), BASE);
        assert_eq!(meta.cover_url, "https://cdn.example.org/cover.png");
    }
}
