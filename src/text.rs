//! Text normalization for scraped fields.
//!
//! Every string that leaves the extractor passes through [`clean`] or
//! [`clean_capped`]: cookie/consent boilerplate is removed, whitespace runs
//! collapse to one space and the result is trimmed. Both functions are
//! idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

/// Consent and cookie notices that leak into article markup.
///
/// No pattern is anchored or ends in a word boundary, so a prefix of clean
/// text can never start matching after truncation.
static BOILERPLATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?ims)(?:utilizamos|usamos|este (?:sitio|sitio web|portal) (?:utiliza|usa)) cookies.{0,300}?(?:aceptar|acepta|configurar|más información|política de cookies)",
        r"(?ims)we use cookies.{0,300}?(?:accept|cookie policy|more information)",
        r"(?im)aceptar (?:todas las )?cookies",
        r"(?im)pol[ií]tica de cookies",
        r"(?im)configuraci[oó]n de cookies",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("boilerplate pattern is valid"))
    .collect()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

const QUOTES: &[char] = &['"', '\'', '“', '”', '«', '»', '‘', '’', '„'];

/// Collapse whitespace runs into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Strip boilerplate, collapse whitespace and trim.
///
/// Removal repeats until nothing matches, since deleting one notice can join
/// two fragments into a new one.
pub fn clean(text: &str) -> String {
    let mut current = collapse_whitespace(text);
    loop {
        let mut next = current.clone();
        for pattern in BOILERPLATE.iter() {
            if pattern.is_match(&next) {
                next = pattern.replace_all(&next, " ").into_owned();
            }
        }
        let next = collapse_whitespace(&next);
        if next == current {
            return next;
        }
        current = next;
    }
}

/// [`clean`] followed by a cap of `max_chars` characters.
pub fn clean_capped(text: &str, max_chars: usize) -> String {
    cap_chars(&clean(text), max_chars)
}

/// Truncate to at most `max_chars` characters, never splitting a char.
pub fn cap_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Whether the raw text contains a cookie/consent notice.
pub fn is_boilerplate(text: &str) -> bool {
    BOILERPLATE.iter().any(|p| p.is_match(text))
}

/// Remove surrounding quotation marks (straight, curly and angle quotes).
pub fn trim_quotes(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || QUOTES.contains(&c))
}

/// Length in characters, the unit every field rule is expressed in.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
