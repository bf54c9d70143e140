//! Text utilities for the domain layer.
//!
//! [`normalize`] is the folding used by the section router: lowercase,
//! diacritics removed, punctuation collapsed to single spaces.

/// Fold a single character to its ASCII base letter where one exists.
///
/// Covers the Latin-1 and Latin Extended-A letters that appear in
/// Scandinavian and other European financial documents.
fn fold_char(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' => 'i',
        'ł' => 'l',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'ř' => 'r',
        'ś' | 'š' | 'ş' => 's',
        'ť' | 'ţ' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

/// Normalize a section or target name for comparison.
///
/// Lowercases, folds diacritics, replaces every non-alphanumeric run with a
/// single space and trims.
///
/// ```
/// use coach_domain::core::text::normalize;
///
/// assert_eq!(normalize("  Leverantörer "), "leverantorer");
/// assert_eq!(normalize("Suppliers-List"), "suppliers list");
/// assert_eq!(normalize("Förvaltningsberättelse"), "forvaltningsberattelse");
/// ```
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.chars().flat_map(char::to_lowercase).map(fold_char) {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Whether `phrase` occurs in `haystack` aligned to whole words.
///
/// Both arguments are expected to be [`normalize`]d already.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    haystack == phrase
        || haystack.starts_with(&format!("{phrase} "))
        || haystack.ends_with(&format!(" {phrase}"))
        || haystack.contains(&format!(" {phrase} "))
}

/// Truncate a string to a maximum length with ellipsis (UTF-8 safe)
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let target = max_len.saturating_sub(3);
        let mut end = target.min(s.len());
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
