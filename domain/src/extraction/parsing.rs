//! Parsing helpers for free-form model output.
//!
//! Pure text handling, no I/O. Model responses may wrap their JSON in prose
//! or a markdown code fence; [`extract_json_object`] digs the object out.
//! [`parse_number`] understands the number formats found in Swedish
//! financial statements.

use serde_json::Value;

/// Extract the first JSON object from a model response.
///
/// Tries, in order: the whole response, a fenced code block, and the span
/// from the first `{` to the last `}`. Returns `None` when no candidate
/// parses to a JSON object.
///
/// ```
/// use coach_domain::extraction::parsing::extract_json_object;
///
/// let text = "Here you go:\n```json\n{\"total_assets\": 100}\n```";
/// let value = extract_json_object(text).unwrap();
/// assert_eq!(value["total_assets"], 100);
/// assert!(extract_json_object("no json here").is_none());
/// ```
pub fn extract_json_object(response: &str) -> Option<Value> {
    let trimmed = response.trim();

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(fenced) = fenced_block(trimmed)
        && let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(fenced.trim())
    {
        return Some(value);
    }

    if let Some(start) = trimmed.find('{')
        && let Some(end) = trimmed.rfind('}')
        && end > start
        && let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&trimmed[start..=end])
    {
        return Some(value);
    }

    None
}

/// Body of the first ``` fenced block, with an optional language tag removed.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// Parse a number as written in a financial statement.
///
/// Accepts space, no-break space and narrow no-break space as thousands
/// separators, a comma or dot as decimal separator, the unicode minus sign,
/// and trailing `kr`, `SEK` or `%` units.
///
/// ```
/// use coach_domain::extraction::parsing::parse_number;
///
/// assert_eq!(parse_number("1 234 567"), Some(1_234_567.0));
/// assert_eq!(parse_number("12,5 %"), Some(12.5));
/// assert_eq!(parse_number("−4 500 kr"), Some(-4500.0));
/// assert_eq!(parse_number("n/a"), None);
/// ```
pub fn parse_number(raw: &str) -> Option<f64> {
    let mut s: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .map(|c| if c == '\u{2212}' { '-' } else { c })
        .collect();

    for unit in ["SEK", "sek", "kr", "Kr", "KR", "%"] {
        if let Some(stripped) = s.strip_suffix(unit) {
            s = stripped.to_string();
            break;
        }
    }

    if s.is_empty() {
        return None;
    }

    let commas = s.matches(',').count();
    let dots = s.matches('.').count();

    let normalized = if commas > 0 && dots > 0 {
        let last_comma = s.rfind(',').unwrap_or(0);
        let last_dot = s.rfind('.').unwrap_or(0);
        if last_comma > last_dot {
            s.replace('.', "").replace(',', ".")
        } else {
            s.replace(',', "")
        }
    } else if commas > 1 {
        s.replace(',', "")
    } else if commas == 1 {
        s.replace(',', ".")
    } else if dots > 1 {
        s.replace('.', "")
    } else {
        s
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
