/// Lowercases `input`, turns every non-alphanumeric run into one space and trims.
///
/// `"Microsoft.Web/sites"` becomes `"microsoft web sites"`; this is the form used for containment
/// matching and group-kind inference.
pub fn normalize_phrase(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for ch in input.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Same as [`normalize_phrase`] but with a trailing plural `s` removed from every word, so that
/// `"Subscriptions"` and `"subscription"` compare equal.
pub fn normalize_singular(input: &str) -> String {
    normalize_phrase(input)
        .split(' ')
        .map(singularize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn singularize(word: &str) -> &str {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        &word[..word.len() - 1]
    } else {
        word
    }
}

/// Word-aligned containment on normalized phrases: `"cosmos db"` is contained in
/// `"the cosmos db account"` but `"sql"` is not contained in `"nosql"`.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    let mut start = 0usize;
    while let Some(pos) = haystack[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let left_ok = begin == 0 || haystack.as_bytes()[begin - 1] == b' ';
        let right_ok = end == haystack.len() || haystack.as_bytes()[end] == b' ';
        if left_ok && right_ok {
            return true;
        }
        start = begin + 1;
        while start < haystack.len() && !haystack.is_char_boundary(start) {
            start += 1;
        }
        if start >= haystack.len() {
            break;
        }
    }
    false
}

/// Deterministic id fragment: lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        "unnamed".to_string()
    } else {
        out
    }
}

/// Extracts a display name from an icon id such as
/// `analytics/00039-icon-service-Event-Hubs` (`"Event Hubs"`).
pub fn title_from_icon_id(id: &str) -> Option<String> {
    const MARKER: &str = "icon-service-";
    let lower = id.to_ascii_lowercase();
    let idx = lower.find(MARKER)?;
    let tail = &id[idx + MARKER.len()..];
    let tail = tail.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(tail);
    let words: Vec<&str> = tail
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return None;
    }
    Some(words.join(" "))
}

/// Truncates to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn truncate_at_char_boundary(input: &str, max_bytes: usize) -> &str {
    if input.len() <= max_bytes {
        return input;
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}
