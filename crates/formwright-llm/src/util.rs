//! Small helpers shared by backends

/// Keys at or below this length are fully masked
const MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY: usize = 8;

/// Characters shown at each end of a masked key
const KEY_MASK_VISIBLE_CHARS: usize = 4;

/// Mask an API key for logs.
///
/// ```
/// use formwright_llm::util::mask_api_key;
/// assert_eq!(mask_api_key("AIza1234567890abcd"), "AIza...abcd");
/// assert_eq!(mask_api_key("short"), "****");
/// ```
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY {
        return "****".to_string();
    }
    let head: String = chars[..KEY_MASK_VISIBLE_CHARS].iter().collect();
    let tail: String = chars[chars.len() - KEY_MASK_VISIBLE_CHARS..].iter().collect();
    format!("{head}...{tail}")
}

/// Truncate to at most `max_bytes` without splitting a UTF-8 character.
#[must_use]
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
