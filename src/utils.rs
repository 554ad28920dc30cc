//! String helpers
//!
//! UTF-8 safe truncation, used when server responses end up in error
//! messages.

/// Longest prefix of `s` that fits in `max_bytes` without splitting a character
///
/// # Example
/// ```
/// use browser_services_kit::utils::safe_truncate;
///
/// // "é" takes two bytes, so a three byte cut stops before it
/// assert_eq!(safe_truncate("Café", 4), "Caf");
/// ```
#[inline]
#[must_use]
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let boundary = (0..=max_bytes)
        .rev()
        .find(|&i| s.is_char_boundary(i))
        .unwrap_or(0);
    &s[..boundary]
}

/// Truncate to `max_bytes` and mark the cut with `...`
///
/// # Example
/// ```
/// use browser_services_kit::utils::truncate_for_display;
///
/// assert_eq!(truncate_for_display("upstream timeout", 8), "upstream...");
/// assert_eq!(truncate_for_display("ok", 8), "ok");
/// ```
#[must_use]
pub fn truncate_for_display(s: &str, max_bytes: usize) -> String {
    let truncated = safe_truncate(s, max_bytes);
    if truncated.len() < s.len() {
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}
