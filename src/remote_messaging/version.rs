//! Dotted numeric version comparison

use std::cmp::Ordering;

/// Whether `version` is one or more dot separated runs of ASCII digits
#[must_use]
pub fn is_valid_version(version: &str) -> bool {
    !version.is_empty()
        && version
            .split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

/// Compare two versions component-wise and numerically
///
/// The shorter version is padded with zero components, so `"10.2"` equals
/// `"10.2.0"` and `"10.10"` is greater than `"10.9.5"`. Returns `None` if
/// either side is not a valid version.
#[must_use]
pub fn compare_versions(lhs: &str, rhs: &str) -> Option<Ordering> {
    if !is_valid_version(lhs) || !is_valid_version(rhs) {
        return None;
    }

    let mut lhs_parts = lhs.split('.');
    let mut rhs_parts = rhs.split('.');
    loop {
        match (lhs_parts.next(), rhs_parts.next()) {
            (None, None) => return Some(Ordering::Equal),
            (l, r) => {
                let ordering = compare_component(l.unwrap_or("0"), r.unwrap_or("0"));
                if ordering != Ordering::Equal {
                    return Some(ordering);
                }
            }
        }
    }
}

// Components may exceed u64, so compare digit strings without parsing.
fn compare_component(lhs: &str, rhs: &str) -> Ordering {
    let lhs = lhs.trim_start_matches('0');
    let rhs = rhs.trim_start_matches('0');
    lhs.len().cmp(&rhs.len()).then_with(|| lhs.cmp(rhs))
}
