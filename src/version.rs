//! Version string for update checks

use std::cmp::Ordering;

pub const CURRENT: &str = env!("CARGO_PKG_VERSION");

/// Compare dotted versions segment by segment
///
/// Missing segments count as zero and anything after the leading digits of a
/// segment is ignored, so `1.2` == `1.2.0` and `1.3.0-beta` == `1.3.0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = segments(a);
    let b = segments(b);
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn segments(version: &str) -> Vec<u64> {
    version
        .trim()
        .trim_start_matches(['v', 'V'])
        .split('.')
        .map(|segment| {
            let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}
