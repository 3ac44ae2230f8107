//! Text-to-number parsing and batch cleanup.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::listing::ExternalListing;

static YEN_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*(万)?\s*円?").expect("valid regex"));

static AGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,3})\s*歳").expect("valid regex"));

const RANGE_MARKS: &[char] = &['〜', '～', '~', '-', '－', '−'];

/// Parse a salary such as `400万円〜600万円` into yen.
pub fn parse_salary(text: &str) -> (Option<i64>, Option<i64>) {
    let amounts: Vec<(usize, i64)> = YEN_AMOUNT
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number: f64 = caps[1].replace(',', "").parse().ok()?;
            let yen = if caps.get(2).is_some() {
                number * 10_000.0
            } else {
                number
            };
            Some((whole.start(), yen.round() as i64))
        })
        .collect();
    bounds(text, &amounts)
}

/// Parse an age range such as `25歳〜35歳` or `35歳まで`.
pub fn parse_age(text: &str) -> (Option<i16>, Option<i16>) {
    let ages: Vec<(usize, i64)> = AGE
        .captures_iter(text)
        .filter_map(|caps| Some((caps.get(0)?.start(), caps[1].parse().ok()?)))
        .collect();
    let (min, max) = bounds(text, &ages);
    (
        min.and_then(|v| i16::try_from(v).ok()),
        max.and_then(|v| i16::try_from(v).ok()),
    )
}

/// Turn positioned numbers into a `(min, max)` range.
///
/// Two numbers form a range. A single number is an upper bound when
/// preceded by a range mark or followed by 以下/まで, a lower bound when
/// followed by a range mark or 以上, and otherwise both bounds.
fn bounds(text: &str, values: &[(usize, i64)]) -> (Option<i64>, Option<i64>) {
    match values {
        [] => (None, None),
        [(start, value)] => {
            let before = text[..*start].trim_end();
            if before.ends_with(RANGE_MARKS) || text.contains("以下") || text.contains("まで") {
                (None, Some(*value))
            } else if text.contains("以上") || text.trim_end().ends_with(RANGE_MARKS) {
                (Some(*value), None)
            } else {
                (Some(*value), Some(*value))
            }
        }
        [(_, first), (_, second), ..] => (Some(*first.min(second)), Some(*first.max(second))),
    }
}

/// Batch-level cleanup run after extraction, before dedup.
pub fn normalize_batch(listings: &mut [ExternalListing]) {
    for listing in listings.iter_mut() {
        listing.dedupe_facets();
        listing.commission = listing.commission.trim().to_string();
        listing.refund_policy = listing.refund_policy.trim().to_string();
    }
}
