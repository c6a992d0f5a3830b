//! Country-specific plate grammar validation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Uzbek plate layouts: regional code pairs followed by series patterns.
/// Region codes are 01, X0 for X in 1..9, and 25/75/85/95.
static UZ_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^01\d{3}[A-Z]{3}$",
        r"^[1-9]0\d{3}[A-Z]{3}$",
        r"^[2789]5\d{3}[A-Z]{3}$",
        r"^01[A-Z]\d{3}[A-Z]{2}$",
        r"^[1-9]0[A-Z]\d{3}[A-Z]{2}$",
        r"^[2789]5[A-Z]\d{3}[A-Z]{2}$",
        r"^01[HM]\d{6}$",
        r"^[1-9]0[HM]\d{6}$",
        r"^[2789]5[HM]\d{6}$",
        r"^T\d{6}01$",
        r"^T\d{6}[1-9]0$",
        r"^T\d{6}[2789]5$",
        r"^CMD\d{4}$",
        r"^[DTX]\d{6}$",
        r"^01\d{4}MV$",
        r"^[1-9]0\d{4}MV$",
        r"^PAA\d{3}$",
        r"^[A-Z]\d{3}[A-Z]{2}01$",
        r"^[A-Z]\d{3}[A-Z]{2}[1-9]0$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static plate pattern must compile"))
    .collect()
});

/// True iff `plate_number` matches at least one Uzbek plate layout.
///
/// Case-sensitive; expects the uppercase labels produced by the recognizer.
/// Used as a hard gate: strings that fail are discarded entirely rather than
/// returned with a low confidence.
pub fn is_valid_uz(plate_number: &str) -> bool {
    UZ_PATTERNS.iter().any(|p| p.is_match(plate_number))
}
