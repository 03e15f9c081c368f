//! Normalization of ZIP, FIPS and tract identifiers into their canonical fixed-width forms.

/// Digits of a numeric identifier cell. Spreadsheet exports sometimes render codes as
/// floats ("10456.0"); a trailing all-zero fraction is dropped. Anything else non-numeric
/// is rejected.
fn digits(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    let raw = match raw.split_once('.') {
        Some((int, frac)) if frac.bytes().all(|b| b == b'0') => int,
        Some(_) => return None,
        None => raw,
    };
    (!raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())).then_some(raw)
}

fn pad(digits: &str, width: usize) -> String {
    format!("{digits:0>width$}")
}

/// Five-digit ZIP. Short values regain their leading zeros; ZIP+4 keeps the first five.
pub fn normalize_zip(raw: &str) -> Option<String> {
    let d = digits(raw.split('-').next().unwrap_or(raw))?;
    match d.len() {
        1..=5 => Some(pad(d, 5)),
        9 => Some(d[..5].to_string()),
        _ => None,
    }
}

/// Two-digit state FIPS. Postal abbreviations ("NY") are not FIPS and yield `None`.
pub fn normalize_state(raw: &str) -> Option<String> {
    let d = digits(raw)?;
    (d.len() <= 2).then(|| pad(d, 2))
}

/// County FIPS split into (state prefix, three-digit county code).
/// A five-digit value (or a four-digit one that lost its leading zero) carries its
/// state prefix; a value of up to three digits is a bare county code.
pub fn normalize_county(raw: &str) -> Option<(Option<String>, String)> {
    let d = digits(raw)?;
    match d.len() {
        1..=3 => Some((None, pad(d, 3))),
        4 | 5 => {
            let full = pad(d, 5);
            Some((Some(full[..2].to_string()), full[2..].to_string()))
        }
        _ => None,
    }
}

/// Six-digit tract code. Longer values (full GEOIDs) keep their last six digits;
/// decimal tract names ("123.01") become "012301".
pub fn normalize_tract(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Some((int, frac)) = raw.split_once('.') {
        let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if all_digits(int) && int.len() <= 4 && all_digits(frac) && frac.len() <= 2 {
            return Some(format!("{int:0>4}{frac:0<2}"));
        }
    }
    let d = digits(raw)?;
    Some(if d.len() > 6 { d[d.len() - 6..].to_string() } else { pad(d, 6) })
}

/// Components embedded in a full 11-digit tract GEOID: (state, county, tract).
pub fn split_tract_geoid(raw: &str) -> Option<(String, String, String)> {
    let d = digits(raw)?;
    (d.len() == 11).then(|| (d[..2].to_string(), d[2..5].to_string(), d[5..].to_string()))
}

/// Canonical 11-digit tract identifier.
pub fn build_tract_geoid(state_fips: &str, county_code: &str, tract: &str) -> String {
    format!("{state_fips}{county_code}{tract}")
}
