use anyhow::{Context, Result};
use serde::Serialize;

/// Serialize a value to pretty-printed JSON bytes with a trailing newline.
/// serde_json preserves struct field order, so identical values give identical bytes.
pub(crate) fn to_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut out = serde_json::to_vec_pretty(value)
        .context("[io::json] Failed to serialize JSON")?;
    out.push(b'\n');
    Ok(out)
}
