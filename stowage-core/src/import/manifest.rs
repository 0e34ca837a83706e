use stowage_model::BundleManifest;

use crate::error::DecodeError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decode the raw bytes of a bundle manifest.
///
/// Rejects empty input, anything that is not a JSON object carrying both
/// `hash` and `JAVID`, and blank values for either key.
pub fn decode(bytes: &[u8]) -> Result<BundleManifest, DecodeError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }

    let manifest: BundleManifest = serde_json::from_slice(bytes)?;

    if manifest.hash.trim().is_empty() {
        return Err(DecodeError::MissingField("hash"));
    }
    if manifest.javid.trim().is_empty() {
        return Err(DecodeError::MissingField("JAVID"));
    }

    Ok(manifest)
}
