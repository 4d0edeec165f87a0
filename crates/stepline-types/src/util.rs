use sha2::{Digest, Sha256};

/// Default number of characters kept when storing tool output on a step.
///
/// Overridable per stepper via configuration; this is the single place the
/// number lives.
pub const OUTPUT_PREVIEW_CHARS: usize = 140;

/// Truncate a string to a maximum number of characters
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect::<String>() + "…"
    }
}

/// Short stable digest over the given parts, for synthesizing correlation
/// ids when a payload carries none. Same parts, same digest, so reprocessing
/// an event lands on the same id.
pub fn short_digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let hex = format!("{:x}", hasher.finalize());
    hex[..8].to_string()
}
