use std::collections::HashMap;

use crate::error::{Result, UpdateError};

/// Name of the release asset carrying `sha256sum` output for every binary.
pub const MANIFEST_ASSET: &str = "checksums.txt";

/// Asset file name to lower-case hex digest.
pub type ChecksumTable = HashMap<String, String>;

/// Parses `sha256sum` output: `<hex>  <name>`, with an optional `*` before
/// binary-mode names. Lines that do not fit are ignored.
pub fn parse_manifest(text: &str) -> ChecksumTable {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let digest = parts.next()?;
            let name = parts.next()?.trim_start_matches('*');
            if parts.next().is_some() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            let name = name.strip_prefix("./").unwrap_or(name);
            Some((name.to_string(), digest.to_ascii_lowercase()))
        })
        .collect()
}

pub fn verify(table: &ChecksumTable, asset: &str, actual: &str) -> Result<()> {
    let expected = table
        .get(asset)
        .ok_or_else(|| UpdateError::ChecksumMissing(asset.to_string()))?;

    if expected.eq_ignore_ascii_case(actual) {
        Ok(())
    } else {
        Err(UpdateError::ChecksumMismatch {
            asset: asset.to_string(),
            expected: expected.clone(),
            actual: actual.to_string(),
        })
    }
}
