//! Parsing and formatting of the snapshot filename grammar.

use crate::types::{Hash, Slot};

#[derive(Debug, thiserror::Error)]
pub enum FilenameError {
    #[error("filename does not match the snapshot grammar: {0}")]
    NoMatch(String),
    #[error("invalid slot in filename: {0}")]
    InvalidSlot(String),
    #[error("invalid base58 hash in filename: {0}")]
    InvalidHash(#[from] bs58::decode::Error),
    #[error("decoded hash is {len} bytes, expected 32")]
    HashLength { len: usize },
}

/// A parsed snapshot filename, full or incremental.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub slot: Slot,
    pub hash: Hash,
    pub base_slot: Option<Slot>,
    pub size_bytes: u64,
    pub download_url: Option<String>,
    pub is_incremental: bool,
}

fn decode_hash(encoded: &str) -> Result<Hash, FilenameError> {
    let bytes = bs58::decode(encoded).into_vec()?;
    if bytes.len() != 32 {
        return Err(FilenameError::HashLength { len: bytes.len() });
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

/// Parses `snapshot-<slot>-<base58hash>.tar.zst` or
/// `incremental-snapshot-<base_slot>-<slot>-<base58hash>.tar.zst`.
pub fn parse_filename(name: &str) -> Result<SnapshotInfo, FilenameError> {
    let body = name
        .strip_suffix(".tar.zst")
        .ok_or_else(|| FilenameError::NoMatch(name.to_string()))?;

    if let Some(rest) = body.strip_prefix("incremental-snapshot-") {
        let mut parts = rest.splitn(3, '-');
        let base = parts
            .next()
            .ok_or_else(|| FilenameError::NoMatch(name.to_string()))?;
        let slot = parts
            .next()
            .ok_or_else(|| FilenameError::NoMatch(name.to_string()))?;
        let hash = parts
            .next()
            .ok_or_else(|| FilenameError::NoMatch(name.to_string()))?;

        let base_slot: Slot = base
            .parse()
            .map_err(|_| FilenameError::InvalidSlot(base.to_string()))?;
        let slot: Slot = slot
            .parse()
            .map_err(|_| FilenameError::InvalidSlot(slot.to_string()))?;
        let hash = decode_hash(hash)?;

        return Ok(SnapshotInfo {
            slot,
            hash,
            base_slot: Some(base_slot),
            size_bytes: 0,
            download_url: None,
            is_incremental: true,
        });
    }

    if let Some(rest) = body.strip_prefix("snapshot-") {
        let mut parts = rest.splitn(2, '-');
        let slot = parts
            .next()
            .ok_or_else(|| FilenameError::NoMatch(name.to_string()))?;
        let hash = parts
            .next()
            .ok_or_else(|| FilenameError::NoMatch(name.to_string()))?;

        let slot: Slot = slot
            .parse()
            .map_err(|_| FilenameError::InvalidSlot(slot.to_string()))?;
        let hash = decode_hash(hash)?;

        return Ok(SnapshotInfo {
            slot,
            hash,
            base_slot: None,
            size_bytes: 0,
            download_url: None,
            is_incremental: false,
        });
    }

    Err(FilenameError::NoMatch(name.to_string()))
}

/// Formats a full snapshot filename.
pub fn format_full(slot: Slot, hash: &Hash) -> String {
    format!("snapshot-{}-{}.tar.zst", slot, bs58::encode(hash).into_string())
}

/// Formats an incremental snapshot filename.
pub fn format_incremental(base_slot: Slot, slot: Slot, hash: &Hash) -> String {
    format!(
        "incremental-snapshot-{}-{}-{}.tar.zst",
        base_slot,
        slot,
        bs58::encode(hash).into_string()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_snapshot_name() {
        let hash = [7u8; 32];
        let name = format_full(1234, &hash);
        let info = parse_filename(&name).unwrap();
        assert_eq!(info.slot, 1234);
        assert_eq!(info.hash, hash);
        assert_eq!(info.base_slot, None);
        assert!(!info.is_incremental);
    }

    #[test]
    fn parses_incremental_snapshot_name() {
        let hash = [9u8; 32];
        let name = format_incremental(1000, 1500, &hash);
        let info = parse_filename(&name).unwrap();
        assert_eq!(info.slot, 1500);
        assert_eq!(info.base_slot, Some(1000));
        assert!(info.is_incremental);
        assert_eq!(info.hash, hash);
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = parse_filename("snapshot-1-abc.tar.gz").unwrap_err();
        assert!(matches!(err, FilenameError::NoMatch(_)));
    }

    #[test]
    fn rejects_non_numeric_slot() {
        let err = parse_filename("snapshot-abc-3NZ9JMV5mepsB1Qs.tar.zst").unwrap_err();
        assert!(matches!(err, FilenameError::InvalidSlot(_)));
    }
}
