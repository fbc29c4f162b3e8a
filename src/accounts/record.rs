//! Fixed on-disk layout of a single AppendVec account record (spec §3).

use crate::types::{Hash, Pubkey};

pub const STORED_META_LEN: usize = 48;
pub const ACCOUNT_META_LEN: usize = 56;
pub const MAX_ACCOUNT_DATA_LEN: u64 = 10 * 1024 * 1024;

/// The 48-byte StoredMeta header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredMeta {
    pub write_version: u64,
    pub data_len: u64,
    pub pubkey: Pubkey,
}

impl StoredMeta {
    pub fn is_terminator(&self) -> bool {
        self.write_version == 0 && self.data_len == 0
    }

    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < STORED_META_LEN {
            return None;
        }
        let write_version = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let data_len = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let mut pubkey = [0u8; 32];
        pubkey.copy_from_slice(&buf[16..48]);
        Some(Self {
            write_version,
            data_len,
            pubkey,
        })
    }
}

/// The 56-byte AccountMeta header (48 bytes of fields + 7 bytes padding after `executable`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub lamports: u64,
    pub rent_epoch: u64,
    pub owner: Pubkey,
    pub executable: bool,
}

impl AccountMeta {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < ACCOUNT_META_LEN {
            return None;
        }
        let lamports = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let rent_epoch = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let mut owner = [0u8; 32];
        owner.copy_from_slice(&buf[16..48]);
        let executable = buf[48] != 0;
        Some(Self {
            lamports,
            rent_epoch,
            owner,
            executable,
        })
    }
}

/// A fully parsed account, with `data` owned (copied out of the mmap/buffer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub pubkey: Pubkey,
    pub lamports: u64,
    pub rent_epoch: u64,
    pub owner: Pubkey,
    pub executable: bool,
    pub data: Vec<u8>,
    pub hash: Option<Hash>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_meta_terminator() {
        let zero = StoredMeta {
            write_version: 0,
            data_len: 0,
            pubkey: [0u8; 32],
        };
        assert!(zero.is_terminator());
    }

    #[test]
    fn stored_meta_round_trip_from_bytes() {
        let mut buf = [0u8; STORED_META_LEN];
        buf[0..8].copy_from_slice(&1u64.to_le_bytes());
        buf[8..16].copy_from_slice(&16u64.to_le_bytes());
        buf[16..48].copy_from_slice(&[0x11u8; 32]);

        let parsed = StoredMeta::parse(&buf).unwrap();
        assert_eq!(parsed.write_version, 1);
        assert_eq!(parsed.data_len, 16);
        assert_eq!(parsed.pubkey, [0x11u8; 32]);
    }
}
