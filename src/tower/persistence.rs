//! Crash-safe on-disk tower state (spec §4.2, §6 "Tower file").
//!
//! Safety property: after restart, the loaded tower must be a suffix of some
//! tower state previously reached in memory. The write-tmp / fsync / rename
//! sequence below guarantees this — a crash between the two renames leaves
//! `tower.bin` absent and the loader falls back to `tower.bin.bak`; a crash
//! before the final rename leaves `tower.bin` at its prior value and the
//! in-memory uncommitted vote is simply lost, which never produces a double
//! vote.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::types::{Hash, Pubkey, Slot};

pub const MAGIC: &[u8; 8] = b"VEXTOWER";
pub const VERSION: u32 = 1;
const MAX_LOCKOUTS: usize = 31;
/// Sentinel for "no root yet" in the fixed-width `root` field.
const NO_ROOT: u64 = u64::MAX;

#[derive(Debug, thiserror::Error)]
pub enum TowerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("tower file too short: expected at least {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("invalid tower file magic")]
    InvalidMagic,
    #[error("unsupported tower file version {got}, expected {expected}")]
    UnsupportedVersion { got: u32, expected: u32 },
    #[error("neither tower.bin nor tower.bin.bak could be found in {0}")]
    NotFound(PathBuf),
    #[error("lockout_count {0} exceeds the 31-entry bound")]
    TooManyLockouts(usize),
}

/// The canonical on-disk form of a tower, independent of the in-memory
/// [`crate::tower::tower_bft::Tower`] driver (spec's Design Notes resolve the
/// ambiguity between the two this way).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedTower {
    pub identity: Pubkey,
    pub vote_pubkey: Pubkey,
    pub last_voted_slot: Slot,
    pub last_voted_hash: Hash,
    pub root: Option<Slot>,
    pub lockouts: Vec<(Slot, u32)>,
    pub last_timestamp: i64,
    pub stray_restored_slot: Option<Slot>,
}

impl SavedTower {
    fn serialize_body(&self) -> Result<Vec<u8>, TowerError> {
        if self.lockouts.len() > MAX_LOCKOUTS {
            return Err(TowerError::TooManyLockouts(self.lockouts.len()));
        }
        let mut buf = Vec::with_capacity(32 + 32 + 8 + 32 + 8 + 1 + self.lockouts.len() * 12 + 8 + 1 + 8);
        buf.extend_from_slice(&self.identity);
        buf.extend_from_slice(&self.vote_pubkey);
        buf.extend_from_slice(&self.last_voted_slot.to_le_bytes());
        buf.extend_from_slice(&self.last_voted_hash);
        buf.extend_from_slice(&self.root.unwrap_or(NO_ROOT).to_le_bytes());
        buf.push(self.lockouts.len() as u8);
        for (slot, confirmation) in &self.lockouts {
            buf.extend_from_slice(&slot.to_le_bytes());
            buf.extend_from_slice(&confirmation.to_le_bytes());
        }
        buf.extend_from_slice(&self.last_timestamp.to_le_bytes());
        match self.stray_restored_slot {
            Some(slot) => {
                buf.push(1);
                buf.extend_from_slice(&slot.to_le_bytes());
            }
            None => buf.push(0),
        }
        Ok(buf)
    }

    fn deserialize_body(buf: &[u8]) -> Result<Self, TowerError> {
        let mut cursor = 0usize;
        let need = |cursor: usize, n: usize| -> Result<(), TowerError> {
            if cursor + n > buf.len() {
                Err(TowerError::Truncated {
                    expected: cursor + n,
                    got: buf.len(),
                })
            } else {
                Ok(())
            }
        };

        need(cursor, 32)?;
        let mut identity = [0u8; 32];
        identity.copy_from_slice(&buf[cursor..cursor + 32]);
        cursor += 32;

        need(cursor, 32)?;
        let mut vote_pubkey = [0u8; 32];
        vote_pubkey.copy_from_slice(&buf[cursor..cursor + 32]);
        cursor += 32;

        need(cursor, 8)?;
        let last_voted_slot = u64::from_le_bytes(buf[cursor..cursor + 8].try_into().unwrap());
        cursor += 8;

        need(cursor, 32)?;
        let mut last_voted_hash = [0u8; 32];
        last_voted_hash.copy_from_slice(&buf[cursor..cursor + 32]);
        cursor += 32;

        need(cursor, 8)?;
        let root_raw = u64::from_le_bytes(buf[cursor..cursor + 8].try_into().unwrap());
        cursor += 8;
        let root = if root_raw == NO_ROOT { None } else { Some(root_raw) };

        need(cursor, 1)?;
        let lockout_count = buf[cursor] as usize;
        cursor += 1;
        if lockout_count > MAX_LOCKOUTS {
            return Err(TowerError::TooManyLockouts(lockout_count));
        }

        let mut lockouts = Vec::with_capacity(lockout_count);
        for _ in 0..lockout_count {
            need(cursor, 12)?;
            let slot = u64::from_le_bytes(buf[cursor..cursor + 8].try_into().unwrap());
            let confirmation = u32::from_le_bytes(buf[cursor + 8..cursor + 12].try_into().unwrap());
            cursor += 12;
            lockouts.push((slot, confirmation));
        }

        need(cursor, 8)?;
        let last_timestamp = i64::from_le_bytes(buf[cursor..cursor + 8].try_into().unwrap());
        cursor += 8;

        need(cursor, 1)?;
        let has_stray = buf[cursor] != 0;
        cursor += 1;

        let stray_restored_slot = if has_stray {
            need(cursor, 8)?;
            Some(u64::from_le_bytes(buf[cursor..cursor + 8].try_into().unwrap()))
        } else {
            None
        };

        Ok(Self {
            identity,
            vote_pubkey,
            last_voted_slot,
            last_voted_hash,
            root,
            lockouts,
            last_timestamp,
            stray_restored_slot,
        })
    }
}

/// Serializes the full on-disk record: header + SavedTower body.
pub fn serialize_record(saved: &SavedTower, save_timestamp: i64) -> Result<Vec<u8>, TowerError> {
    let body = saved.serialize_body()?;
    let mut record = Vec::with_capacity(56 + body.len());
    record.extend_from_slice(MAGIC);
    record.extend_from_slice(&VERSION.to_le_bytes());
    record.extend_from_slice(&saved.identity);
    record.extend_from_slice(&save_timestamp.to_le_bytes());
    record.extend_from_slice(&(body.len() as u32).to_le_bytes());
    record.extend_from_slice(&body);
    Ok(record)
}

/// Parses the full on-disk record, returning the tower and its save timestamp.
pub fn deserialize_record(buf: &[u8]) -> Result<(SavedTower, i64), TowerError> {
    if buf.len() < 56 {
        return Err(TowerError::Truncated {
            expected: 56,
            got: buf.len(),
        });
    }
    if &buf[0..8] != MAGIC {
        return Err(TowerError::InvalidMagic);
    }
    let version = u32::from_le_bytes(buf[8..12].try_into().unwrap());
    if version != VERSION {
        return Err(TowerError::UnsupportedVersion {
            got: version,
            expected: VERSION,
        });
    }
    let save_timestamp = i64::from_le_bytes(buf[44..52].try_into().unwrap());
    let data_len = u32::from_le_bytes(buf[52..56].try_into().unwrap()) as usize;
    if buf.len() < 56 + data_len {
        return Err(TowerError::Truncated {
            expected: 56 + data_len,
            got: buf.len(),
        });
    }
    let saved = SavedTower::deserialize_body(&buf[56..56 + data_len])?;
    Ok((saved, save_timestamp))
}

fn tower_path(dir: &Path) -> PathBuf {
    dir.join("tower.bin")
}

fn backup_path(dir: &Path) -> PathBuf {
    dir.join("tower.bin.bak")
}

fn tmp_path(dir: &Path) -> PathBuf {
    dir.join("tower.bin.tmp")
}

/// Atomic save protocol: write tmp, fsync, rotate current to `.bak`, rename
/// tmp into place.
pub fn save_atomic(dir: &Path, saved: &SavedTower, now: i64) -> Result<(), TowerError> {
    let record = serialize_record(saved, now)?;

    let tmp = tmp_path(dir);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&record)?;
        file.sync_all()?;
    }

    let current = tower_path(dir);
    let backup = backup_path(dir);
    if current.exists() {
        let _ = fs::rename(&current, &backup);
    }
    fs::rename(&tmp, &current)?;
    Ok(())
}

/// Load protocol: read `tower.bin`, falling back to `tower.bin.bak` on
/// `NotFound`. Rejects bad magic / unsupported version from either file.
pub fn load(dir: &Path) -> Result<SavedTower, TowerError> {
    match read_file(&tower_path(dir)) {
        Ok(buf) => Ok(deserialize_record(&buf)?.0),
        Err(TowerError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            let buf = read_file(&backup_path(dir))
                .map_err(|_| TowerError::NotFound(dir.to_path_buf()))?;
            Ok(deserialize_record(&buf)?.0)
        }
        Err(e) => Err(e),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, TowerError> {
    let mut file = File::open(path)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}
