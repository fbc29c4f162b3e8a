//! Snapshot discovery: find a target slot and a peer serving it, verify and
//! extract a downloaded archive, hand its AppendVec files to the accounts
//! reader, and garbage collect old snapshot directories once a newer one is
//! in place.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::accounts::append_vec::read_append_vec;
use crate::snapshot::downloader::TransportError;
use crate::snapshot::filename::{parse_filename, SnapshotInfo};
use crate::types::{Hash, Slot};

const MAX_CANDIDATE_NODES: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tar extraction error: {0}")]
    Extract(std::io::Error),
    #[error(
        "snapshot hash mismatch for {path}: filename claims {expected}, archive hashes to {actual}"
    )]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

/// Result of extracting an archive and loading every AppendVec file found
/// inside it.
#[derive(Debug, Default)]
pub struct BootstrapSummary {
    pub files_parsed: usize,
    pub files_failed: usize,
    pub accounts_total: usize,
    pub lamports_total: u64,
}

/// SHA-256 over the whole file, used to check a downloaded archive against
/// the hash embedded in its filename.
fn hash_file(path: &Path) -> std::io::Result<Hash> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Ok(out)
}

/// Walks `dir` recursively, calling `visit` on every regular file.
fn walk_files(dir: &Path, visit: &mut dyn FnMut(&Path)) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk_files(&path, &mut *visit)?;
        } else {
            visit(&path);
        }
    }
    Ok(())
}

/// Verifies a downloaded archive against `info.hash`, extracts it as a
/// zstd-compressed tarball into `extract_dir`, and feeds every regular file
/// found inside to [`read_append_vec`] (spec §2's "verify, extract, load").
///
/// On a hash mismatch the archive is deleted and an error returned so the
/// caller can retry against a different peer (spec §4.6's failure
/// semantics); a per-file AppendVec parse failure is logged and skipped
/// rather than failing the whole bootstrap.
pub fn verify_extract_and_load(
    archive_path: &Path,
    info: &SnapshotInfo,
    extract_dir: &Path,
) -> Result<BootstrapSummary, BootstrapError> {
    let actual = hash_file(archive_path)?;
    if actual != info.hash {
        let _ = fs::remove_file(archive_path);
        return Err(BootstrapError::HashMismatch {
            path: archive_path.to_path_buf(),
            expected: bs58::encode(info.hash).into_string(),
            actual: bs58::encode(actual).into_string(),
        });
    }

    fs::create_dir_all(extract_dir)?;
    let file = File::open(archive_path)?;
    let decoder = zstd::stream::Decoder::new(file)?;
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(extract_dir).map_err(BootstrapError::Extract)?;

    let mut summary = BootstrapSummary::default();
    walk_files(extract_dir, &mut |path| match read_append_vec(path) {
        Ok(parsed) => {
            summary.files_parsed += 1;
            summary.accounts_total += parsed.accounts.len();
            summary.lamports_total = summary.lamports_total.saturating_add(parsed.lamports_total);
            if parsed.truncated {
                log::warn!("append vec {} parsed with truncation", path.display());
            }
        }
        Err(e) => {
            summary.files_failed += 1;
            log::warn!("skipping unreadable append vec {}: {e}", path.display());
        }
    })?;

    Ok(summary)
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct HighestSnapshotSlotResult {
    full: Slot,
}

#[derive(Debug, Deserialize)]
struct ClusterNode {
    rpc: Option<String>,
}

/// Queries `getHighestSnapshotSlot` on `rpc_endpoint`, returning the full
/// snapshot slot a node claims to be able to serve.
pub fn discover_highest_snapshot_slot(
    client: &reqwest::blocking::Client,
    rpc_endpoint: &str,
) -> Result<Slot, TransportError> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getHighestSnapshotSlot",
    });
    let response: RpcEnvelope<HighestSnapshotSlotResult> = client
        .post(rpc_endpoint)
        .json(&body)
        .timeout(Duration::from_secs(10))
        .send()
        .map_err(|_| TransportError::ConnectionRefused {
            peer: rpc_endpoint.to_string(),
        })?
        .json()
        .map_err(TransportError::Http)?;
    Ok(response.result.full)
}

/// Queries `getClusterNodes` and probes up to [`MAX_CANDIDATE_NODES`]
/// advertised RPC addresses with an HTTP HEAD for `snapshot.tar.bz2`,
/// returning the first that answers 200 along with its content length.
pub fn discover_snapshot_source(
    client: &reqwest::blocking::Client,
    rpc_endpoint: &str,
) -> Result<(String, u64), TransportError> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getClusterNodes",
    });
    let response: RpcEnvelope<Vec<ClusterNode>> = client
        .post(rpc_endpoint)
        .json(&body)
        .timeout(Duration::from_secs(10))
        .send()
        .map_err(|_| TransportError::ConnectionRefused {
            peer: rpc_endpoint.to_string(),
        })?
        .json()
        .map_err(TransportError::Http)?;

    let candidates: Vec<&str> = response
        .result
        .iter()
        .filter_map(|n| n.rpc.as_deref())
        .filter(|rpc| !rpc.is_empty())
        .take(MAX_CANDIDATE_NODES)
        .collect();

    for rpc in candidates {
        let url = format!("http://{}/snapshot.tar.bz2", rpc);
        if let Ok(head) = client.head(&url).timeout(Duration::from_secs(5)).send() {
            if head.status().is_success() {
                let len = head
                    .headers()
                    .get(reqwest::header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                return Ok((url, len));
            }
        }
    }

    Err(TransportError::RetriesExhausted { chunk_id: u32::MAX })
}

/// Lists every snapshot archive in `dir`, parsing the filename grammar and
/// skipping anything that doesn't match.
pub fn list_snapshots(dir: &Path) -> std::io::Result<Vec<(String, SnapshotInfo)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Ok(info) = parse_filename(name) {
            found.push((name.to_string(), info));
        }
    }
    Ok(found)
}

/// Retains the newest full snapshot plus up to `keep_incremental` incremental
/// snapshots built on it, deleting everything else. Not consensus-relevant:
/// purely disk-space hygiene run by the orchestrator between bootstraps.
pub fn prune_old_snapshots(dir: &Path, keep_incremental: usize) -> std::io::Result<Vec<String>> {
    let mut snapshots = list_snapshots(dir)?;
    snapshots.sort_by_key(|(_, info)| info.slot);

    let newest_full_slot = snapshots
        .iter()
        .filter(|(_, info)| !info.is_incremental)
        .map(|(_, info)| info.slot)
        .max();

    let mut removed = Vec::new();
    let Some(newest_full_slot) = newest_full_slot else {
        return Ok(removed);
    };

    let mut incrementals: Vec<&(String, SnapshotInfo)> = snapshots
        .iter()
        .filter(|(_, info)| info.is_incremental && info.base_slot == Some(newest_full_slot))
        .collect();
    incrementals.sort_by_key(|(_, info)| info.slot);
    let keep_from = incrementals.len().saturating_sub(keep_incremental);
    let kept_incrementals: Vec<&str> = incrementals[keep_from..]
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();

    for (name, info) in &snapshots {
        let is_current_full = !info.is_incremental && info.slot == newest_full_slot;
        let is_kept_incremental = kept_incrementals.contains(&name.as_str());
        if is_current_full || is_kept_incremental {
            continue;
        }
        fs::remove_file(dir.join(name))?;
        removed.push(name.clone());
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::filename::{format_full, format_incremental};

    #[test]
    fn prune_keeps_newest_full_and_recent_incrementals() {
        let dir = tempfile::tempdir().unwrap();
        let hash = [1u8; 32];

        let old_full = format_full(100, &hash);
        let new_full = format_full(200, &hash);
        let inc_a = format_incremental(200, 210, &hash);
        let inc_b = format_incremental(200, 220, &hash);
        let inc_c = format_incremental(200, 230, &hash);
        let stale_inc = format_incremental(100, 110, &hash);

        for name in [&old_full, &new_full, &inc_a, &inc_b, &inc_c, &stale_inc] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let removed = prune_old_snapshots(dir.path(), 2).unwrap();

        assert!(removed.contains(&old_full));
        assert!(removed.contains(&stale_inc));
        assert!(removed.contains(&inc_a));
        assert!(!removed.contains(&inc_b));
        assert!(!removed.contains(&inc_c));
        assert!(dir.path().join(&new_full).exists());
        assert!(!dir.path().join(&old_full).exists());
    }

    #[test]
    fn prune_is_noop_without_a_full_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let removed = prune_old_snapshots(dir.path(), 2).unwrap();
        assert!(removed.is_empty());
    }

    fn build_archive(account_vec_bytes: &[u8]) -> (tempfile::TempDir, PathBuf, Hash) {
        let dir = tempfile::tempdir().unwrap();
        let accounts_dir = dir.path().join("staging").join("accounts");
        fs::create_dir_all(&accounts_dir).unwrap();
        fs::write(accounts_dir.join("0.0"), account_vec_bytes).unwrap();

        let mut builder = tar::Builder::new(Vec::new());
        builder
            .append_dir_all("accounts", dir.path().join("staging").join("accounts"))
            .unwrap();
        let tar_bytes = builder.into_inner().unwrap();
        let compressed = zstd::stream::encode_all(&tar_bytes[..], 3).unwrap();

        let hash = {
            let mut hasher = Sha256::new();
            hasher.update(&compressed);
            let digest = hasher.finalize();
            let mut out = [0u8; 32];
            out.copy_from_slice(&digest);
            out
        };

        let archive_path = dir.path().join("snapshot.tar.zst");
        fs::write(&archive_path, &compressed).unwrap();
        (dir, archive_path, hash)
    }

    #[test]
    fn verifies_extracts_and_loads_a_well_formed_archive() {
        let terminator = vec![0u8; crate::accounts::record::STORED_META_LEN];
        let (dir, archive_path, hash) = build_archive(&terminator);

        let info = SnapshotInfo {
            slot: 100,
            hash,
            base_slot: None,
            size_bytes: 0,
            download_url: None,
            is_incremental: false,
        };

        let extract_dir = dir.path().join("extracted");
        let summary = verify_extract_and_load(&archive_path, &info, &extract_dir).unwrap();
        assert_eq!(summary.files_parsed, 1);
        assert_eq!(summary.files_failed, 0);
        assert_eq!(summary.accounts_total, 0);
        assert!(extract_dir.join("accounts").join("0.0").exists());
    }

    #[test]
    fn rejects_and_deletes_an_archive_whose_hash_does_not_match() {
        let terminator = vec![0u8; crate::accounts::record::STORED_META_LEN];
        let (dir, archive_path, _real_hash) = build_archive(&terminator);

        let info = SnapshotInfo {
            slot: 100,
            hash: [0xFFu8; 32],
            base_slot: None,
            size_bytes: 0,
            download_url: None,
            is_incremental: false,
        };

        let extract_dir = dir.path().join("extracted");
        let err = verify_extract_and_load(&archive_path, &info, &extract_dir).unwrap_err();
        assert!(matches!(err, BootstrapError::HashMismatch { .. }));
        assert!(!archive_path.exists());
    }
}
