//! Parallel, resumable chunked download of a snapshot archive.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::types::Hash;

pub const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024 * 1024;
pub const DEFAULT_MAX_PARALLEL: usize = 8;
pub const MAX_WORKER_CAP: usize = 16;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
const RESUME_MAGIC: &[u8; 8] = b"VXRSNAP1";
const RESUME_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection refused by {peer}")]
    ConnectionRefused { peer: String },
    #[error("request to {peer} timed out after {timeout_ms}ms")]
    Timeout { peer: String, timeout_ms: u64 },
    #[error("{peer} responded with status {status}")]
    Status { peer: String, status: u16 },
    #[error("chunk {chunk_id} exhausted its retry budget")]
    RetriesExhausted { chunk_id: u32 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct DownloadChunk {
    pub id: u32,
    pub start_byte: u64,
    pub end_byte: u64,
    pub status: ChunkStatus,
    pub assigned_peer: Option<String>,
    pub retry_count: u32,
}

#[derive(Debug, Clone)]
pub struct Peer {
    pub address: String,
    pub latency_ms: u32,
    pub bandwidth_mbps: u32,
    pub success_rate: f64,
}

impl Peer {
    pub fn score(&self) -> f64 {
        1000.0 / (self.latency_ms.max(1).min(1000) as f64)
            + self.bandwidth_mbps as f64 * 10.0
            + 100.0 * self.success_rate
    }
}

fn best_peer(peers: &[Peer]) -> Option<&Peer> {
    peers.iter().max_by(|a, b| {
        a.score()
            .partial_cmp(&b.score())
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

#[derive(Debug, Default)]
pub struct DownloadCounters {
    pub downloaded_bytes: AtomicU64,
    pub chunks_completed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadProgress {
    pub downloaded_bytes: u64,
    pub chunks_completed: u64,
    pub chunks_total: u64,
}

pub struct DownloaderConfig {
    pub chunk_size: u64,
    pub max_parallel: usize,
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub progress_interval_ms: u64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_parallel: DEFAULT_MAX_PARALLEL,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout_ms: 30_000,
            progress_interval_ms: 1_000,
        }
    }
}

/// Downloads a snapshot archive in parallel range-requested chunks, with
/// CAS-guarded chunk claiming and a resumable on-disk progress file.
pub struct ParallelDownloader {
    config: DownloaderConfig,
    chunks: Mutex<Vec<DownloadChunk>>,
    counters: Arc<DownloadCounters>,
    shutdown: Arc<AtomicBool>,
    next_claim: AtomicU32,
}

impl ParallelDownloader {
    pub fn new(total_size: u64, config: DownloaderConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        let n = total_size.div_ceil(chunk_size);
        let mut chunks = Vec::with_capacity(n as usize);
        for id in 0..n {
            let start = id * chunk_size;
            let end = ((id + 1) * chunk_size - 1).min(total_size.saturating_sub(1));
            chunks.push(DownloadChunk {
                id: id as u32,
                start_byte: start,
                end_byte: end,
                status: ChunkStatus::Pending,
                assigned_peer: None,
                retry_count: 0,
            });
        }
        Self {
            config,
            chunks: Mutex::new(chunks),
            counters: Arc::new(DownloadCounters::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
            next_claim: AtomicU32::new(0),
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn progress(&self) -> DownloadProgress {
        let chunks = self.chunks.lock().expect("chunk table lock poisoned");
        DownloadProgress {
            downloaded_bytes: self.counters.downloaded_bytes.load(Ordering::Relaxed),
            chunks_completed: self.counters.chunks_completed.load(Ordering::Relaxed),
            chunks_total: chunks.len() as u64,
        }
    }

    /// Applies a resume file: chunks present in `completed_ids` are marked
    /// `Completed` up front and are never reassigned to a worker.
    pub fn apply_resume(&self, completed_ids: &[u32]) {
        let mut chunks = self.chunks.lock().expect("chunk table lock poisoned");
        for id in completed_ids {
            if let Some(chunk) = chunks.get_mut(*id as usize) {
                chunk.status = ChunkStatus::Completed;
                self.counters
                    .downloaded_bytes
                    .fetch_add(chunk.end_byte - chunk.start_byte + 1, Ordering::Relaxed);
                self.counters.chunks_completed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Atomically claims the next `pending` chunk (CAS `pending -> downloading`).
    fn claim_chunk(&self) -> Option<DownloadChunk> {
        let mut chunks = self.chunks.lock().expect("chunk table lock poisoned");
        let len = chunks.len() as u32;
        let start = self.next_claim.load(Ordering::Relaxed);
        for offset in 0..len {
            let idx = ((start + offset) % len) as usize;
            if chunks[idx].status == ChunkStatus::Pending {
                chunks[idx].status = ChunkStatus::Downloading;
                self.next_claim.store((idx as u32 + 1) % len, Ordering::Relaxed);
                return Some(chunks[idx].clone());
            }
        }
        None
    }

    fn mark_completed(&self, id: u32, peer: &str) {
        let mut chunks = self.chunks.lock().expect("chunk table lock poisoned");
        let chunk = &mut chunks[id as usize];
        chunk.status = ChunkStatus::Completed;
        chunk.assigned_peer = Some(peer.to_string());
        self.counters
            .downloaded_bytes
            .fetch_add(chunk.end_byte - chunk.start_byte + 1, Ordering::Relaxed);
        self.counters.chunks_completed.fetch_add(1, Ordering::Relaxed);
    }

    fn mark_retry_or_failed(&self, id: u32) -> bool {
        let mut chunks = self.chunks.lock().expect("chunk table lock poisoned");
        let chunk = &mut chunks[id as usize];
        chunk.retry_count += 1;
        if chunk.retry_count >= self.config.max_retries {
            chunk.status = ChunkStatus::Failed;
            false
        } else {
            chunk.status = ChunkStatus::Pending;
            true
        }
    }

    pub fn completed_chunk_ids(&self) -> Vec<u32> {
        let chunks = self.chunks.lock().expect("chunk table lock poisoned");
        chunks
            .iter()
            .filter(|c| c.status == ChunkStatus::Completed)
            .map(|c| c.id)
            .collect()
    }

    pub fn any_failed(&self) -> bool {
        let chunks = self.chunks.lock().expect("chunk table lock poisoned");
        chunks.iter().any(|c| c.status == ChunkStatus::Failed)
    }

    /// True once every chunk has reached a terminal state (`Completed` or
    /// `Failed`) — used by the progress reporter to know when to stop.
    fn all_terminal(&self) -> bool {
        let chunks = self.chunks.lock().expect("chunk table lock poisoned");
        chunks
            .iter()
            .all(|c| matches!(c.status, ChunkStatus::Completed | ChunkStatus::Failed))
    }

    /// Runs `min(max_parallel, 16)` worker threads against `peers`, writing
    /// ranges into `output_path` at their absolute offsets. Blocks until every
    /// chunk is `Completed` or `Failed`, or shutdown is requested.
    pub fn run(
        &self,
        client: &reqwest::blocking::Client,
        peers: &[Peer],
        output_path: &std::path::Path,
        total_size: u64,
    ) -> Result<(), TransportError> {
        preallocate(output_path, total_size)?;
        let num_workers = self.config.max_parallel.clamp(1, MAX_WORKER_CAP);

        std::thread::scope(|scope| {
            for _ in 0..num_workers {
                scope.spawn(|| self.worker_loop(client, peers, output_path));
            }
        });

        if self.any_failed() {
            return Err(TransportError::RetriesExhausted { chunk_id: u32::MAX });
        }
        Ok(())
    }

    /// Same as [`Self::run`], plus a dedicated reporter thread that invokes
    /// `on_progress` every `progress_interval_ms` until every chunk reaches a
    /// terminal state (spec's "progress reporter thread").
    pub fn run_with_progress<F>(
        &self,
        client: &reqwest::blocking::Client,
        peers: &[Peer],
        output_path: &std::path::Path,
        total_size: u64,
        on_progress: F,
    ) -> Result<(), TransportError>
    where
        F: Fn(DownloadProgress) + Send + Sync,
    {
        preallocate(output_path, total_size)?;
        let num_workers = self.config.max_parallel.clamp(1, MAX_WORKER_CAP);
        let interval = Duration::from_millis(self.config.progress_interval_ms.max(1));

        std::thread::scope(|scope| {
            for _ in 0..num_workers {
                scope.spawn(|| self.worker_loop(client, peers, output_path));
            }
            scope.spawn(|| loop {
                on_progress(self.progress());
                if self.shutdown.load(Ordering::SeqCst) || self.all_terminal() {
                    break;
                }
                std::thread::sleep(interval);
            });
        });

        if self.any_failed() {
            return Err(TransportError::RetriesExhausted { chunk_id: u32::MAX });
        }
        Ok(())
    }

    fn worker_loop(
        &self,
        client: &reqwest::blocking::Client,
        peers: &[Peer],
        output_path: &std::path::Path,
    ) {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            let Some(chunk) = self.claim_chunk() else {
                return;
            };
            let Some(peer) = best_peer(peers) else {
                self.mark_retry_or_failed(chunk.id);
                return;
            };

            match fetch_range(client, peer, chunk.start_byte, chunk.end_byte, self.config.timeout_ms) {
                Ok(bytes) => match write_at(output_path, chunk.start_byte, &bytes) {
                    Ok(()) => self.mark_completed(chunk.id, &peer.address),
                    Err(_) => {
                        self.mark_retry_or_failed(chunk.id);
                    }
                },
                Err(_) => {
                    self.mark_retry_or_failed(chunk.id);
                }
            }
        }
    }
}

fn preallocate(path: &std::path::Path, total_size: u64) -> std::io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)?;
    file.set_len(total_size)
}

fn write_at(path: &std::path::Path, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)
}

fn fetch_range(
    client: &reqwest::blocking::Client,
    peer: &Peer,
    start: u64,
    end: u64,
    timeout_ms: u64,
) -> Result<Vec<u8>, TransportError> {
    let url = format!("http://{}/snapshot.tar.bz2", peer.address);
    let response = client
        .get(&url)
        .header("Range", format!("bytes={}-{}", start, end))
        .timeout(Duration::from_millis(timeout_ms))
        .send()
        .map_err(|_| TransportError::ConnectionRefused {
            peer: peer.address.clone(),
        })?;

    if !response.status().is_success() {
        return Err(TransportError::Status {
            peer: peer.address.clone(),
            status: response.status().as_u16(),
        });
    }

    let mut bytes = Vec::new();
    response
        .take((end - start + 1) as u64)
        .read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Serializes the resume file body (spec's `VXRSNAP1` format).
pub fn serialize_resume(slot: u64, hash: &Hash, total_size: u64, chunk_size: u64, completed: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + 4 + 8 + 32 + 8 + 8 + 4 + completed.len() * 4);
    out.extend_from_slice(RESUME_MAGIC);
    out.extend_from_slice(&RESUME_VERSION.to_le_bytes());
    out.extend_from_slice(&slot.to_le_bytes());
    out.extend_from_slice(hash);
    out.extend_from_slice(&total_size.to_le_bytes());
    out.extend_from_slice(&chunk_size.to_le_bytes());
    out.extend_from_slice(&(completed.len() as u32).to_le_bytes());
    for id in completed {
        out.extend_from_slice(&id.to_le_bytes());
    }
    out
}

#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    #[error("resume file too short")]
    Truncated,
    #[error("bad magic in resume file")]
    InvalidMagic,
    #[error("unsupported resume file version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Clone)]
pub struct ResumeState {
    pub slot: u64,
    pub hash: Hash,
    pub total_size: u64,
    pub chunk_size: u64,
    pub completed_chunk_ids: Vec<u32>,
}

pub fn deserialize_resume(buf: &[u8]) -> Result<ResumeState, ResumeError> {
    if buf.len() < 8 + 4 + 8 + 32 + 8 + 8 + 4 {
        return Err(ResumeError::Truncated);
    }
    if &buf[0..8] != RESUME_MAGIC {
        return Err(ResumeError::InvalidMagic);
    }
    let version = u32::from_le_bytes(buf[8..12].try_into().unwrap());
    if version != RESUME_VERSION {
        return Err(ResumeError::UnsupportedVersion(version));
    }
    let slot = u64::from_le_bytes(buf[12..20].try_into().unwrap());
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&buf[20..52]);
    let total_size = u64::from_le_bytes(buf[52..60].try_into().unwrap());
    let chunk_size = u64::from_le_bytes(buf[60..68].try_into().unwrap());
    let n = u32::from_le_bytes(buf[68..72].try_into().unwrap()) as usize;

    let needed = 72 + n * 4;
    if buf.len() < needed {
        return Err(ResumeError::Truncated);
    }
    let mut completed_chunk_ids = Vec::with_capacity(n);
    for i in 0..n {
        let off = 72 + i * 4;
        completed_chunk_ids.push(u32::from_le_bytes(buf[off..off + 4].try_into().unwrap()));
    }

    Ok(ResumeState {
        slot,
        hash,
        total_size,
        chunk_size,
        completed_chunk_ids,
    })
}

/// Path conventionally used for a slot's resume file (`/tmp/vexor-download-<slot>.resume`).
pub fn resume_path(slot: u64) -> std::path::PathBuf {
    std::path::PathBuf::from(format!("/tmp/vexor-download-{}.resume", slot))
}

pub fn save_resume(path: &std::path::Path, state: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(state)
}

pub fn load_resume(path: &std::path::Path) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn chunk_count_covers_total_size() {
        let downloader = ParallelDownloader::new(150, DownloaderConfig { chunk_size: 64, ..Default::default() });
        let chunks = downloader.chunks.lock().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start_byte, 0);
        assert_eq!(chunks[0].end_byte, 63);
        assert_eq!(chunks[2].start_byte, 128);
        assert_eq!(chunks[2].end_byte, 149);
    }

    #[test]
    fn claim_chunk_is_exclusive() {
        let downloader = ParallelDownloader::new(200, DownloaderConfig { chunk_size: 64, ..Default::default() });
        let a = downloader.claim_chunk().unwrap();
        let b = downloader.claim_chunk().unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn retry_then_fail_after_max_retries() {
        let downloader = ParallelDownloader::new(64, DownloaderConfig { chunk_size: 64, max_retries: 2, ..Default::default() });
        let chunk = downloader.claim_chunk().unwrap();
        assert!(downloader.mark_retry_or_failed(chunk.id));
        let chunk = downloader.claim_chunk().unwrap();
        assert!(!downloader.mark_retry_or_failed(chunk.id));
        assert!(downloader.any_failed());
    }

    #[test]
    fn resume_apply_skips_completed_chunks() {
        let downloader = ParallelDownloader::new(192, DownloaderConfig { chunk_size: 64, ..Default::default() });
        downloader.apply_resume(&[0, 1]);
        let chunk = downloader.claim_chunk().unwrap();
        assert_eq!(chunk.id, 2);
        assert_eq!(downloader.progress().chunks_completed, 2);
    }

    #[test]
    fn resume_round_trip() {
        let bytes = serialize_resume(42, &[3u8; 32], 1000, 64, &[0, 1, 2]);
        let state = deserialize_resume(&bytes).unwrap();
        assert_eq!(state.slot, 42);
        assert_eq!(state.hash, [3u8; 32]);
        assert_eq!(state.total_size, 1000);
        assert_eq!(state.chunk_size, 64);
        assert_eq!(state.completed_chunk_ids, vec![0, 1, 2]);
    }

    #[test]
    fn resume_rejects_bad_magic() {
        let mut bytes = serialize_resume(1, &[0u8; 32], 10, 10, &[]);
        bytes[0] = b'X';
        assert!(matches!(deserialize_resume(&bytes), Err(ResumeError::InvalidMagic)));
    }

    #[test]
    fn preallocated_writes_cover_every_byte_without_overlap() {
        // Exercises the same preallocate + per-chunk write_at path `run`
        // uses, without a network round trip (P11): every offset in
        // [0, total_size) ends up holding the byte the source served there,
        // and chunk byte ranges never overlap.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.tar.zst");
        let source: Vec<u8> = (0u8..=255).cycle().take(1000).collect();

        let downloader = ParallelDownloader::new(
            source.len() as u64,
            DownloaderConfig { chunk_size: 137, ..Default::default() },
        );
        preallocate(&path, source.len() as u64).unwrap();

        while let Some(chunk) = downloader.claim_chunk() {
            let slice = &source[chunk.start_byte as usize..=chunk.end_byte as usize];
            write_at(&path, chunk.start_byte, slice).unwrap();
            downloader.mark_completed(chunk.id, "test-peer");
        }

        let written = fs::read(&path).unwrap();
        assert_eq!(written, source);
        assert_eq!(downloader.progress().chunks_completed, downloader.progress().chunks_total);
    }

    #[test]
    fn peer_score_favors_low_latency_high_bandwidth() {
        let fast = Peer {
            address: "a".into(),
            latency_ms: 10,
            bandwidth_mbps: 100,
            success_rate: 0.99,
        };
        let slow = Peer {
            address: "b".into(),
            latency_ms: 900,
            bandwidth_mbps: 1,
            success_rate: 0.5,
        };
        assert!(fast.score() > slow.score());
        assert_eq!(best_peer(&[slow.clone(), fast.clone()]).unwrap().address, "a");
    }
}
