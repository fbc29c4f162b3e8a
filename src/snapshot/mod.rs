//! Snapshot discovery, parallel download, and streaming decompression.

pub mod decompressor;
pub mod downloader;
pub mod filename;
pub mod orchestrator;

pub use decompressor::{Codec, StreamingDecompressor};
pub use downloader::{DownloadChunk, DownloaderConfig, ParallelDownloader, Peer, TransportError};
pub use filename::{parse_filename, SnapshotInfo};
pub use orchestrator::{verify_extract_and_load, BootstrapError, BootstrapSummary};
