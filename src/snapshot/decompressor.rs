//! Pipelined streaming decompression: a worker thread drains compressed
//! chunks from a bounded queue and pushes decompressed chunks to another.

use std::io::Read;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Zstd,
    Lz4,
    Gzip,
    None,
}

#[derive(Debug, thiserror::Error)]
pub enum DecompressError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn decompress_one(codec: Codec, data: &[u8]) -> Result<Vec<u8>, DecompressError> {
    match codec {
        Codec::None => Ok(data.to_vec()),
        Codec::Zstd => {
            let mut out = Vec::new();
            zstd::stream::copy_decode(data, &mut out)?;
            Ok(out)
        }
        Codec::Lz4 => {
            let mut decoder = lz4::Decoder::new(data)?;
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
        Codec::Gzip => {
            let mut decoder = flate2::read::GzDecoder::new(data);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
    }
}

/// A pipelined decompressor: `push` feeds compressed chunks in, `pop` yields
/// decompressed chunks out, in the order they were pushed. Both queues are
/// bounded by `max_queue_size` so a slow consumer applies back-pressure to
/// the producer feeding `push`.
pub struct StreamingDecompressor {
    input_tx: Option<Sender<Vec<u8>>>,
    output_rx: Receiver<Result<Vec<u8>, DecompressError>>,
    worker: Option<JoinHandle<()>>,
}

impl StreamingDecompressor {
    pub fn spawn(codec: Codec, max_queue_size: usize) -> Self {
        let (input_tx, input_rx) = bounded::<Vec<u8>>(max_queue_size);
        let (output_tx, output_rx) = bounded::<Result<Vec<u8>, DecompressError>>(max_queue_size);

        let worker = std::thread::spawn(move || {
            for chunk in input_rx.iter() {
                let result = decompress_one(codec, &chunk);
                if output_tx.send(result).is_err() {
                    break;
                }
            }
        });

        Self {
            input_tx: Some(input_tx),
            output_rx,
            worker: Some(worker),
        }
    }

    /// Pushes a compressed chunk. Blocks if the input queue is full.
    pub fn push(&self, chunk: Vec<u8>) {
        if let Some(tx) = &self.input_tx {
            let _ = tx.send(chunk);
        }
    }

    /// Pops the next decompressed chunk, blocking until one is ready. Returns
    /// `None` once `close()` has been called and every pushed chunk has been
    /// drained.
    pub fn pop(&self) -> Option<Result<Vec<u8>, DecompressError>> {
        self.output_rx.recv().ok()
    }

    /// Signals end-of-stream: no more chunks will be pushed. Subsequent
    /// `pop()` calls drain whatever remains, then return `None`.
    pub fn close(&mut self) {
        self.input_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for StreamingDecompressor {
    fn drop(&mut self) {
        self.close();
    }
}
