//! AppendVec parsing: sequential fixed-layout records packed into one file,
//! each 8-byte aligned (spec §4.5).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use memmap2::Mmap;

use crate::accounts::record::{
    AccountMeta, AccountRecord, StoredMeta, ACCOUNT_META_LEN, MAX_ACCOUNT_DATA_LEN,
    STORED_META_LEN,
};

const MMAP_THRESHOLD: u64 = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum AppendVecError {
    #[error("io error reading append vec: {0}")]
    Io(#[from] std::io::Error),
    #[error("truncated record at offset {offset}: need {need} bytes, have {have}")]
    Truncated { offset: u64, need: u64, have: u64 },
}

/// Outcome of parsing one AppendVec file: the accounts recovered plus a count
/// of how many bytes were left unparsed because of truncation or corruption.
#[derive(Debug, Default)]
pub struct ParseSummary {
    pub accounts: Vec<AccountRecord>,
    pub lamports_total: u64,
    pub bytes_parsed: u64,
    pub truncated: bool,
}

enum Source {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl Source {
    fn bytes(&self) -> &[u8] {
        match self {
            Source::Mapped(m) => &m[..],
            Source::Buffered(b) => &b[..],
        }
    }
}

fn align_up_8(offset: u64) -> u64 {
    (offset + 7) & !7
}

/// Parses every account record out of `path`. Files larger than 1 MiB are
/// memory-mapped; smaller files are read fully into a heap buffer, matching
/// the teacher's mmap-above-threshold convention for large read-only blobs.
///
/// Stops at the first zero `StoredMeta` (stream terminator) or the first
/// truncated/corrupt record, reporting whatever was parsed so far rather than
/// failing the whole file (property P10: partial results are still usable).
pub fn read_append_vec(path: &Path) -> Result<ParseSummary, AppendVecError> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();

    let source = if len >= MMAP_THRESHOLD {
        let mmap = unsafe { Mmap::map(&file)? };
        Source::Mapped(mmap)
    } else {
        let mut buf = Vec::with_capacity(len as usize);
        (&file).take(len).read_to_end(&mut buf)?;
        Source::Buffered(buf)
    };

    parse_bytes(source.bytes())
}

fn parse_bytes(data: &[u8]) -> Result<ParseSummary, AppendVecError> {
    let mut summary = ParseSummary::default();
    let mut offset: u64 = 0;

    loop {
        if offset as usize >= data.len() {
            break;
        }
        let remaining = data.len() as u64 - offset;
        if remaining < STORED_META_LEN as u64 {
            summary.truncated = true;
            break;
        }

        let stored_meta_buf = &data[offset as usize..(offset as usize + STORED_META_LEN)];
        let stored_meta = StoredMeta::parse(stored_meta_buf).expect("length checked above");

        if stored_meta.is_terminator() {
            break;
        }

        if stored_meta.data_len > MAX_ACCOUNT_DATA_LEN {
            summary.truncated = true;
            break;
        }

        let meta_offset = offset + STORED_META_LEN as u64;
        let account_meta_end = meta_offset + ACCOUNT_META_LEN as u64;
        if account_meta_end > data.len() as u64 {
            summary.truncated = true;
            break;
        }
        let account_meta_buf =
            &data[meta_offset as usize..account_meta_end as usize];
        let account_meta = AccountMeta::parse(account_meta_buf).expect("length checked above");

        let data_start = account_meta_end;
        let data_end = data_start + stored_meta.data_len;
        if data_end > data.len() as u64 {
            summary.truncated = true;
            break;
        }

        let account_data = data[data_start as usize..data_end as usize].to_vec();

        // A trailing 32-byte hash follows whenever the file has room for one;
        // there is no separate presence flag, so "room for 32 more bytes"
        // doubles as the optional hash's presence test (spec §4.5's loop).
        let (hash, after_hash) = if data_end + 32 <= data.len() as u64 {
            let mut h = [0u8; 32];
            h.copy_from_slice(&data[data_end as usize..(data_end + 32) as usize]);
            (Some(h), data_end + 32)
        } else {
            (None, data_end)
        };

        summary.lamports_total = summary.lamports_total.saturating_add(account_meta.lamports);
        summary.accounts.push(AccountRecord {
            pubkey: stored_meta.pubkey,
            lamports: account_meta.lamports,
            rent_epoch: account_meta.rent_epoch,
            owner: account_meta.owner,
            executable: account_meta.executable,
            data: account_data,
            hash,
        });

        offset = align_up_8(after_hash);
        summary.bytes_parsed = offset;
    }

    Ok(summary)
}
