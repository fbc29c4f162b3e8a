//! AppendVec account storage: parsing fixed-layout records from snapshot files.

pub mod append_vec;
pub mod record;

pub use append_vec::{read_append_vec, AppendVecError, ParseSummary};
pub use record::{AccountMeta, AccountRecord, StoredMeta};
