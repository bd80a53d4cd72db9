//! Worklist input formats for the liquid-handling executor.

mod dilution;
mod hash;
mod pooling;
mod serde;
mod summary;
pub mod table;

pub use dilution::{
    parse_dilution, read_dilution, DilutionEntry, DilutionWorklist, DNA_COLUMN, WATER_COLUMN,
    WELL_COLUMN,
};
pub use hash::stable_hash_string;
pub use pooling::{
    parse_pooling, read_pooling, PoolingWorklist, DESTINATION_COLUMN, SOURCE_COLUMN,
    VOLUME_COLUMN,
};
pub use summary::{summarize_dilution, summarize_pooling, VolumeTotal, WorklistKind, WorklistSummary};

pub use serde::to_canonical_json_bytes;
