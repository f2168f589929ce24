//! Fixed log-line grammar and per-unit batch normalization.
//!
//! [parse_line] turns one raw line into a typed [Record] (or nothing, for
//! malformed lines); [normalize] folds a unit's lines into a deduplicated
//! [Batch] ready for reconciliation.

mod batch;
mod line;

pub use batch::{normalize, Batch};
pub use line::{parse_line, unit_date, Record, DELETE_MARKER, INIT_SUFFIX};
