//! Line reader and filter pipeline over the fixed-width decoder
//!
//! Splits the raw export into physical lines, decodes every line against the
//! Contaplus entry layout and aborts on the first line that does not cover
//! the layout. There is no partial recovery; a malformed line fails the
//! whole import.

use crate::layout::{entry_layout, DecodedRecord};
use crate::types::{ImportError, ImportResult};

/// Decode every line of `content`, in file order
pub fn read_all(content: &str) -> ImportResult<Vec<DecodedRecord>> {
    let layout = entry_layout();
    content
        .lines()
        .map(|line| {
            if !layout.validate(line) {
                return Err(ImportError::InvalidRecord(line.to_string()));
            }
            layout.decode(line)
        })
        .collect()
}

/// Decode every line and keep only records with a postable account
///
/// Administrative lines carry no account code; nothing can be booked from
/// them, so the aggregation engines never see them.
pub fn read(content: &str) -> ImportResult<Vec<DecodedRecord>> {
    let records = read_all(content)?;
    Ok(records
        .into_iter()
        .filter(|record| !record.trimmed("sub_cta").is_empty())
        .collect())
}
