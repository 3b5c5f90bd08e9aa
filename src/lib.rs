//! # Contaplus Import
//!
//! An import engine for fixed-width Contaplus accounting exports,
//! converting each physical record into structured entries of a
//! double-entry bookkeeping system.
//!
//! ## Features
//!
//! - **Fixed-width decoding**: declarative 297-character record layout with
//!   typed field decoders
//! - **Move aggregation**: folds flat line records into balanced ledger
//!   moves, with batch-wide balance validation
//! - **Invoice aggregation**: builds outgoing customer invoices with party,
//!   tax and total validation against the source file
//! - **Legacy-data tolerance**: configurable correction tables, description
//!   heuristics and subsidiary-ledger prefix rules
//! - **Host abstraction**: trait-based repositories keep the engine
//!   independent of the surrounding bookkeeping system
//!
//! ## Quick Start
//!
//! ```rust
//! use contaplus_import::{ContaplusImporter, ImportMode, ImportRequest};
//!
//! // This example shows basic usage - you need to implement the repository
//! // traits for your host system (see utils::memory_host for a reference).
//! // let importer = ContaplusImporter::new(your_host);
//! // let outcome = importer.import(request).await?;
//! ```

pub mod config;
pub mod importer;
pub mod invoices;
pub mod layout;
pub mod moves;
pub mod normalize;
pub mod reader;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use importer::*;
pub use invoices::InvoiceImporter;
pub use layout::*;
pub use moves::MoveImporter;
pub use normalize::*;
pub use traits::*;
pub use types::*;
