//! Import orchestrator
//!
//! Single synchronous entry point for one Contaplus file: decode and
//! filter the records, create the import record the aggregates will
//! reference as their origin, then hand off to the move or invoice
//! engine. Any error aborts the whole run; the host transaction is
//! expected to roll back whatever was already saved.

use tracing::info;
use uuid::Uuid;

use crate::config::ImportConfig;
use crate::invoices::InvoiceImporter;
use crate::moves::MoveImporter;
use crate::reader;
use crate::traits::HostSystem;
use crate::types::*;

/// What the file's records should be aggregated into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Ledger moves grouped by move id
    Moves,
    /// Customer invoices grouped by series + invoice number
    Invoices,
}

/// One import request: a file plus the context it runs under
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Name of the uploaded file, kept on the import record
    pub filename: String,
    /// Raw file bytes
    pub data: Vec<u8>,
    /// Kind of journal to book through, resolved against the host
    pub journal_kind: String,
    /// Aggregation mode
    pub mode: ImportMode,
    /// Company the import belongs to
    pub company: Company,
}

/// Identifiers of everything one import created
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    /// The import record, empty in dry runs
    pub import_record_id: Option<String>,
    /// Created ledger moves, in file order
    pub move_ids: Vec<String>,
    /// Created customer invoices, in file order
    pub invoice_ids: Vec<String>,
}

/// Imports Contaplus export files into the host bookkeeping system
pub struct ContaplusImporter<H: HostSystem> {
    host: H,
    config: ImportConfig,
}

impl<H: HostSystem> ContaplusImporter<H> {
    /// Create an importer with the default configuration
    pub fn new(host: H) -> Self {
        Self {
            host,
            config: ImportConfig::default(),
        }
    }

    /// Create an importer with a custom configuration
    pub fn with_config(host: H, config: ImportConfig) -> Self {
        Self { host, config }
    }

    /// Run one import batch to completion
    pub async fn import(&self, request: ImportRequest) -> ImportResult<ImportOutcome> {
        let content = String::from_utf8_lossy(&request.data);
        let records = reader::read(&content)?;
        info!(
            filename = %request.filename,
            records = records.len(),
            "import started"
        );

        let journal = self
            .host
            .find_journal(&request.journal_kind, &request.company)
            .await?;

        // Dry runs must not leave a trace; the origin reference is synthesized.
        let import_record = if self.config.dry_run {
            ImportRecord {
                id: Uuid::new_v4().to_string(),
                filename: request.filename.clone(),
                data: request.data.clone(),
            }
        } else {
            self.host
                .create_import_record(&request.filename, &request.data)
                .await?
        };

        let mut outcome = ImportOutcome::default();
        if !self.config.dry_run {
            outcome.import_record_id = Some(import_record.id.clone());
        }

        match request.mode {
            ImportMode::Moves => {
                let importer = MoveImporter::new(&self.host, &self.config);
                let moves = importer
                    .run(&records, &request.company, &journal, &import_record)
                    .await?;
                outcome.move_ids = moves.into_iter().map(|m| m.id).collect();
            }
            ImportMode::Invoices => {
                let importer = InvoiceImporter::new(&self.host, &self.config);
                let invoices = importer
                    .run(&records, &request.company, &journal, &import_record)
                    .await?;
                outcome.invoice_ids = invoices.into_iter().map(|i| i.id).collect();
            }
        }

        info!(
            moves = outcome.move_ids.len(),
            invoices = outcome.invoice_ids.len(),
            "import finished"
        );
        Ok(outcome)
    }
}
