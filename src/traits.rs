//! Repository traits for host-system abstraction
//!
//! The aggregation engines never talk to the host bookkeeping system
//! directly; they depend on one narrow repository trait per entity kind.
//! Any host (Tryton-like ERP, SQL schema, in-memory test double) plugs in
//! by implementing these. Each call carries its own transactional semantics
//! on the host side; the engines assume the whole import runs inside one
//! all-or-nothing host transaction.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::*;

/// Chart-of-accounts lookup
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Resolve an account code within a company's chart of accounts
    ///
    /// Fails with [`ImportError::AccountNotFound`] on zero matches and
    /// [`ImportError::MultipleAccountsFound`] on more than one.
    async fn find_account(&self, code: &str, company: &Company) -> ImportResult<Account>;
}

/// Party directory lookup
#[async_trait]
pub trait PartyRepository: Send + Sync {
    /// Resolve a derived party key against the company's party directory
    ///
    /// The key is matched by substring, the way the legacy directory stores
    /// subsidiary-ledger codes inside party records. Fails with
    /// [`ImportError::PartyNotFound`] on zero matches and
    /// [`ImportError::MultiplePartiesFound`] on more than one.
    async fn find_party(&self, key: &str, company: &Company) -> ImportResult<Party>;
}

/// Fiscal period resolution
#[async_trait]
pub trait PeriodRepository: Send + Sync {
    /// Resolve the period a date falls into for a company
    async fn find_period(&self, company: &Company, date: NaiveDate) -> ImportResult<Period>;
}

/// Journal resolution
#[async_trait]
pub trait JournalRepository: Send + Sync {
    /// Resolve a journal of the given kind for a company
    async fn find_journal(&self, kind: &str, company: &Company) -> ImportResult<Journal>;
}

/// Tax resolution
#[async_trait]
pub trait TaxRepository: Send + Sync {
    /// Resolve the company tax created from a tax template
    async fn find_tax(&self, template: &str, company: &Company) -> ImportResult<Tax>;
}

/// Ledger move persistence
#[async_trait]
pub trait MoveRepository: Send + Sync {
    /// Whether a move with this number already exists in the store
    async fn number_exists(&self, number: &str) -> ImportResult<bool>;

    /// Save all moves of the batch
    async fn save_moves(&self, moves: &[LedgerMove]) -> ImportResult<()>;

    /// Transition saved moves to the posted state
    async fn post_moves(&self, ids: &[String]) -> ImportResult<()>;
}

/// Customer invoice persistence
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Save all invoices of the batch
    async fn save_invoices(&self, invoices: &[CustomerInvoice]) -> ImportResult<()>;

    /// Recompute taxes and totals through the host tax engine
    ///
    /// Returns the invoices with `untaxed_amount`, `tax_amount` and
    /// `total_amount` filled in.
    async fn update_taxes(&self, ids: &[String]) -> ImportResult<Vec<CustomerInvoice>>;

    /// Transition saved invoices to the posted state
    async fn post_invoices(&self, ids: &[String]) -> ImportResult<()>;
}

/// Import record persistence
#[async_trait]
pub trait ImportRecordRepository: Send + Sync {
    /// Create the persisted marker for one file import, raw bytes attached
    async fn create_import_record(&self, filename: &str, data: &[u8])
        -> ImportResult<ImportRecord>;
}

/// Everything the importer needs from the host system
pub trait HostSystem:
    AccountRepository
    + PartyRepository
    + PeriodRepository
    + JournalRepository
    + TaxRepository
    + MoveRepository
    + InvoiceRepository
    + ImportRecordRepository
{
}

impl<T> HostSystem for T where
    T: AccountRepository
        + PartyRepository
        + PeriodRepository
        + JournalRepository
        + TaxRepository
        + MoveRepository
        + InvoiceRepository
        + ImportRecordRepository
{
}
