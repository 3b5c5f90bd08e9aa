//! Core types and data structures for the Contaplus import system

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Company context an import runs under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    /// Unique identifier for the company
    pub id: String,
    /// Legal name
    pub name: String,
    /// Code prepended to subsidiary-ledger account codes when deriving party keys
    pub party_code: String,
    /// Currency every imported invoice is denominated in
    pub currency: String,
}

/// Ledger account resolved from the host chart of accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account
    pub id: String,
    /// Account code as it appears in the chart of accounts
    pub code: String,
    /// Human-readable account name
    pub name: String,
    /// Whether lines on this account must carry a party
    pub party_required: bool,
}

/// Customer/vendor counterparty resolved from the host party directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    /// Unique identifier for the party
    pub id: String,
    /// Party code, matched by suffix against derived party keys
    pub code: String,
    /// Display name
    pub name: String,
    /// Configured payment term, required for invoice parties
    pub payment_term: Option<String>,
    /// Payment type applied to invoices the party owes us
    pub customer_payment_type: Option<String>,
    /// Payment type applied to invoices we owe the party
    pub supplier_payment_type: Option<String>,
}

/// Fiscal period a move is booked into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub id: String,
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Accounting journal moves and invoices are booked through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    pub id: String,
    pub code: String,
    pub name: String,
}

/// Tax resolved from a host tax template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    /// Unique identifier for the tax
    pub id: String,
    /// Template identifier the tax was resolved from
    pub template: String,
    /// Display name
    pub name: String,
    /// Rate as a fraction (0.21 for 21%)
    pub rate: BigDecimal,
}

/// Persisted marker for one completed file import
///
/// Every move or invoice created by an import carries an origin reference
/// back to this record, so imported data stays traceable to the file it
/// came from. The raw file bytes are attached verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    /// Unique identifier for the import
    pub id: String,
    /// Name of the imported file
    pub filename: String,
    /// Raw file contents as received
    pub data: Vec<u8>,
}

/// Lifecycle state shared by moves and invoices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingState {
    /// Built and saved but not yet booked
    Draft,
    /// Booked into the ledger
    Posted,
}

/// Single debit/credit line inside a ledger move
///
/// Owned exclusively by its move; never mutated after the move is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    /// Resolved account the line posts to
    pub account_id: String,
    /// Resolved party, present only for subsidiary-ledger accounts
    pub party_id: Option<String>,
    /// Debit amount
    pub debit: BigDecimal,
    /// Credit amount
    pub credit: BigDecimal,
    /// Line description carried over from the source record
    pub description: String,
}

/// Balanced double-entry transaction aggregated from file records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerMove {
    /// Unique identifier for the move
    pub id: String,
    /// Derived move number (configured prefix + source move id)
    pub number: String,
    /// Accounting date taken from the first record of the group
    pub date: NaiveDate,
    /// Period the date resolved into
    pub period_id: String,
    /// Journal selected for the import
    pub journal_id: String,
    /// Origin reference to the import record
    pub origin: String,
    /// Lifecycle state
    pub state: PostingState,
    /// Lines in file order
    pub lines: Vec<LedgerLine>,
}

impl LedgerMove {
    /// Total debit across all lines
    pub fn total_debit(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit).sum()
    }

    /// Total credit across all lines
    pub fn total_credit(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit).sum()
    }

    /// Check the double-entry balance invariant (debits = credits)
    pub fn is_balanced(&self) -> bool {
        self.total_debit() == self.total_credit()
    }
}

/// Single billable line inside a customer invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Revenue account the line posts to
    pub account_id: String,
    /// Always 1 for imported lines
    pub quantity: BigDecimal,
    /// Signed unit price; negative on credit notes
    pub unit_price: BigDecimal,
    /// Line description carried over from the source record
    pub description: String,
    /// Applied taxes, empty or a single element
    pub tax_ids: Vec<String>,
}

impl InvoiceLine {
    /// Line amount before tax
    pub fn amount(&self) -> BigDecimal {
        &self.quantity * &self.unit_price
    }
}

/// Outgoing customer invoice aggregated from file records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerInvoice {
    /// Unique identifier for the invoice
    pub id: String,
    /// Derived invoice number (series + source invoice id)
    pub number: String,
    /// Company the invoice belongs to
    pub company_id: String,
    /// Invoice currency
    pub currency: String,
    /// Origin reference to the import record
    pub origin: String,
    /// Invoice date taken from the receivable record of the group
    pub date: NaiveDate,
    /// Journal selected for the import
    pub journal_id: String,
    /// Invoiced party
    pub party_id: String,
    /// Payment term copied from the party
    pub payment_term: Option<String>,
    /// Payment type, buyer-side or seller-side depending on sign
    pub payment_type: Option<String>,
    /// Registry book classification key
    pub book_key: Option<String>,
    /// Operation classification key
    pub operation_key: Option<String>,
    /// Subjection/exemption classification key
    pub exemption_key: Option<String>,
    /// Lifecycle state
    pub state: PostingState,
    /// Lines in file order
    pub lines: Vec<InvoiceLine>,
    /// Amount before tax, filled in by the host tax engine
    pub untaxed_amount: BigDecimal,
    /// Tax amount, filled in by the host tax engine
    pub tax_amount: BigDecimal,
    /// Total amount, filled in by the host tax engine
    pub total_amount: BigDecimal,
}

impl CustomerInvoice {
    /// Sum of quantity x unit price across all lines
    pub fn line_total(&self) -> BigDecimal {
        self.lines.iter().map(|l| l.amount()).sum()
    }
}

/// Errors that can occur during an import
///
/// Every variant is fatal to the batch: the import aborts with no partial
/// persistence and relies on the host transaction rolling back anything
/// already written.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("could not decode field '{field}': {reason}")]
    Decode { field: String, reason: String },
    #[error("move number already exists: {0}")]
    DuplicateMoveNumber(String),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("multiple accounts found for code: {0}")]
    MultipleAccountsFound(String),
    #[error("party not found: {0}")]
    PartyNotFound(String),
    #[error("multiple parties found for key: {0}")]
    MultiplePartiesFound(String),
    #[error("party has no payment term: {0}")]
    MissingPaymentTerm(String),
    #[error("move {number} is not balanced: debit = {debit}, credit = {credit}")]
    UnbalancedMove {
        number: String,
        debit: BigDecimal,
        credit: BigDecimal,
    },
    #[error("invoice {number} total mismatch: expected {expected}, computed {computed}")]
    InvoiceTotalMismatch {
        number: String,
        expected: BigDecimal,
        computed: BigDecimal,
    },
    #[error("host error: {0}")]
    Host(String),
}

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;
