//! In-memory host system implementation for testing
//!
//! Plays the part of the host bookkeeping system: a small chart of
//! accounts, a party directory, periods, journals, taxes and stores for
//! saved moves and invoices. The tax engine is a flat rate application,
//! which is all the import validation needs.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

/// In-memory host system for testing and development
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    accounts: Arc<RwLock<Vec<Account>>>,
    parties: Arc<RwLock<Vec<Party>>>,
    periods: Arc<RwLock<Vec<Period>>>,
    journals: Arc<RwLock<Vec<Journal>>>,
    taxes: Arc<RwLock<Vec<Tax>>>,
    moves: Arc<RwLock<HashMap<String, LedgerMove>>>,
    invoices: Arc<RwLock<HashMap<String, CustomerInvoice>>>,
    known_move_numbers: Arc<RwLock<HashSet<String>>>,
    import_records: Arc<RwLock<Vec<ImportRecord>>>,
}

impl MemoryHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account to the chart of accounts
    pub fn add_account(&self, account: Account) {
        self.accounts.write().unwrap().push(account);
    }

    /// Add a party to the directory
    pub fn add_party(&self, party: Party) {
        self.parties.write().unwrap().push(party);
    }

    /// Add a fiscal period
    pub fn add_period(&self, period: Period) {
        self.periods.write().unwrap().push(period);
    }

    /// Add a journal
    pub fn add_journal(&self, journal: Journal) {
        self.journals.write().unwrap().push(journal);
    }

    /// Add a tax
    pub fn add_tax(&self, tax: Tax) {
        self.taxes.write().unwrap().push(tax);
    }

    /// Mark a move number as already present in the persisted store
    pub fn seed_move_number(&self, number: &str) {
        self.known_move_numbers
            .write()
            .unwrap()
            .insert(number.to_string());
    }

    /// Saved moves, in no particular order
    pub fn saved_moves(&self) -> Vec<LedgerMove> {
        self.moves.read().unwrap().values().cloned().collect()
    }

    /// Saved invoices, in no particular order
    pub fn saved_invoices(&self) -> Vec<CustomerInvoice> {
        self.invoices.read().unwrap().values().cloned().collect()
    }

    /// Created import records, in creation order
    pub fn import_records(&self) -> Vec<ImportRecord> {
        self.import_records.read().unwrap().clone()
    }

    fn tax_by_id(&self, id: &str) -> Option<Tax> {
        self.taxes.read().unwrap().iter().find(|t| t.id == id).cloned()
    }
}

#[async_trait]
impl AccountRepository for MemoryHost {
    async fn find_account(&self, code: &str, _company: &Company) -> ImportResult<Account> {
        let accounts = self.accounts.read().unwrap();
        let matches: Vec<&Account> = accounts.iter().filter(|a| a.code == code).collect();
        match matches.as_slice() {
            [] => Err(ImportError::AccountNotFound(code.to_string())),
            [account] => Ok((*account).clone()),
            _ => Err(ImportError::MultipleAccountsFound(code.to_string())),
        }
    }
}

#[async_trait]
impl PartyRepository for MemoryHost {
    async fn find_party(&self, key: &str, _company: &Company) -> ImportResult<Party> {
        let parties = self.parties.read().unwrap();
        let matches: Vec<&Party> = parties.iter().filter(|p| key.contains(&p.code)).collect();
        match matches.as_slice() {
            [] => Err(ImportError::PartyNotFound(key.to_string())),
            [party] => Ok((*party).clone()),
            _ => Err(ImportError::MultiplePartiesFound(key.to_string())),
        }
    }
}

#[async_trait]
impl PeriodRepository for MemoryHost {
    async fn find_period(&self, _company: &Company, date: NaiveDate) -> ImportResult<Period> {
        self.periods
            .read()
            .unwrap()
            .iter()
            .find(|p| p.start <= date && date <= p.end)
            .cloned()
            .ok_or_else(|| ImportError::Host(format!("no period for date {}", date)))
    }
}

#[async_trait]
impl JournalRepository for MemoryHost {
    async fn find_journal(&self, kind: &str, _company: &Company) -> ImportResult<Journal> {
        self.journals
            .read()
            .unwrap()
            .iter()
            .find(|j| j.code == kind)
            .cloned()
            .ok_or_else(|| ImportError::Host(format!("no journal of kind '{}'", kind)))
    }
}

#[async_trait]
impl TaxRepository for MemoryHost {
    async fn find_tax(&self, template: &str, _company: &Company) -> ImportResult<Tax> {
        self.taxes
            .read()
            .unwrap()
            .iter()
            .find(|t| t.template == template)
            .cloned()
            .ok_or_else(|| ImportError::Host(format!("no tax for template '{}'", template)))
    }
}

#[async_trait]
impl MoveRepository for MemoryHost {
    async fn number_exists(&self, number: &str) -> ImportResult<bool> {
        if self.known_move_numbers.read().unwrap().contains(number) {
            return Ok(true);
        }
        let moves = self.moves.read().unwrap();
        Ok(moves.values().any(|m| m.number == number))
    }

    async fn save_moves(&self, moves: &[LedgerMove]) -> ImportResult<()> {
        let mut store = self.moves.write().unwrap();
        for ledger_move in moves {
            store.insert(ledger_move.id.clone(), ledger_move.clone());
        }
        Ok(())
    }

    async fn post_moves(&self, ids: &[String]) -> ImportResult<()> {
        let mut store = self.moves.write().unwrap();
        for id in ids {
            let ledger_move = store
                .get_mut(id)
                .ok_or_else(|| ImportError::Host(format!("move not saved: {}", id)))?;
            ledger_move.state = PostingState::Posted;
        }
        Ok(())
    }
}

#[async_trait]
impl InvoiceRepository for MemoryHost {
    async fn save_invoices(&self, invoices: &[CustomerInvoice]) -> ImportResult<()> {
        let mut store = self.invoices.write().unwrap();
        for invoice in invoices {
            store.insert(invoice.id.clone(), invoice.clone());
        }
        Ok(())
    }

    async fn update_taxes(&self, ids: &[String]) -> ImportResult<Vec<CustomerInvoice>> {
        let mut store = self.invoices.write().unwrap();
        let mut updated = Vec::with_capacity(ids.len());

        for id in ids {
            let invoice = store
                .get_mut(id)
                .ok_or_else(|| ImportError::Host(format!("invoice not saved: {}", id)))?;

            let mut untaxed = BigDecimal::from(0);
            let mut tax_amount = BigDecimal::from(0);
            for line in &invoice.lines {
                let amount = line.amount();
                for tax_id in &line.tax_ids {
                    let tax = self
                        .tax_by_id(tax_id)
                        .ok_or_else(|| ImportError::Host(format!("unknown tax: {}", tax_id)))?;
                    tax_amount += &amount * &tax.rate;
                }
                untaxed += amount;
            }

            invoice.untaxed_amount = untaxed.clone();
            invoice.tax_amount = tax_amount.clone();
            invoice.total_amount = untaxed + tax_amount;
            updated.push(invoice.clone());
        }

        Ok(updated)
    }

    async fn post_invoices(&self, ids: &[String]) -> ImportResult<()> {
        let mut store = self.invoices.write().unwrap();
        for id in ids {
            let invoice = store
                .get_mut(id)
                .ok_or_else(|| ImportError::Host(format!("invoice not saved: {}", id)))?;
            invoice.state = PostingState::Posted;
        }
        Ok(())
    }
}

#[async_trait]
impl ImportRecordRepository for MemoryHost {
    async fn create_import_record(
        &self,
        filename: &str,
        data: &[u8],
    ) -> ImportResult<ImportRecord> {
        let record = ImportRecord {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            data: data.to_vec(),
        };
        self.import_records.write().unwrap().push(record.clone());
        Ok(record)
    }
}
