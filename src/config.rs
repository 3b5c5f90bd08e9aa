//! Import configuration
//!
//! All per-installation heuristics live here as plain data: description
//! marker strings, account-code prefix sets and the known-bad account
//! correction table. The engines are pure given an [`ImportConfig`], so a
//! new installation adds corrections or markers without touching engine
//! code.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Classification keys stamped on an invoice depending on which tax applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationKeys {
    /// Registry book key
    pub book_key: Option<String>,
    /// Operation key
    pub operation_key: Option<String>,
    /// Subjection/exemption key
    pub exemption_key: Option<String>,
}

/// Per-installation configuration for the import engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Prefix prepended to the source move id when deriving move numbers
    pub move_number_prefix: String,
    /// Known-bad legacy account codes and their corrections
    pub account_corrections: HashMap<String, String>,
    /// Account-code prefixes that denote subsidiary-ledger accounts
    pub subsidiary_prefixes: BTreeSet<String>,
    /// Width control-account codes are zero-filled to
    pub control_account_width: usize,
    /// Descriptions of cash-register/manual records booked as all-debit
    pub all_debit_descriptions: BTreeSet<String>,
    /// Description marking a till-closing record
    pub cash_closing_description: String,
    /// Description marking an adjustment record whose sign flips
    pub adjustment_description: String,
    /// Description forcing the zero-rate tax onto an invoice line
    pub zero_tax_description: String,
    /// Series codes denoting credit notes
    pub credit_note_series: BTreeSet<String>,
    /// Account prefix of receivable (invoice control) records
    pub receivable_prefix: String,
    /// Account prefixes that produce invoice lines
    pub revenue_prefixes: BTreeSet<String>,
    /// Account prefix that switches the running tax context
    pub vat_control_prefix: String,
    /// Tax template resolved for untaxed invoice lines
    pub zero_tax_template: String,
    /// Tax template resolved once a VAT-control record is seen
    pub standard_tax_template: String,
    /// Classification stamped on invoices taxed at the zero rate
    pub zero_rate_keys: ClassificationKeys,
    /// Classification stamped on invoices taxed at the standard rate
    pub standard_rate_keys: ClassificationKeys,
    /// Run every validation but skip persistence and posting
    pub dry_run: bool,
}

impl ImportConfig {
    /// Whether a record with this description books its full amount as debit
    ///
    /// Blank descriptions count: cash-register records often carry none.
    pub fn is_all_debit_description(&self, description: &str) -> bool {
        let trimmed = description.trim();
        trimmed.is_empty() || self.all_debit_descriptions.contains(trimmed)
    }

    /// Whether a record carries the till-closing marker
    pub fn is_cash_closing_description(&self, description: &str) -> bool {
        description.trim() == self.cash_closing_description
    }

    /// Whether a series code denotes a credit note
    pub fn is_credit_note_series(&self, series: &str) -> bool {
        self.credit_note_series.contains(series.trim())
    }

    /// Derived move number for a source move id
    pub fn move_number(&self, asien: &str) -> String {
        format!("{}{}", self.move_number_prefix, asien.trim())
    }

    /// Derived invoice number for a series + source invoice id
    pub fn invoice_number(&self, series: &str, factura: &str) -> String {
        format!("{}{}", series.trim(), factura.trim())
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        let corrections = HashMap::from([("4000".to_string(), "40099999".to_string())]);
        let subsidiary = ["40", "41", "43", "44"]
            .into_iter()
            .map(String::from)
            .collect();
        let all_debit = ["PAGO ITV"].into_iter().map(String::from).collect();
        let credit_note = ["A"].into_iter().map(String::from).collect();
        let revenue = ["7", "44"].into_iter().map(String::from).collect();

        Self {
            move_number_prefix: "CP".to_string(),
            account_corrections: corrections,
            subsidiary_prefixes: subsidiary,
            control_account_width: 8,
            all_debit_descriptions: all_debit,
            cash_closing_description: "CIERRE CAJA".to_string(),
            adjustment_description: "AJUSTE".to_string(),
            zero_tax_description: "SUPLIDOS".to_string(),
            credit_note_series: credit_note,
            receivable_prefix: "43".to_string(),
            revenue_prefixes: revenue,
            vat_control_prefix: "477".to_string(),
            zero_tax_template: "iva_0".to_string(),
            standard_tax_template: "iva_21".to_string(),
            zero_rate_keys: ClassificationKeys {
                book_key: Some("E".to_string()),
                operation_key: None,
                exemption_key: Some("E1".to_string()),
            },
            standard_rate_keys: ClassificationKeys {
                book_key: Some("E".to_string()),
                operation_key: Some("01".to_string()),
                exemption_key: None,
            },
            dry_run: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_description_is_all_debit() {
        let config = ImportConfig::default();
        assert!(config.is_all_debit_description("   "));
        assert!(config.is_all_debit_description("PAGO ITV"));
        assert!(!config.is_all_debit_description("VENTA MOSTRADOR"));
    }

    #[test]
    fn derived_numbers_trim_source_fields() {
        let config = ImportConfig::default();
        assert_eq!(config.move_number(" 000123 "), "CP000123");
        assert_eq!(config.invoice_number("A ", " 1234"), "A1234");
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let config = ImportConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ImportConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
