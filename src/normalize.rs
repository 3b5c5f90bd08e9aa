//! Account and party normalization rules
//!
//! Raw Contaplus account codes go through two steps before lookup: the
//! correction table maps known-bad legacy codes to their canonical form,
//! then subsidiary-ledger codes are split into a party key and the control
//! account that stands in for the whole subsidiary ledger.

use crate::config::ImportConfig;

/// Result of splitting a raw account code into party and effective account
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedAccount {
    /// Party lookup key, present only for subsidiary-ledger codes
    pub party_key: Option<String>,
    /// Effective account code to resolve against the chart of accounts
    pub account_code: String,
}

/// Map a known-bad legacy code to its correction; unmapped codes pass through
pub fn normalize_account(code: &str, config: &ImportConfig) -> String {
    match config.account_corrections.get(code) {
        Some(corrected) => corrected.clone(),
        None => code.to_string(),
    }
}

/// Split a normalized account code into a party key and effective account
///
/// A code whose two-character prefix is in the subsidiary-ledger set names a
/// specific customer/vendor: the party key is `company_party_code + "-" +
/// code` and the effective account collapses to the zero-filled control
/// account for that prefix. Any other code resolves as-is, with no party.
pub fn derive_party_and_account(
    code: &str,
    company_party_code: &str,
    config: &ImportConfig,
) -> DerivedAccount {
    if let Some(prefix) = code.get(..2) {
        if config.subsidiary_prefixes.contains(prefix) {
            let fill = config.control_account_width.saturating_sub(prefix.len());
            return DerivedAccount {
                party_key: Some(format!("{}-{}", company_party_code, code)),
                account_code: format!("{}{}", prefix, "0".repeat(fill)),
            };
        }
    }
    DerivedAccount {
        party_key: None,
        account_code: code.to_string(),
    }
}

/// Line description from the record's concept and document fields
///
/// Joined with a single space; blank parts are skipped so a missing
/// document id does not leave a trailing space.
pub fn line_description(concepto: &str, documento: &str) -> String {
    let parts: Vec<&str> = [concepto.trim(), documento.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();
    parts.join(" ")
}
