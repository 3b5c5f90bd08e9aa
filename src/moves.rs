//! Move aggregation engine
//!
//! Folds filtered file records into ledger moves keyed by their derived
//! move number. The fold keeps an explicit builder map plus insertion
//! order instead of a mutable "current move" variable, and carries the
//! import-wide running debit/credit totals the till-closing heuristic
//! needs. Balance validation runs over the whole batch before anything is
//! persisted.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ImportConfig;
use crate::layout::DecodedRecord;
use crate::normalize::{derive_party_and_account, line_description, normalize_account};
use crate::traits::HostSystem;
use crate::types::*;

/// Builds and persists ledger moves from decoded records
pub struct MoveImporter<'a, H: HostSystem> {
    host: &'a H,
    config: &'a ImportConfig,
}

struct MoveBuilder {
    number: String,
    date: NaiveDate,
    period_id: String,
    lines: Vec<LedgerLine>,
}

/// Fold state: one builder per derived move number, in first-seen order,
/// plus the running totals of everything routed so far.
struct FoldState {
    builders: HashMap<String, MoveBuilder>,
    order: Vec<String>,
    running_debit: BigDecimal,
    running_credit: BigDecimal,
}

impl FoldState {
    fn new() -> Self {
        Self {
            builders: HashMap::new(),
            order: Vec::new(),
            running_debit: BigDecimal::from(0),
            running_credit: BigDecimal::from(0),
        }
    }
}

impl<'a, H: HostSystem> MoveImporter<'a, H> {
    pub fn new(host: &'a H, config: &'a ImportConfig) -> Self {
        Self { host, config }
    }

    /// Aggregate, validate, save and post all moves in the batch
    ///
    /// Returns the created moves in file order. Nothing is persisted when
    /// any move fails validation, and nothing is persisted at all in
    /// dry-run mode.
    pub async fn run(
        &self,
        records: &[DecodedRecord],
        company: &Company,
        journal: &Journal,
        origin: &ImportRecord,
    ) -> ImportResult<Vec<LedgerMove>> {
        let mut state = FoldState::new();
        for record in records {
            state = self.fold_record(state, record, company).await?;
        }

        let mut moves = Vec::with_capacity(state.order.len());
        for number in &state.order {
            let builder = state
                .builders
                .remove(number)
                .expect("builder exists for every ordered number");
            moves.push(LedgerMove {
                id: Uuid::new_v4().to_string(),
                number: builder.number,
                date: builder.date,
                period_id: builder.period_id,
                journal_id: journal.id.clone(),
                origin: origin.id.clone(),
                state: PostingState::Draft,
                lines: builder.lines,
            });
        }

        // Balance check over the whole batch; one bad move blocks them all.
        for ledger_move in &moves {
            if !ledger_move.is_balanced() {
                return Err(ImportError::UnbalancedMove {
                    number: ledger_move.number.clone(),
                    debit: ledger_move.total_debit(),
                    credit: ledger_move.total_credit(),
                });
            }
        }

        info!(moves = moves.len(), "move aggregation complete");

        if self.config.dry_run {
            return Ok(moves);
        }

        self.host.save_moves(&moves).await?;
        let ids: Vec<String> = moves.iter().map(|m| m.id.clone()).collect();
        self.host.post_moves(&ids).await?;
        for ledger_move in &mut moves {
            ledger_move.state = PostingState::Posted;
        }

        Ok(moves)
    }

    async fn fold_record(
        &self,
        mut state: FoldState,
        record: &DecodedRecord,
        company: &Company,
    ) -> ImportResult<FoldState> {
        let number = self.config.move_number(record.trimmed("asien"));

        if !state.builders.contains_key(&number) {
            if self.host.number_exists(&number).await? {
                return Err(ImportError::DuplicateMoveNumber(number));
            }
            let date = record.date("fecha").ok_or_else(|| ImportError::Decode {
                field: "fecha".to_string(),
                reason: "missing move date".to_string(),
            })?;
            let period = self.host.find_period(company, date).await?;
            state.builders.insert(
                number.clone(),
                MoveBuilder {
                    number: number.clone(),
                    date,
                    period_id: period.id,
                    lines: Vec::new(),
                },
            );
            state.order.push(number.clone());
        }

        let line = self.build_line(record, company, &state).await?;
        state.running_debit += &line.debit;
        state.running_credit += &line.credit;
        state
            .builders
            .get_mut(&number)
            .expect("builder inserted above")
            .lines
            .push(line);

        Ok(state)
    }

    async fn build_line(
        &self,
        record: &DecodedRecord,
        company: &Company,
        state: &FoldState,
    ) -> ImportResult<LedgerLine> {
        let raw_code = record.trimmed("sub_cta");
        let corrected = normalize_account(raw_code, self.config);
        let derived = derive_party_and_account(&corrected, &company.party_code, self.config);

        debug!(code = %derived.account_code, "account lookup");
        let account = self.host.find_account(&derived.account_code, company).await?;

        let party_id = match (&derived.party_key, account.party_required) {
            (Some(key), true) => {
                debug!(key = %key, "party lookup");
                Some(self.host.find_party(key, company).await?.id)
            }
            _ => None,
        };

        let (debit, credit) = self.classify_amounts(record, state);

        Ok(LedgerLine {
            account_id: account.id,
            party_id,
            debit,
            credit,
            description: line_description(record.text("concepto"), record.text("documento")),
        })
    }

    /// Route the record's euro amounts onto the debit/credit sides
    ///
    /// Cash-register records (blank or known manual descriptions) book
    /// their full amount as debit whichever column it arrived in. The
    /// till-closing record balances against the running totals: whichever
    /// side the import is short on receives the combined amount.
    fn classify_amounts(
        &self,
        record: &DecodedRecord,
        state: &FoldState,
    ) -> (BigDecimal, BigDecimal) {
        let euro_debit = record.decimal("euro_debe");
        let euro_credit = record.decimal("euro_haber");
        let description = record.trimmed("concepto");

        if self.config.is_all_debit_description(description) {
            return (euro_credit + euro_debit, BigDecimal::from(0));
        }

        if self.config.is_cash_closing_description(description) {
            let combined = &euro_debit + &euro_credit;
            if state.running_credit > state.running_debit {
                return (combined, BigDecimal::from(0));
            }
            return (BigDecimal::from(0), combined);
        }

        (euro_debit, euro_credit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::entry_layout;
    use crate::utils::memory_host::MemoryHost;
    use std::str::FromStr;

    struct RecordSpec<'s> {
        asien: &'s str,
        sub_cta: &'s str,
        concepto: &'s str,
        debe: &'s str,
        haber: &'s str,
    }

    fn record(spec: RecordSpec<'_>) -> DecodedRecord {
        let mut chars = vec![' '; 297];
        let mut put = |start: usize, text: &str| {
            for (i, c) in text.chars().enumerate() {
                chars[start - 1 + i] = c;
            }
        };
        put(1, spec.asien);
        put(7, "20190315");
        put(15, spec.sub_cta);
        put(55, spec.concepto);
        put(239, spec.debe);
        put(255, spec.haber);
        let line: String = chars.iter().collect();
        entry_layout().decode(&line).unwrap()
    }

    fn company() -> Company {
        Company {
            id: "c1".to_string(),
            name: "Empresa".to_string(),
            party_code: "COMP1".to_string(),
            currency: "EUR".to_string(),
        }
    }

    fn journal() -> Journal {
        Journal {
            id: "j1".to_string(),
            code: "general".to_string(),
            name: "General".to_string(),
        }
    }

    fn origin() -> ImportRecord {
        ImportRecord {
            id: "imp1".to_string(),
            filename: "export.txt".to_string(),
            data: Vec::new(),
        }
    }

    fn host() -> MemoryHost {
        let host = MemoryHost::new();
        host.add_period(Period {
            id: "p1".to_string(),
            name: "2019-03".to_string(),
            start: chrono::NaiveDate::from_ymd_opt(2019, 3, 1).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2019, 3, 31).unwrap(),
        });
        host.add_account(Account {
            id: "a_cash".to_string(),
            code: "57000000".to_string(),
            name: "Caja".to_string(),
            party_required: false,
        });
        host.add_account(Account {
            id: "a_recv".to_string(),
            code: "43000000".to_string(),
            name: "Clientes".to_string(),
            party_required: true,
        });
        host.add_party(Party {
            id: "pt1".to_string(),
            code: "43000017".to_string(),
            name: "Cliente 17".to_string(),
            payment_term: Some("30d".to_string()),
            customer_payment_type: None,
            supplier_payment_type: None,
        });
        host
    }

    fn dec(text: &str) -> BigDecimal {
        BigDecimal::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn lines_with_one_move_id_build_one_balanced_move() {
        let host = host();
        let config = ImportConfig::default();
        let importer = MoveImporter::new(&host, &config);

        let records = vec![
            record(RecordSpec {
                asien: "000001",
                sub_cta: "43000017",
                concepto: "VENTA MOSTRADOR",
                debe: "150.00",
                haber: "0.00",
            }),
            record(RecordSpec {
                asien: "000001",
                sub_cta: "57000000",
                concepto: "VENTA MOSTRADOR",
                debe: "0.00",
                haber: "150.00",
            }),
        ];

        let moves = importer
            .run(&records, &company(), &journal(), &origin())
            .await
            .unwrap();

        assert_eq!(moves.len(), 1);
        let ledger_move = &moves[0];
        assert_eq!(ledger_move.number, "CP000001");
        assert_eq!(ledger_move.lines.len(), 2);
        assert_eq!(ledger_move.lines[0].account_id, "a_recv");
        assert_eq!(ledger_move.lines[0].party_id.as_deref(), Some("pt1"));
        assert_eq!(ledger_move.lines[1].account_id, "a_cash");
        assert_eq!(ledger_move.lines[1].party_id, None);
        assert_eq!(ledger_move.state, PostingState::Posted);
        assert!(ledger_move.is_balanced());
        assert_eq!(host.saved_moves().len(), 1);
    }

    #[tokio::test]
    async fn manual_description_books_all_debit() {
        let host = host();
        let config = ImportConfig::default();
        let importer = MoveImporter::new(&host, &config);

        let records = vec![
            record(RecordSpec {
                asien: "000002",
                sub_cta: "57000000",
                concepto: "PAGO ITV",
                debe: "0000000010000",
                haber: "0",
            }),
            record(RecordSpec {
                asien: "000002",
                sub_cta: "57000000",
                concepto: "CONTRAPARTIDA",
                debe: "0.00",
                haber: "100.00",
            }),
        ];

        let moves = importer
            .run(&records, &company(), &journal(), &origin())
            .await
            .unwrap();

        let line = &moves[0].lines[0];
        assert_eq!(line.debit, dec("100.00"));
        assert_eq!(line.credit, dec("0"));
    }

    #[tokio::test]
    async fn all_debit_rule_ignores_column_placement() {
        let host = host();
        let config = ImportConfig::default();
        let importer = MoveImporter::new(&host, &config);

        // amount arrives in the credit column, description is blank
        let records = vec![
            record(RecordSpec {
                asien: "000003",
                sub_cta: "57000000",
                concepto: "",
                debe: "0",
                haber: "75.00",
            }),
            record(RecordSpec {
                asien: "000003",
                sub_cta: "57000000",
                concepto: "CONTRAPARTIDA",
                debe: "0.00",
                haber: "75.00",
            }),
        ];

        let moves = importer
            .run(&records, &company(), &journal(), &origin())
            .await
            .unwrap();

        let line = &moves[0].lines[0];
        assert_eq!(line.debit, dec("75.00"));
        assert_eq!(line.credit, dec("0"));
    }

    #[tokio::test]
    async fn cash_closing_routes_against_running_totals() {
        let host = host();
        let config = ImportConfig::default();
        let importer = MoveImporter::new(&host, &config);

        // credit-so-far exceeds debit-so-far, so the closing record
        // receives the combined amount on the debit side
        let records = vec![
            record(RecordSpec {
                asien: "000004",
                sub_cta: "57000000",
                concepto: "CONTRAPARTIDA",
                debe: "0.00",
                haber: "200.00",
            }),
            record(RecordSpec {
                asien: "000004",
                sub_cta: "57000000",
                concepto: "CIERRE CAJA",
                debe: "0.00",
                haber: "200.00",
            }),
        ];

        let moves = importer
            .run(&records, &company(), &journal(), &origin())
            .await
            .unwrap();

        let closing = &moves[0].lines[1];
        assert_eq!(closing.debit, dec("200.00"));
        assert_eq!(closing.credit, dec("0"));
        assert!(moves[0].is_balanced());
    }

    #[tokio::test]
    async fn unbalanced_move_blocks_the_whole_batch() {
        let host = host();
        let config = ImportConfig::default();
        let importer = MoveImporter::new(&host, &config);

        let records = vec![
            // balanced move
            record(RecordSpec {
                asien: "000005",
                sub_cta: "57000000",
                concepto: "OK",
                debe: "10.00",
                haber: "0.00",
            }),
            record(RecordSpec {
                asien: "000005",
                sub_cta: "57000000",
                concepto: "OK",
                debe: "0.00",
                haber: "10.00",
            }),
            // unbalanced move
            record(RecordSpec {
                asien: "000006",
                sub_cta: "57000000",
                concepto: "MAL",
                debe: "10.00",
                haber: "0.00",
            }),
        ];

        let err = importer
            .run(&records, &company(), &journal(), &origin())
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::UnbalancedMove { ref number, .. } if number == "CP000006"));
        assert!(host.saved_moves().is_empty());
    }

    #[tokio::test]
    async fn duplicate_move_number_fails_on_first_line() {
        let host = host();
        host.seed_move_number("CP000007");
        let config = ImportConfig::default();
        let importer = MoveImporter::new(&host, &config);

        let records = vec![record(RecordSpec {
            asien: "000007",
            sub_cta: "57000000",
            concepto: "X",
            debe: "10.00",
            haber: "0.00",
        })];

        let err = importer
            .run(&records, &company(), &journal(), &origin())
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::DuplicateMoveNumber(ref n) if n == "CP000007"));
    }

    #[tokio::test]
    async fn corrected_account_code_is_used_for_lookup() {
        let host = host();
        host.add_account(Account {
            id: "a_fix".to_string(),
            code: "40000000".to_string(),
            name: "Proveedores".to_string(),
            party_required: true,
        });
        host.add_party(Party {
            id: "pt_fix".to_string(),
            code: "40099999".to_string(),
            name: "Proveedor generico".to_string(),
            payment_term: None,
            customer_payment_type: None,
            supplier_payment_type: None,
        });
        let config = ImportConfig::default();
        let importer = MoveImporter::new(&host, &config);

        let records = vec![
            record(RecordSpec {
                asien: "000008",
                sub_cta: "4000",
                concepto: "COMPRA",
                debe: "20.00",
                haber: "0.00",
            }),
            record(RecordSpec {
                asien: "000008",
                sub_cta: "57000000",
                concepto: "COMPRA",
                debe: "0.00",
                haber: "20.00",
            }),
        ];

        let moves = importer
            .run(&records, &company(), &journal(), &origin())
            .await
            .unwrap();

        // "4000" corrected to "40099999", derived onto the 40 control account
        assert_eq!(moves[0].lines[0].account_id, "a_fix");
        assert_eq!(moves[0].lines[0].party_id.as_deref(), Some("pt_fix"));
    }

    #[tokio::test]
    async fn dry_run_validates_without_persisting() {
        let host = host();
        let config = ImportConfig {
            dry_run: true,
            ..ImportConfig::default()
        };
        let importer = MoveImporter::new(&host, &config);

        let records = vec![
            record(RecordSpec {
                asien: "000009",
                sub_cta: "57000000",
                concepto: "OK",
                debe: "10.00",
                haber: "0.00",
            }),
            record(RecordSpec {
                asien: "000009",
                sub_cta: "57000000",
                concepto: "OK",
                debe: "0.00",
                haber: "10.00",
            }),
        ];

        let moves = importer
            .run(&records, &company(), &journal(), &origin())
            .await
            .unwrap();

        assert_eq!(moves[0].state, PostingState::Draft);
        assert!(host.saved_moves().is_empty());
    }
}
