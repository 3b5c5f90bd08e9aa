//! Invoice aggregation engine
//!
//! Folds filtered file records into outgoing customer invoices keyed by
//! `series + invoice number`. Groups are contiguous in the export: a new
//! key finalizes the previous builder. The running tax context is part of
//! the builder state: it starts at the zero rate and a VAT-control record
//! switches it to the standard rate for the rest of the group. Computed
//! totals are validated against the receivable record's amount after the
//! host tax engine has run, and only then are invoices posted.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ClassificationKeys, ImportConfig};
use crate::layout::DecodedRecord;
use crate::normalize::{derive_party_and_account, line_description, normalize_account};
use crate::traits::HostSystem;
use crate::types::*;

/// Builds and persists customer invoices from decoded records
pub struct InvoiceImporter<'a, H: HostSystem> {
    host: &'a H,
    config: &'a ImportConfig,
}

/// Accumulating state for one invoice group
struct InvoiceBuilder {
    number: String,
    series: String,
    date: Option<NaiveDate>,
    party: Option<Party>,
    expected_total: Option<BigDecimal>,
    lines: Vec<InvoiceLine>,
    /// Tax attached at finalization to lines that carry none
    tax_context: Tax,
}

impl InvoiceBuilder {
    fn new(number: String, series: String, zero_tax: &Tax) -> Self {
        Self {
            number,
            series,
            date: None,
            party: None,
            expected_total: None,
            lines: Vec::new(),
            tax_context: zero_tax.clone(),
        }
    }
}

/// Finalized group waiting for persistence and total validation
struct PendingInvoice {
    number: String,
    date: NaiveDate,
    party: Party,
    expected_total: BigDecimal,
    lines: Vec<InvoiceLine>,
    keys: ClassificationKeys,
}

impl<'a, H: HostSystem> InvoiceImporter<'a, H> {
    pub fn new(host: &'a H, config: &'a ImportConfig) -> Self {
        Self { host, config }
    }

    /// Aggregate, validate, save and post all invoices in the batch
    ///
    /// Returns the created invoices in file order, with totals as computed
    /// by the host tax engine. In dry-run mode totals are computed locally
    /// and nothing is persisted.
    pub async fn run(
        &self,
        records: &[DecodedRecord],
        company: &Company,
        journal: &Journal,
        origin: &ImportRecord,
    ) -> ImportResult<Vec<CustomerInvoice>> {
        let zero_tax = self
            .host
            .find_tax(&self.config.zero_tax_template, company)
            .await?;
        let standard_tax = self
            .host
            .find_tax(&self.config.standard_tax_template, company)
            .await?;

        // Explicit fold: current builder plus finalized groups, in order.
        let mut current: Option<InvoiceBuilder> = None;
        let mut pending: Vec<PendingInvoice> = Vec::new();

        for record in records {
            let key = self
                .config
                .invoice_number(record.text("serie"), record.text("factura"));

            let same_group = current
                .as_ref()
                .map(|builder| builder.number == key)
                .unwrap_or(false);
            if !same_group {
                if let Some(builder) = current.take() {
                    if let Some(done) = self.finalize(builder, &standard_tax)? {
                        pending.push(done);
                    }
                }
                current = Some(InvoiceBuilder::new(
                    key,
                    record.trimmed("serie").to_string(),
                    &zero_tax,
                ));
            }

            let builder = current.as_mut().expect("builder created above");
            self.fold_record(builder, record, company, &zero_tax, &standard_tax)
                .await?;
        }

        if let Some(builder) = current.take() {
            if let Some(done) = self.finalize(builder, &standard_tax)? {
                pending.push(done);
            }
        }

        let mut invoices = Vec::with_capacity(pending.len());
        let mut expected_totals = Vec::with_capacity(pending.len());
        for done in pending {
            let untaxed = done.lines.iter().map(|l| l.amount()).sum::<BigDecimal>();
            let zero = BigDecimal::from(0);
            let payment_type = if untaxed > zero {
                done.party.customer_payment_type.clone()
            } else if untaxed < zero {
                done.party.supplier_payment_type.clone()
            } else {
                None
            };

            invoices.push(CustomerInvoice {
                id: Uuid::new_v4().to_string(),
                number: done.number,
                company_id: company.id.clone(),
                currency: company.currency.clone(),
                origin: origin.id.clone(),
                date: done.date,
                journal_id: journal.id.clone(),
                party_id: done.party.id.clone(),
                payment_term: done.party.payment_term.clone(),
                payment_type,
                book_key: done.keys.book_key.clone(),
                operation_key: done.keys.operation_key.clone(),
                exemption_key: done.keys.exemption_key.clone(),
                state: PostingState::Draft,
                lines: done.lines,
                untaxed_amount: BigDecimal::from(0),
                tax_amount: BigDecimal::from(0),
                total_amount: BigDecimal::from(0),
            });
            expected_totals.push(done.expected_total);
        }

        info!(invoices = invoices.len(), "invoice aggregation complete");

        if self.config.dry_run {
            for (invoice, expected) in invoices.iter().zip(&expected_totals) {
                let computed = local_total(invoice, &[&zero_tax, &standard_tax]);
                if computed != *expected {
                    return Err(ImportError::InvoiceTotalMismatch {
                        number: invoice.number.clone(),
                        expected: expected.clone(),
                        computed,
                    });
                }
            }
            return Ok(invoices);
        }

        self.host.save_invoices(&invoices).await?;
        let ids: Vec<String> = invoices.iter().map(|i| i.id.clone()).collect();
        let mut recomputed = self.host.update_taxes(&ids).await?;

        for (invoice, expected) in recomputed.iter().zip(&expected_totals) {
            if invoice.total_amount != *expected {
                return Err(ImportError::InvoiceTotalMismatch {
                    number: invoice.number.clone(),
                    expected: expected.clone(),
                    computed: invoice.total_amount.clone(),
                });
            }
        }

        self.host.post_invoices(&ids).await?;
        for invoice in &mut recomputed {
            invoice.state = PostingState::Posted;
        }

        Ok(recomputed)
    }

    /// Route one record into the current builder by account-code prefix
    async fn fold_record(
        &self,
        builder: &mut InvoiceBuilder,
        record: &DecodedRecord,
        company: &Company,
        zero_tax: &Tax,
        standard_tax: &Tax,
    ) -> ImportResult<()> {
        let raw_code = record.trimmed("sub_cta");
        let code = normalize_account(raw_code, self.config);

        if code.starts_with(&self.config.receivable_prefix) {
            return self.fold_receivable(builder, record, &code, company).await;
        }

        if code.starts_with(&self.config.vat_control_prefix) {
            builder.tax_context = standard_tax.clone();
            return Ok(());
        }

        if self
            .config
            .revenue_prefixes
            .iter()
            .any(|prefix| code.starts_with(prefix.as_str()))
        {
            return self
                .fold_revenue(builder, record, &code, company, zero_tax)
                .await;
        }

        debug!(code = %code, invoice = %builder.number, "record ignored for invoicing");
        Ok(())
    }

    /// Receivable record: resolves the party and pins the expected total
    async fn fold_receivable(
        &self,
        builder: &mut InvoiceBuilder,
        record: &DecodedRecord,
        code: &str,
        company: &Company,
    ) -> ImportResult<()> {
        let derived = derive_party_and_account(code, &company.party_code, self.config);
        let key = derived
            .party_key
            .unwrap_or_else(|| format!("{}-{}", company.party_code, code));

        debug!(key = %key, "invoice party lookup");
        let party = self.host.find_party(&key, company).await?;
        if party.payment_term.is_none() {
            return Err(ImportError::MissingPaymentTerm(party.code.clone()));
        }

        let mut expected = record.decimal("euro_debe") + record.decimal("euro_haber");
        if self.config.is_credit_note_series(&builder.series) {
            expected = -expected;
        }

        builder.date = record.date("fecha");
        builder.party = Some(party);
        builder.expected_total = Some(expected);
        Ok(())
    }

    /// Revenue record: one invoice line, quantity 1, price from the credit column
    async fn fold_revenue(
        &self,
        builder: &mut InvoiceBuilder,
        record: &DecodedRecord,
        code: &str,
        company: &Company,
        zero_tax: &Tax,
    ) -> ImportResult<()> {
        let derived = derive_party_and_account(code, &company.party_code, self.config);
        let account = self
            .host
            .find_account(&derived.account_code, company)
            .await?;

        let description = record.trimmed("concepto");
        let mut unit_price = record.decimal("euro_haber");
        if description == self.config.adjustment_description {
            unit_price = -unit_price;
        }
        if self.config.is_credit_note_series(&builder.series) {
            unit_price = -unit_price;
        }

        let tax_ids = if description == self.config.zero_tax_description {
            vec![zero_tax.id.clone()]
        } else {
            Vec::new()
        };

        builder.lines.push(InvoiceLine {
            account_id: account.id,
            quantity: BigDecimal::from(1),
            unit_price,
            description: line_description(record.text("concepto"), record.text("documento")),
            tax_ids,
        });
        Ok(())
    }

    /// Close a group: discard empty builders, attach the context tax to
    /// bare lines and classify by the rate that ended up applying
    fn finalize(
        &self,
        builder: InvoiceBuilder,
        standard_tax: &Tax,
    ) -> ImportResult<Option<PendingInvoice>> {
        let InvoiceBuilder {
            number,
            date,
            party,
            expected_total,
            mut lines,
            tax_context,
            ..
        } = builder;

        if lines.is_empty() {
            return Ok(None);
        }

        for line in &mut lines {
            if line.tax_ids.is_empty() {
                line.tax_ids.push(tax_context.id.clone());
            }
        }

        let standard_applied = lines.iter().any(|l| l.tax_ids.contains(&standard_tax.id));
        let keys = if standard_applied {
            self.config.standard_rate_keys.clone()
        } else {
            self.config.zero_rate_keys.clone()
        };

        let party = party.ok_or_else(|| {
            ImportError::InvalidRecord(format!("invoice {} has no receivable record", number))
        })?;
        let date = date.ok_or_else(|| {
            ImportError::InvalidRecord(format!("invoice {} has no date", number))
        })?;
        let expected_total = expected_total.ok_or_else(|| {
            ImportError::InvalidRecord(format!("invoice {} has no source total", number))
        })?;

        Ok(Some(PendingInvoice {
            number,
            date,
            party,
            expected_total,
            lines,
            keys,
        }))
    }
}

/// Total as the host tax engine would compute it, used in dry runs
fn local_total(invoice: &CustomerInvoice, taxes: &[&Tax]) -> BigDecimal {
    let mut total = BigDecimal::from(0);
    for line in &invoice.lines {
        let amount = line.amount();
        for tax_id in &line.tax_ids {
            if let Some(tax) = taxes.iter().find(|t| &t.id == tax_id) {
                total += &amount * &tax.rate;
            }
        }
        total += amount;
    }
    total
}
