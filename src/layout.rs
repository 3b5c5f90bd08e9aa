//! Declarative fixed-width record layout and typed field decoders
//!
//! A [`RecordLayout`] is an ordered set of `(start, length, name, decoder)`
//! entries with 1-based offsets, matching how the Contaplus export documents
//! its record format. [`RecordLayout::validate`] checks a physical line covers
//! the layout's full extent and [`RecordLayout::decode`] slices out and types
//! every field. Overlapping ranges are not rejected; the layout is trusted by
//! convention.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::types::{ImportError, ImportResult};

/// Typed decoder applied to a field's character range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Raw character data; surrounding whitespace is kept, callers trim
    Char,
    /// Calendar date in `%Y%m%d` form
    Date,
    /// Base-10 integer; blank is treated as 0
    Integer,
    /// Base-10 decimal with `.` separator; blank is treated as 0
    Decimal,
}

/// One field of a fixed-width layout
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// 1-based character offset of the field's first character
    pub start: usize,
    /// Field width in characters
    pub length: usize,
    /// Field name used to look the value up after decoding
    pub name: &'static str,
    /// Decoder applied to the sliced text
    pub kind: FieldKind,
}

/// Ordered set of fields describing one physical record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    fields: Vec<FieldSpec>,
}

/// Typed value decoded from one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Char(String),
    Date(NaiveDate),
    Integer(i64),
    Decimal(BigDecimal),
}

impl FieldValue {
    /// Canonical text form of the value
    pub fn encode(&self) -> String {
        match self {
            FieldValue::Char(s) => s.trim().to_string(),
            FieldValue::Date(d) => d.format("%Y%m%d").to_string(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Decimal(d) => d.to_string(),
        }
    }
}

/// Field name to typed value mapping for one physical input line
///
/// Immutable once produced by [`RecordLayout::decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    values: HashMap<&'static str, FieldValue>,
}

impl DecodedRecord {
    /// Typed value of a field, if the layout defines it
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Raw character content of a `Char` field, untrimmed; empty for
    /// unknown names
    pub fn text(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(FieldValue::Char(s)) => s,
            _ => "",
        }
    }

    /// Trimmed character content of a `Char` field
    pub fn trimmed(&self, name: &str) -> &str {
        self.text(name).trim()
    }

    /// Value of a `Date` field
    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.values.get(name) {
            Some(FieldValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    /// Value of an `Integer` field; 0 for unknown names
    pub fn integer(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(FieldValue::Integer(i)) => *i,
            _ => 0,
        }
    }

    /// Value of a `Decimal` field; 0 for unknown names
    pub fn decimal(&self, name: &str) -> BigDecimal {
        match self.values.get(name) {
            Some(FieldValue::Decimal(d)) => d.clone(),
            _ => BigDecimal::from(0),
        }
    }
}

impl RecordLayout {
    /// Build a layout from `(start, length, name, decoder)` entries
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Last character position any field reaches
    pub fn extent(&self) -> usize {
        self.fields
            .iter()
            .map(|f| f.start - 1 + f.length)
            .max()
            .unwrap_or(0)
    }

    /// True iff `line` is long enough for every field range to be extracted
    pub fn validate(&self, line: &str) -> bool {
        line.chars().count() >= self.extent()
    }

    /// Decode one physical line into a field-value mapping
    ///
    /// Fails with [`ImportError::InvalidRecord`] when the line does not
    /// pass [`RecordLayout::validate`].
    pub fn decode(&self, line: &str) -> ImportResult<DecodedRecord> {
        if !self.validate(line) {
            return Err(ImportError::InvalidRecord(line.to_string()));
        }
        let chars: Vec<char> = line.chars().collect();
        let mut values = HashMap::with_capacity(self.fields.len());

        for field in &self.fields {
            let raw: String = chars[field.start - 1..field.start - 1 + field.length]
                .iter()
                .collect();
            let value = decode_field(field, &raw)?;
            values.insert(field.name, value);
        }

        Ok(DecodedRecord { values })
    }
}

fn decode_field(field: &FieldSpec, raw: &str) -> ImportResult<FieldValue> {
    let decode_err = |reason: String| ImportError::Decode {
        field: field.name.to_string(),
        reason,
    };

    match field.kind {
        FieldKind::Char => Ok(FieldValue::Char(raw.to_string())),
        FieldKind::Date => {
            let trimmed = raw.trim();
            let date = NaiveDate::parse_from_str(trimmed, "%Y%m%d")
                .map_err(|e| decode_err(format!("'{}': {}", trimmed, e)))?;
            Ok(FieldValue::Date(date))
        }
        FieldKind::Integer => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(FieldValue::Integer(0));
            }
            let value = trimmed
                .parse::<i64>()
                .map_err(|e| decode_err(format!("'{}': {}", trimmed, e)))?;
            Ok(FieldValue::Integer(value))
        }
        FieldKind::Decimal => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(FieldValue::Decimal(BigDecimal::from(0)));
            }
            let normalized = normalize_sign(trimmed);
            let value = BigDecimal::from_str(&normalized)
                .map_err(|e| decode_err(format!("'{}': {}", trimmed, e)))?;
            // amount columns without a separator carry raw subunits
            if normalized.contains('.') {
                Ok(FieldValue::Decimal(value))
            } else {
                Ok(FieldValue::Decimal(value / BigDecimal::from(100)))
            }
        }
    }
}

/// Some Contaplus exports write the sign after the digits; move it in front
/// so decimal parsing keeps it.
fn normalize_sign(text: &str) -> String {
    if let Some(stripped) = text.strip_suffix(['-', '+']) {
        let sign = text.chars().next_back().unwrap_or('-');
        format!("{}{}", sign, stripped)
    } else {
        text.to_string()
    }
}

/// The 297-character Contaplus entry record layout
pub fn entry_layout() -> RecordLayout {
    use FieldKind::*;

    let spec = |start, length, name, kind| FieldSpec {
        start,
        length,
        name,
        kind,
    };

    RecordLayout::new(vec![
        spec(1, 6, "asien", Char),
        spec(7, 8, "fecha", Date),
        spec(15, 12, "sub_cta", Char),
        spec(27, 12, "contra", Char),
        spec(39, 16, "pta_debe", Decimal),
        spec(55, 25, "concepto", Char),
        spec(80, 16, "pta_haber", Decimal),
        // invoice number; some files carry non-numeric content here
        spec(96, 8, "factura", Char),
        spec(104, 16, "base_impo", Decimal),
        spec(120, 5, "iva", Decimal),
        spec(125, 5, "recequiv", Decimal),
        spec(130, 10, "documento", Char),
        spec(140, 3, "departa", Char),
        spec(143, 6, "clave", Char),
        spec(149, 1, "estado", Char),
        spec(150, 6, "n_casado", Integer),
        spec(156, 1, "t_casado", Integer),
        spec(157, 6, "trans", Integer),
        spec(163, 16, "cambio", Decimal),
        spec(179, 16, "debe_me", Decimal),
        spec(195, 16, "haber_me", Decimal),
        spec(211, 1, "auxiliar", Char),
        spec(212, 1, "serie", Char),
        spec(213, 4, "sucursal", Char),
        spec(217, 5, "cod_divisa", Char),
        spec(222, 16, "imp_aux_me", Decimal),
        spec(238, 1, "moneda_uso", Char),
        spec(239, 16, "euro_debe", Decimal),
        spec(255, 16, "euro_haber", Decimal),
        spec(271, 16, "base_euro", Decimal),
        spec(287, 1, "no_conv", Char),
        spec(288, 10, "numero_inv", Char),
    ])
}
