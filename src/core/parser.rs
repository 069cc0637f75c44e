// Tabular payload parsing for uploaded decay samples

use crate::core::constants::{BD_COLUMN, EOL_COLUMN, TIME_COLUMN, VOLTAGE_COLUMN};
use crate::core::error::{DecayError, Result};
use crate::core::format::{CanonicalSeries, MarkerSet, Sample};
use csv::{ByteRecord, ReaderBuilder, Trim};
use tracing::debug;

/// Parse a delimited `Time`/`Voltage` table into an ordered series.
///
/// Header names are matched case-sensitively after trimming; extra columns
/// are ignored and column order is free. Rows keep their upload order, so
/// repeated or out-of-order timestamps pass through untouched.
pub fn parse(raw: &[u8]) -> Result<CanonicalSeries> {
    let table = Table::read(raw)?;

    let time_idx = table.column(TIME_COLUMN)?;
    let voltage_idx = table.column(VOLTAGE_COLUMN)?;

    let mut series = CanonicalSeries::with_capacity(table.rows.len());
    for (row, record) in table.rows.iter().enumerate() {
        let time = cell(record, row, time_idx, TIME_COLUMN)?;
        let voltage = cell(record, row, voltage_idx, VOLTAGE_COLUMN)?;
        series.samples.push(Sample::new(time, voltage));
    }

    debug!("Parsed {} samples", series.len());
    Ok(series)
}

/// Parse a `BD`/`EOL` marker table. Both columns are required.
pub fn parse_markers(raw: &[u8]) -> Result<MarkerSet> {
    let table = Table::read(raw)?;

    let bd_idx = table.column(BD_COLUMN)?;
    let eol_idx = table.column(EOL_COLUMN)?;

    let mut markers = MarkerSet {
        bd: Vec::with_capacity(table.rows.len()),
        eol: Vec::with_capacity(table.rows.len()),
    };
    for (row, record) in table.rows.iter().enumerate() {
        markers.bd.push(cell(record, row, bd_idx, BD_COLUMN)?);
        markers.eol.push(cell(record, row, eol_idx, EOL_COLUMN)?);
    }

    Ok(markers)
}

// Byte records so that undecodable cells surface as row-level value errors
struct Table {
    headers: ByteRecord,
    rows: Vec<ByteRecord>,
}

impl Table {
    fn read(raw: &[u8]) -> Result<Self> {
        if raw.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(DecayError::EmptyPayload);
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(raw);

        let headers = reader.byte_headers()?.clone();

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            let record = record?;
            // Blank trailing lines are not rows
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            rows.push(record);
        }

        if rows.is_empty() {
            return Err(DecayError::EmptyPayload);
        }

        Ok(Self { headers, rows })
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name.as_bytes())
            .ok_or_else(|| DecayError::Schema {
                column: name.to_string(),
            })
    }
}

fn cell(record: &ByteRecord, row: usize, idx: usize, column: &str) -> Result<f64> {
    let raw = record.get(idx).unwrap_or_default();
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .ok_or_else(|| DecayError::MalformedValue {
            row,
            column: column.to_string(),
            value: String::from_utf8_lossy(raw).into_owned(),
        })
}
