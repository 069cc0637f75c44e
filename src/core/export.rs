// CSV rendering of series, features and alignment results

use csv::Writer;
use serde::Serialize;

use crate::core::error::{DecayError, Result};
use crate::core::format::{AlignmentResult, CanonicalSeries, FeatureSeries};

#[derive(Serialize)]
struct FeatureRow {
    #[serde(rename = "Time")]
    time: f64,
    #[serde(rename = "FD")]
    fd: f64,
    #[serde(rename = "RUL")]
    rul: f64,
    #[serde(rename = "PH")]
    ph: f64,
    #[serde(rename = "SoH")]
    soh: f64,
}

#[derive(Serialize)]
struct DifferenceRow {
    #[serde(rename = "Voltage")]
    voltage: f64,
    #[serde(rename = "TimeDifference")]
    time_difference: f64,
}

#[derive(Serialize)]
struct InverseDifferenceRow {
    #[serde(rename = "InverseVoltage")]
    inverse_voltage: f64,
    #[serde(rename = "TimeDifference")]
    time_difference: f64,
}

fn write_rows<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| DecayError::Io(e.into_error()))
}

/// `Time,Voltage` table, readable back by the parser.
pub fn series_to_csv(series: &CanonicalSeries) -> Result<Vec<u8>> {
    if series.is_empty() {
        return Ok(b"Time,Voltage\n".to_vec());
    }
    write_rows(series.samples.iter())
}

pub fn features_to_csv(features: &FeatureSeries) -> Result<Vec<u8>> {
    if features.is_empty() {
        return Ok(b"Time,FD,RUL,PH,SoH\n".to_vec());
    }
    write_rows(features.points.iter().map(|p| FeatureRow {
        time: p.time,
        fd: p.fd,
        rul: p.rul,
        ph: p.ph,
        soh: p.soh,
    }))
}

/// Returns the `timeDifferences` and `timeDifferencesInv` tables.
pub fn alignment_to_csv(result: &AlignmentResult) -> Result<(Vec<u8>, Vec<u8>)> {
    let direct = write_rows(
        result
            .common_voltage_grid
            .iter()
            .zip(result.time_difference.iter())
            .map(|(v, d)| DifferenceRow {
                voltage: *v,
                time_difference: *d,
            }),
    )?;

    let inverse = write_rows(
        result
            .common_inverse_voltage_grid
            .iter()
            .zip(result.time_difference_inverse.iter())
            .map(|(v, d)| InverseDifferenceRow {
                inverse_voltage: *v,
                time_difference: *d,
            }),
    )?;

    Ok((direct, inverse))
}
