//! Historical flight dataset reader

use anyhow::{Context, Result};
use clap::ValueEnum;
use ontime_lib::FlightRecord;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Column headers of the historical flights CSV
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "Companhia.Aerea",
    "Aeroporto.Origem",
    "Aeroporto.Destino",
    "Situacao.Voo",
    "Partida.Prevista",
    "Partida.Real",
];

/// Character encoding of the dataset file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1, as published for the Brazilian flights dataset
    Latin1,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Companhia.Aerea")]
    airline: Option<String>,
    #[serde(rename = "Aeroporto.Origem")]
    origin: Option<String>,
    #[serde(rename = "Aeroporto.Destino")]
    destination: Option<String>,
    #[serde(rename = "Situacao.Voo")]
    status: Option<String>,
    #[serde(rename = "Partida.Prevista")]
    scheduled_departure: Option<String>,
    #[serde(rename = "Partida.Real")]
    actual_departure: Option<String>,
}

/// Cell values read as missing, matched exactly after trimming
const MISSING_TOKENS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| {
        let v = v.trim();
        !v.is_empty() && !MISSING_TOKENS.contains(&v)
    })
}

impl From<CsvRow> for FlightRecord {
    fn from(row: CsvRow) -> Self {
        FlightRecord {
            airline: non_empty(row.airline),
            origin: non_empty(row.origin),
            destination: non_empty(row.destination),
            status: non_empty(row.status),
            scheduled_departure: non_empty(row.scheduled_departure),
            actual_departure: non_empty(row.actual_departure),
        }
    }
}

fn decode(bytes: Vec<u8>, encoding: TextEncoding) -> Result<String> {
    match encoding {
        TextEncoding::Utf8 => {
            let text = String::from_utf8(bytes)
                .context("Dataset is not valid UTF-8 (try --encoding latin1)")?;
            Ok(text.trim_start_matches('\u{feff}').to_string())
        }
        // every Latin-1 byte is the code point of the same value
        TextEncoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
    }
}

/// Parse CSV text into flight records
pub fn parse_records(text: &str) -> Result<Vec<FlightRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("Dataset is missing columns: {}", missing.join(", "));
    }

    reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(idx, row)| {
            row.map(FlightRecord::from)
                .with_context(|| format!("Malformed CSV row {}", idx + 2))
        })
        .collect()
}

/// Read the historical flights file
pub fn read_records(path: &Path, encoding: TextEncoding) -> Result<Vec<FlightRecord>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read dataset {:?}", path))?;
    let text = decode(bytes, encoding)?;
    let records = parse_records(&text)?;
    info!(path = ?path, records = records.len(), "Dataset loaded");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Voos,Companhia.Aerea,Codigo.Tipo.Linha,Partida.Prevista,Partida.Real,Chegada.Prevista,Chegada.Real,Situacao.Voo,Codigo.Justificativa,Aeroporto.Origem,Cidade.Origem,Estado.Origem,Pais.Origem,Aeroporto.Destino";

    #[test]
    fn test_parse_records() {
        let text = format!(
            "{HEADER}\n\
             AZU-4170,AZUL,Nacional,2016-01-30T08:58:00Z,2016-01-30T08:58:00Z,,,Realizado,,SBCF,Confins,MG,Brasil,SBRF\n\
             GLO-1001,GOL,Nacional,2016-01-30T10:00:00Z,,,,Cancelado,XN,SBGR,Guarulhos,SP,Brasil,SBRJ\n"
        );
        let records = parse_records(&text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].airline.as_deref(), Some("AZUL"));
        assert_eq!(records[0].origin.as_deref(), Some("SBCF"));
        assert_eq!(records[0].destination.as_deref(), Some("SBRF"));
        assert_eq!(records[0].status.as_deref(), Some("Realizado"));
        assert_eq!(records[1].actual_departure, None);
    }

    #[test]
    fn test_missing_tokens_are_dropped() {
        let text = format!(
            "{HEADER}\n\
             X-1,NA,Nacional,2016-01-30T08:58:00Z,null,,,Realizado,,N/A,Confins,MG,Brasil,NaN\n\
             X-2,NAV,Nacional,2016-01-30T08:58:00Z,2016-01-30T09:10:00Z,,,Realizado,,SBCF,Confins,MG,Brasil,SBRF\n"
        );
        let records = parse_records(&text).unwrap();
        assert_eq!(records[0].airline, None);
        assert_eq!(records[0].origin, None);
        assert_eq!(records[0].destination, None);
        assert_eq!(records[0].actual_departure, None);
        assert_eq!(records[0].status.as_deref(), Some("Realizado"));

        // tokens only match whole cells
        assert_eq!(records[1].airline.as_deref(), Some("NAV"));
    }

    #[test]
    fn test_missing_columns_rejected() {
        let err = parse_records("Companhia.Aerea,Situacao.Voo\nGOL,Realizado\n").unwrap_err();
        assert!(err.to_string().contains("Aeroporto.Origem"));
    }

    #[test]
    fn test_latin1_decoding() {
        let bytes = b"S\xe3o Paulo".to_vec();
        assert_eq!(decode(bytes.clone(), TextEncoding::Latin1).unwrap(), "São Paulo");
        assert!(decode(bytes, TextEncoding::Utf8).is_err());
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let text = decode(b"\xef\xbb\xbfa,b".to_vec(), TextEncoding::Utf8).unwrap();
        assert_eq!(text, "a,b");
    }
}
