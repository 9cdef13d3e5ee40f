//! Tabular export of a filtered trade set, keyed by record id.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::chart::data::DATE_FORMAT;
use crate::error::{AppError, Result};
use crate::types::TradeRecord;

pub const CSV_HEADER: [&str; 9] = [
    "id",
    "item_name",
    "log_date",
    "unit_price",
    "world",
    "map_name",
    "refining_level",
    "cards",
    "random_options",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// `None` for anything but `json` and `csv`; callers answer with an empty 404.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "export.json",
            ExportFormat::Csv => "export.csv",
        }
    }
}

#[derive(Debug)]
pub struct Export {
    pub format: ExportFormat,
    pub body: Vec<u8>,
}

pub fn export_as(format: ExportFormat, records: &[TradeRecord]) -> Result<Export> {
    let body = match format {
        ExportFormat::Json => serde_json::to_vec(&RowsById(records))?,
        ExportFormat::Csv => to_csv(records)?,
    };
    Ok(Export { format, body })
}

#[derive(serde::Serialize)]
struct ExportRow<'a> {
    item_name: Option<&'a str>,
    log_date: String,
    unit_price: i64,
    world: Option<&'a str>,
    map_name: Option<&'a str>,
    refining_level: Option<i32>,
    cards: &'a [String],
    random_options: &'a [String],
}

impl<'a> From<&'a TradeRecord> for ExportRow<'a> {
    fn from(r: &'a TradeRecord) -> Self {
        ExportRow {
            item_name: r.item_name.as_deref(),
            log_date: r.log_date.format(DATE_FORMAT).to_string(),
            unit_price: r.unit_price,
            world: r.world.as_deref(),
            map_name: r.map_name.as_deref(),
            refining_level: r.refining_level,
            cards: &r.cards,
            random_options: &r.random_options,
        }
    }
}

/// `{"<id>": {row}, ...}` in record order.
struct RowsById<'a>(&'a [TradeRecord]);

impl Serialize for RowsById<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for record in self.0 {
            map.serialize_entry(&record.id, &ExportRow::from(record))?;
        }
        map.end()
    }
}

fn to_csv(records: &[TradeRecord]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(CSV_HEADER)?;
    for r in records {
        let row = ExportRow::from(r);
        wtr.write_record([
            r.id.to_string(),
            row.item_name.unwrap_or_default().to_string(),
            row.log_date,
            row.unit_price.to_string(),
            row.world.unwrap_or_default().to_string(),
            row.map_name.unwrap_or_default().to_string(),
            row.refining_level.map(|l| l.to_string()).unwrap_or_default(),
            serde_json::to_string(row.cards)?,
            serde_json::to_string(row.random_options)?,
        ])?;
    }
    wtr.into_inner().map_err(|e| AppError::Io(e.into_error()))
}
