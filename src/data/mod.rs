//! Loaders for the price table, asset metadata and category groupings
//!
//! - Prices: CSV with `date`, `coin`, `prices` columns (long format)
//! - Metadata: CSV with `id`, `name`, `market_caps`, `categories` columns,
//!   where `categories` is a serialized list
//! - Groupings: JSON object of grouping name to category names
//!
//! Extra columns are ignored. Schema problems surface as
//! [`Error::DataFormat`] naming the source and row.

mod tags;

pub use tags::parse_tag_list;

use crate::category::{AssetMetadata, CategoryGroupings};
use crate::error::{Error, Result};
use crate::estimator::{PricePoint, PriceTable};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: String,
    coin: String,
    #[serde(default)]
    prices: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MetadataRow {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    market_caps: Option<f64>,
    #[serde(default)]
    categories: Option<String>,
}

fn source_name(path: &Path) -> String {
    path.display().to_string()
}

/// Parse the date part of a `YYYY-MM-DD[ time]` cell
fn parse_date(cell: &str) -> Option<NaiveDate> {
    let day = cell.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Read long-format price rows
pub fn read_prices<R: Read>(reader: R, source: &str) -> Result<Vec<PricePoint>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut points = Vec::new();

    for (i, result) in csv_reader.deserialize().enumerate() {
        // header is line 1
        let line = i + 2;
        let row: PriceRow =
            result.map_err(|e| Error::data_format(source, format!("line {}: {}", line, e)))?;
        let date = parse_date(&row.date).ok_or_else(|| {
            Error::data_format(source, format!("line {}: invalid date '{}'", line, row.date))
        })?;
        if row.coin.trim().is_empty() {
            return Err(Error::data_format(source, format!("line {}: empty coin id", line)));
        }
        points.push(PricePoint::new(date, row.coin.trim(), row.prices));
    }

    debug!(source, rows = points.len(), "Read price rows");
    Ok(points)
}

/// Load and pivot the price table
pub fn load_prices(path: &Path) -> Result<PriceTable> {
    let file = File::open(path)?;
    let points = read_prices(BufReader::new(file), &source_name(path))?;
    let table = PriceTable::from_long(points)?;
    info!(
        path = %path.display(),
        assets = table.assets().len(),
        periods = table.n_periods(),
        "Loaded price table"
    );
    Ok(table)
}

/// Read asset metadata rows
pub fn read_metadata<R: Read>(reader: R, source: &str) -> Result<Vec<AssetMetadata>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut assets = Vec::new();

    for (i, result) in csv_reader.deserialize().enumerate() {
        let line = i + 2;
        let row: MetadataRow =
            result.map_err(|e| Error::data_format(source, format!("line {}: {}", line, e)))?;
        let id = row.id.trim().to_string();
        if id.is_empty() {
            return Err(Error::data_format(source, format!("line {}: empty id", line)));
        }

        let categories = match row.categories.as_deref() {
            Some(cell) => parse_tag_list(cell).map_err(|e| {
                Error::data_format(source, format!("line {}: categories of {}: {}", line, id, e))
            })?,
            None => Vec::new(),
        };

        assets.push(AssetMetadata {
            name: row
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| id.clone()),
            market_cap: row.market_caps.unwrap_or(f64::NAN),
            categories,
            id,
        });
    }

    debug!(source, rows = assets.len(), "Read asset metadata");
    Ok(assets)
}

pub fn load_metadata(path: &Path) -> Result<Vec<AssetMetadata>> {
    let file = File::open(path)?;
    let metadata = read_metadata(BufReader::new(file), &source_name(path))?;
    info!(path = %path.display(), assets = metadata.len(), "Loaded asset metadata");
    Ok(metadata)
}

/// Read a groupings document
pub fn read_groupings<R: Read>(reader: R, source: &str) -> Result<CategoryGroupings> {
    serde_json::from_reader(reader).map_err(|e| Error::data_format(source, e.to_string()))
}

pub fn load_groupings(path: &Path) -> Result<CategoryGroupings> {
    let file = File::open(path)?;
    let groupings = read_groupings(BufReader::new(file), &source_name(path))?;
    info!(
        path = %path.display(),
        groupings = groupings.0.len(),
        "Loaded category groupings"
    );
    Ok(groupings)
}
