use std::collections::BTreeSet;

use serde::Serialize;

use crate::types::TradeRecord;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Minute precision, for the hover label.
const HOVER_DATE_FORMAT: &str = "%F %R";

/// Distinct tag values seen in a result set, for the filter controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub card_enchants: Vec<String>,
    pub random_options: Vec<String>,
}

/// Unions the tags of every record per facet; sorted, deduplicated, no empties.
pub fn aggregate_facets(records: &[TradeRecord]) -> Facets {
    let mut cards = BTreeSet::new();
    let mut options = BTreeSet::new();
    for record in records {
        cards.extend(record.cards.iter().filter(|t| !t.is_empty()).cloned());
        options.extend(record.random_options.iter().filter(|t| !t.is_empty()).cloned());
    }
    Facets {
        card_enchants: cards.into_iter().collect(),
        random_options: options.into_iter().collect(),
    }
}

/// Column-oriented scatter data, one entry per record in every column.
/// Serialized straight into the page for the client-side chart.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartData {
    pub id: Vec<i64>,
    pub log_date: Vec<String>,
    pub hover_date: Vec<String>,
    /// Price in Mz.
    pub unit_price: Vec<f64>,
    pub world: Vec<Option<String>>,
    pub map_name: Vec<Option<String>>,
    pub refining_level: Vec<Option<i32>>,
    pub cards: Vec<String>,
    pub random_options: Vec<String>,
    pub color: Vec<&'static str>,
}

impl ChartData {
    pub fn from_records(records: &[TradeRecord]) -> Self {
        let mut data = ChartData::default();
        for r in records {
            data.id.push(r.id);
            data.log_date.push(r.log_date.format(DATE_FORMAT).to_string());
            data.hover_date.push(r.log_date.format(HOVER_DATE_FORMAT).to_string());
            data.unit_price.push(r.price_mz());
            data.world.push(r.world.clone());
            data.map_name.push(r.map_name.clone());
            data.refining_level.push(r.refining_level);
            data.cards.push(r.cards.join(", "));
            data.random_options.push(r.random_options.join(", "));
            data.color.push(r.color().as_str());
        }
        data
    }

    pub fn len(&self) -> usize {
        self.id.len()
    }
}
