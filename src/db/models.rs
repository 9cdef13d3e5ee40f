//! Row types for the external trade database. Integer and JSON columns are
//! cast in SQL so the decoded types do not depend on the exact column widths.
use chrono::NaiveDateTime;
use tracing::warn;

use crate::types::{ItemMetadata, TradeRecord};

#[derive(Debug, sqlx::FromRow)]
pub struct TradeRow {
    pub id: i64,
    pub item_id: i64,
    pub item_name: Option<String>,
    pub log_date: NaiveDateTime,
    pub unit_price: i64,
    pub world: Option<String>,
    pub map_name: Option<String>,
    pub refining_level: Option<i64>,
    pub cards: Option<String>,
    pub random_options: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ItemDataRow {
    pub item_id: i64,
    pub item_name: String,
    pub slot: Option<i64>,
    pub description: Option<String>,
    pub cardillustname: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ItemSuggestRow {
    pub item_id: i64,
    pub item_name: Option<String>,
}

impl From<TradeRow> for TradeRecord {
    fn from(row: TradeRow) -> Self {
        let cards = decode_tags(row.id, "cards", row.cards.as_deref());
        let random_options = decode_tags(row.id, "random_options", row.random_options.as_deref());
        TradeRecord {
            id: row.id,
            item_id: row.item_id,
            item_name: row.item_name,
            log_date: row.log_date,
            unit_price: row.unit_price,
            world: row.world,
            map_name: row.map_name,
            refining_level: row.refining_level.and_then(|v| i32::try_from(v).ok()),
            cards,
            random_options,
        }
    }
}

impl From<ItemDataRow> for ItemMetadata {
    fn from(row: ItemDataRow) -> Self {
        ItemMetadata {
            item_id: row.item_id,
            item_name: row.item_name,
            slot: row.slot.and_then(|v| i32::try_from(v).ok()),
            description: row.description,
            has_illustration: row.cardillustname.is_some(),
        }
    }
}

/// Decodes a JSON array of tags. `null` and empty entries are dropped and
/// duplicates collapse to their first occurrence. A malformed column yields
/// no tags rather than failing the whole query.
pub fn decode_tags(trade_id: i64, column: &str, raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Vec::new();
    };
    let parsed: Vec<Option<String>> = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(trade_id, column, "unparseable tag list: {e}");
            return Vec::new();
        }
    };

    let mut tags: Vec<String> = Vec::with_capacity(parsed.len());
    for tag in parsed.into_iter().flatten() {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(refining_level: Option<i64>, cards: Option<&str>) -> TradeRow {
        TradeRow {
            id: 7,
            item_id: 1101,
            item_name: Some("Sword".to_string()),
            log_date: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(12, 30, 0)
                .unwrap(),
            unit_price: 2_500_000,
            world: Some("Chaos".to_string()),
            map_name: Some("prontera".to_string()),
            refining_level,
            cards: cards.map(str::to_string),
            random_options: None,
        }
    }

    #[test]
    fn decode_drops_nulls_and_empties() {
        let tags = decode_tags(1, "cards", Some(r#"["Hydra", null, "", "Hydra", "Andre"]"#));
        assert_eq!(tags, vec!["Hydra", "Andre"]);
    }

    #[test]
    fn decode_tolerates_missing_and_malformed() {
        assert!(decode_tags(1, "cards", None).is_empty());
        assert!(decode_tags(1, "cards", Some("")).is_empty());
        assert!(decode_tags(1, "cards", Some("not json")).is_empty());
    }

    #[test]
    fn trade_row_converts() {
        let record = TradeRecord::from(row(Some(7), Some(r#"["Hydra",null]"#)));
        assert_eq!(record.refining_level, Some(7));
        assert_eq!(record.cards, vec!["Hydra"]);
        assert!(record.random_options.is_empty());
        assert!((record.price_mz() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_refining_becomes_unknown() {
        let record = TradeRecord::from(row(Some(i64::MAX), None));
        assert_eq!(record.refining_level, None);
    }

    #[test]
    fn item_row_sets_illustration_flag() {
        let meta = ItemMetadata::from(ItemDataRow {
            item_id: 4001,
            item_name: "Poring Card".to_string(),
            slot: None,
            description: Some("A card".to_string()),
            cardillustname: Some("poring".to_string()),
        });
        assert!(meta.has_illustration);
        assert_eq!(meta.resource_name(), "4001_cardillust");
    }
}
