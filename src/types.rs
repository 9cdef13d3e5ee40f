use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Raw prices are stored in zeny; charts are drawn in millions (Mz).
pub const ZENY_PER_MZ: f64 = 1_000_000.0;

// ---------------------------------------------------------------------------
// Trade log
// ---------------------------------------------------------------------------

/// One observed sale, as read from `item_trade_tbl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: i64,
    pub item_id: i64,
    /// Item name as written by the log collector. May lag behind item metadata.
    pub item_name: Option<String>,
    pub log_date: NaiveDateTime,
    /// Unit price in zeny.
    pub unit_price: i64,
    pub world: Option<String>,
    pub map_name: Option<String>,
    pub refining_level: Option<i32>,
    pub cards: Vec<String>,
    pub random_options: Vec<String>,
}

impl TradeRecord {
    pub fn price_mz(&self) -> f64 {
        self.unit_price as f64 / ZENY_PER_MZ
    }

    pub fn color(&self) -> RefineColor {
        RefineColor::from_level(self.refining_level)
    }
}

// ---------------------------------------------------------------------------
// Item metadata
// ---------------------------------------------------------------------------

/// Static descriptive row from `item_data_tbl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub item_id: i64,
    pub item_name: String,
    pub slot: Option<i32>,
    pub description: Option<String>,
    pub has_illustration: bool,
}

impl ItemMetadata {
    /// `Name[slot]` for slotted equipment, the bare name otherwise.
    pub fn display_name(&self) -> String {
        match self.slot {
            Some(slot) if slot > 0 => format!("{}[{}]", self.item_name, slot),
            _ => self.item_name.clone(),
        }
    }

    /// Image resource key; card items with an illustration use the illustration.
    pub fn resource_name(&self) -> String {
        if self.has_illustration {
            format!("{}_cardillust", self.item_id)
        } else {
            self.item_id.to_string()
        }
    }
}

/// Everything a chart request needs, read over a single connection.
#[derive(Debug, Clone, Default)]
pub struct ItemTrades {
    pub metadata: Option<ItemMetadata>,
    pub records: Vec<TradeRecord>,
}

impl ItemTrades {
    pub fn display_name(&self) -> String {
        self.metadata
            .as_ref()
            .map(ItemMetadata::display_name)
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Facet filters for one request. Empty lists impose no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub item_id: i64,
    /// Acceptable refinement levels (OR).
    pub refinings: Vec<i32>,
    /// Card/enchant tags that must all be present (AND).
    pub card_enchants: Vec<String>,
    /// Random-option tags that must all be present (AND).
    pub random_options: Vec<String>,
}

impl FilterCriteria {
    pub fn for_item(item_id: i64) -> Self {
        Self {
            item_id,
            ..Self::default()
        }
    }

    pub fn has_valid_item(&self) -> bool {
        self.item_id > 0
    }
}

// ---------------------------------------------------------------------------
// Refinement color
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefineColor {
    /// +0 to +4
    Black,
    /// +5 and +6
    Blue,
    /// +7 and +8
    Green,
    /// +9
    Orange,
    /// +10
    Red,
    /// Unknown or out of table
    Gray,
}

impl RefineColor {
    pub fn from_level(level: Option<i32>) -> Self {
        match level {
            Some(0..=4) => RefineColor::Black,
            Some(5..=6) => RefineColor::Blue,
            Some(7..=8) => RefineColor::Green,
            Some(9) => RefineColor::Orange,
            Some(10) => RefineColor::Red,
            _ => RefineColor::Gray,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefineColor::Black => "black",
            RefineColor::Blue => "blue",
            RefineColor::Green => "green",
            RefineColor::Orange => "orange",
            RefineColor::Red => "red",
            RefineColor::Gray => "gray",
        }
    }
}

impl std::fmt::Display for RefineColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Item name lookup
// ---------------------------------------------------------------------------

/// A display name split into base name and slot count, e.g. `Sword[3]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemNameQuery {
    pub name: String,
    pub slot: i32,
}

impl ItemNameQuery {
    /// Splits a trailing single-digit `[n]` suffix off the name. Anything else
    /// is taken verbatim as the base name with slot 0.
    pub fn parse(input: &str) -> Self {
        let suffixed = input
            .strip_suffix(']')
            .and_then(|rest| rest.rsplit_once('['))
            .filter(|(base, digit)| {
                !base.is_empty() && digit.len() == 1 && digit.bytes().all(|b| b.is_ascii_digit())
            });

        match suffixed {
            Some((base, digit)) => Self {
                name: base.to_string(),
                slot: digit.parse().unwrap_or(0),
            },
            None => Self {
                name: input.to_string(),
                slot: 0,
            },
        }
    }
}
