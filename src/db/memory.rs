//! In-memory `TradeStore` with the same filter semantics as the SQL builder.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::db::store::TradeStore;
use crate::error::Result;
use crate::types::{FilterCriteria, ItemMetadata, ItemNameQuery, ItemTrades, TradeRecord};

#[derive(Default)]
pub struct MemoryStore {
    pub trades: Vec<TradeRecord>,
    pub items: Vec<ItemMetadata>,
    pub suggestions: Vec<(i64, Option<String>)>,
}

fn matches(record: &TradeRecord, criteria: &FilterCriteria) -> bool {
    record.item_id == criteria.item_id
        && (criteria.refinings.is_empty()
            || record
                .refining_level
                .is_some_and(|lvl| criteria.refinings.contains(&lvl)))
        && criteria.card_enchants.iter().all(|t| record.cards.contains(t))
        && criteria
            .random_options
            .iter()
            .all(|t| record.random_options.contains(t))
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn trades(&self, criteria: &FilterCriteria) -> Result<Vec<TradeRecord>> {
        let mut found: Vec<TradeRecord> = self
            .trades
            .iter()
            .filter(|r| matches(r, criteria))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.id);
        Ok(found)
    }

    async fn item_trades(&self, criteria: &FilterCriteria) -> Result<ItemTrades> {
        let records = self.trades(criteria).await?;
        let metadata = self
            .items
            .iter()
            .find(|m| m.item_id == criteria.item_id)
            .cloned();
        Ok(ItemTrades { metadata, records })
    }

    async fn find_item_id(&self, query: &ItemNameQuery) -> Result<Option<i64>> {
        Ok(self
            .items
            .iter()
            .find(|m| m.item_name == query.name && m.slot.unwrap_or(0) == query.slot)
            .map(|m| m.item_id))
    }

    async fn item_names(&self) -> Result<BTreeMap<i64, Option<String>>> {
        Ok(self.suggestions.iter().cloned().collect())
    }
}
