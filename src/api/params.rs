use serde::Deserialize;

use crate::types::FilterCriteria;

/// Facet filters as they arrive on the query string. Every key may repeat.
/// Values stay strings here so that one bad `refining` does not reject the
/// whole request.
#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    pub refining: Vec<String>,
    #[serde(default)]
    pub card_enchants: Vec<String>,
    #[serde(default)]
    pub random_options: Vec<String>,
}

impl FilterParams {
    /// Drops non-integer refinement levels and empty tags.
    pub fn into_criteria(self, item_id: i64) -> FilterCriteria {
        FilterCriteria {
            item_id,
            refinings: self
                .refining
                .iter()
                .filter_map(|v| v.trim().parse::<i32>().ok())
                .collect(),
            card_enchants: non_empty(self.card_enchants),
            random_options: non_empty(self.random_options),
        }
    }
}

fn non_empty(tags: Vec<String>) -> Vec<String> {
    tags.into_iter().filter(|t| !t.is_empty()).collect()
}

#[derive(Debug, Default, Deserialize)]
pub struct LookupParams {
    #[serde(default)]
    pub name: String,
}
