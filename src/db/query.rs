//! Parameterized query builders for the trade database.
//!
//! Every user-supplied value goes through `push_bind`; only column lists and
//! the statement-time cap (a server-side integer) are written into the SQL text.

use sqlx::{MySql, QueryBuilder};

use crate::types::{FilterCriteria, ItemNameQuery};

const TRADE_COLUMNS: &str = "CAST(id AS SIGNED) AS id, \
    CAST(item_id AS SIGNED) AS item_id, item_name, log_date, \
    CAST(unit_price AS SIGNED) AS unit_price, world, map_name, \
    CAST(refining_level AS SIGNED) AS refining_level, \
    CAST(cards AS CHAR) AS cards, CAST(random_options AS CHAR) AS random_options";

/// MariaDB aborts the statement once it has run for `secs` seconds.
fn statement_prefix(secs: u64) -> String {
    format!("SET STATEMENT max_statement_time={secs} FOR ")
}

/// Trades for one item, narrowed by every facet present in `criteria`,
/// ordered by record id.
pub fn trades_query(criteria: &FilterCriteria, max_statement_secs: u64) -> QueryBuilder<'_, MySql> {
    let mut qb = QueryBuilder::new(statement_prefix(max_statement_secs));
    qb.push("SELECT ");
    qb.push(TRADE_COLUMNS);
    qb.push(" FROM item_trade_tbl WHERE item_id = ");
    qb.push_bind(criteria.item_id);

    if !criteria.refinings.is_empty() {
        qb.push(" AND refining_level IN (");
        let mut levels = qb.separated(", ");
        for level in &criteria.refinings {
            levels.push_bind(*level);
        }
        levels.push_unseparated(")");
    }

    push_tag_predicates(&mut qb, "cards", &criteria.card_enchants);
    push_tag_predicates(&mut qb, "random_options", &criteria.random_options);

    qb.push(" ORDER BY id ASC");
    qb
}

/// One JSON membership test per required tag; all of them must hold.
fn push_tag_predicates<'a>(qb: &mut QueryBuilder<'a, MySql>, column: &str, tags: &'a [String]) {
    for tag in tags {
        qb.push(" AND JSON_CONTAINS(");
        qb.push(column);
        qb.push(", JSON_QUOTE(");
        qb.push_bind(tag.as_str());
        qb.push("), '$')");
    }
}

pub fn item_metadata_query(item_id: i64, max_statement_secs: u64) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new(statement_prefix(max_statement_secs));
    qb.push(
        "SELECT CAST(item_id AS SIGNED) AS item_id, item_name, \
         CAST(slot AS SIGNED) AS slot, description, cardillustname \
         FROM item_data_tbl WHERE item_id = ",
    );
    qb.push_bind(item_id);
    qb.push(" LIMIT 1");
    qb
}

/// Exact (name, slot) match; the first row wins when names collide.
pub fn item_by_name_query(query: &ItemNameQuery, max_statement_secs: u64) -> QueryBuilder<'_, MySql> {
    let mut qb = QueryBuilder::new(statement_prefix(max_statement_secs));
    qb.push("SELECT CAST(item_id AS SIGNED) AS item_id FROM item_data_tbl WHERE item_name = ");
    qb.push_bind(query.name.as_str());
    qb.push(" AND slot = ");
    qb.push_bind(query.slot);
    qb.push(" LIMIT 1");
    qb
}

pub fn item_suggestions_query(max_statement_secs: u64) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new(statement_prefix(max_statement_secs));
    qb.push(
        "SELECT DISTINCT CAST(item_id AS SIGNED) AS item_id, item_name \
         FROM item_suggest_tbl WHERE item_id IS NOT NULL ORDER BY 1 ASC",
    );
    qb
}
