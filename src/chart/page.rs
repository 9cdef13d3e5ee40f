//! HTML for the chart page and its empty state.

use axum::response::{Html, IntoResponse};
use maud::{html, Markup, PreEscaped, Render, DOCTYPE};

use crate::chart::data::{ChartData, Facets};
use crate::error::Result;
use crate::types::{FilterCriteria, ItemTrades};

/// Refinement checkboxes offered in the filter form.
const REFINE_LEVELS: std::ops::RangeInclusive<i32> = 0..=10;

/// Script and stylesheet URLs of the client-side chart library.
#[derive(Clone, Copy)]
pub struct Resources<'a> {
    pub js_files: &'a [String],
    pub css_files: &'a [String],
}

pub trait Page {
    fn get_name(&self) -> String;
    fn resources(&self) -> Resources<'_>;
    fn draw_body(&self) -> Markup;
}

pub struct RenderPage<T: Page>(pub T);

impl<T: Page> Render for RenderPage<T> {
    fn render(&self) -> Markup {
        let page = &self.0;
        let resources = page.resources();
        html! {
            (DOCTYPE)
            html lang="ja" {
                head {
                    meta charset="utf-8";
                    title { (page.get_name()) }
                    @for css in resources.css_files {
                        link rel="stylesheet" href=(css);
                    }
                    @for js in resources.js_files {
                        script src=(js) {}
                    }
                }
                body {
                    (SearchForm)
                    (page.draw_body())
                    script { (PreEscaped(AUTOCOMPLETE_SCRIPT)) }
                }
            }
        }
    }
}

impl<T: Page> IntoResponse for RenderPage<T> {
    fn into_response(self) -> axum::response::Response {
        Html(self.render().into_string()).into_response()
    }
}

struct SearchForm;

impl Render for SearchForm {
    fn render(&self) -> Markup {
        html! {
            form class="search" action="/item-lookup" method="get" {
                input type="text" name="name" list="item-names" placeholder="Item name";
                datalist id="item-names" {}
                button type="submit" { "Search" }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Empty state
// ---------------------------------------------------------------------------

/// Search form only. `searched` echoes a name that did not resolve.
pub struct EmptyPage<'a> {
    pub resources: Resources<'a>,
    pub searched: &'a str,
}

impl Page for EmptyPage<'_> {
    fn get_name(&self) -> String {
        "Trade Chart".to_string()
    }

    fn resources(&self) -> Resources<'_> {
        self.resources
    }

    fn draw_body(&self) -> Markup {
        html! {
            @if !self.searched.is_empty() {
                p class="not-found" { "No item named " strong { (self.searched) } "." }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Item chart
// ---------------------------------------------------------------------------

pub struct ItemPage<'a> {
    pub resources: Resources<'a>,
    criteria: &'a FilterCriteria,
    item_name: String,
    description: Option<String>,
    resource_name: Option<String>,
    trade_count: usize,
    facets: Facets,
    /// Chart dataset and title, already serialized for the inline script.
    chart_json: String,
    title_json: String,
}

impl<'a> ItemPage<'a> {
    pub fn new(
        resources: Resources<'a>,
        criteria: &'a FilterCriteria,
        trades: &ItemTrades,
        facets: Facets,
    ) -> Result<Self> {
        let chart = ChartData::from_records(&trades.records);
        let item_name = trades.display_name();
        Ok(Self {
            resources,
            criteria,
            description: trades.metadata.as_ref().and_then(|m| m.description.clone()),
            resource_name: trades.metadata.as_ref().map(|m| m.resource_name()),
            trade_count: chart.len(),
            facets,
            chart_json: script_json(&chart)?,
            title_json: script_json(&item_name)?,
            item_name,
        })
    }

    fn filter_form(&self) -> Markup {
        let c = self.criteria;
        html! {
            form class="filters" action={ "/item/" (c.item_id) } method="get" {
                fieldset {
                    legend { "精錬値" }
                    @for level in REFINE_LEVELS {
                        label {
                            input type="checkbox" name="refining" value=(level)
                                checked[c.refinings.contains(&level)];
                            "+" (level)
                        }
                    }
                }
                (tag_select("card_enchants", "カード/エンチャント", &self.facets.card_enchants, &c.card_enchants))
                (tag_select("random_options", "ランダムオプション", &self.facets.random_options, &c.random_options))
                button type="submit" { "Filter" }
            }
        }
    }
}

impl Page for ItemPage<'_> {
    fn get_name(&self) -> String {
        if self.item_name.is_empty() {
            "Trade Chart".to_string()
        } else {
            format!("{} - Trade Chart", self.item_name)
        }
    }

    fn resources(&self) -> Resources<'_> {
        self.resources
    }

    fn draw_body(&self) -> Markup {
        let item_id = self.criteria.item_id;
        let query = query_string(self.criteria);
        html! {
            section class="item" {
                @if let Some(res) = &self.resource_name {
                    img class="item-icon" src={ "/assets/img/item/" (res) ".png" } alt="";
                }
                h1 { (self.item_name) " " small { "#" (item_id) } }
                p class="count" { (self.trade_count) " trades" }
                @if let Some(desc) = &self.description {
                    div class="description" {
                        @for (i, line) in desc.split('\n').enumerate() {
                            @if i > 0 { br; }
                            (line)
                        }
                    }
                }
            }
            (self.filter_form())
            nav class="exports" {
                a href={ "/item/" (item_id) "/export.json" (query) } { "JSON" } " "
                a href={ "/item/" (item_id) "/export.csv" (query) } { "CSV" } " "
                a href={ "/item/" (item_id) "/export-image" (query) } { "PNG" }
            }
            div id="chart" {}
            script {
                "const title = " (PreEscaped(&self.title_json)) ";\n"
                "const data = " (PreEscaped(&self.chart_json)) ";\n"
                (PreEscaped(CHART_SCRIPT))
            }
        }
    }
}

fn tag_select(name: &str, legend: &str, options: &[String], selected: &[String]) -> Markup {
    html! {
        fieldset {
            legend { (legend) }
            select name=(name) multiple {
                @for opt in options {
                    option value=(opt) selected[selected.contains(opt)] { (opt) }
                }
            }
        }
    }
}

/// JSON safe to inline in a `<script>` element.
fn script_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// Rebuilds the active filters as `?refining=..&card_enchants=..`, or "" when
/// nothing is filtered.
pub fn query_string(criteria: &FilterCriteria) -> String {
    let pairs: Vec<String> = criteria
        .refinings
        .iter()
        .map(|r| format!("refining={r}"))
        .chain(
            criteria
                .card_enchants
                .iter()
                .map(|t| format!("card_enchants={}", urlencoding::encode(t))),
        )
        .chain(
            criteria
                .random_options
                .iter()
                .map(|t| format!("random_options={}", urlencoding::encode(t))),
        )
        .collect();
    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}

const CHART_SCRIPT: &str = r#"const hover = data.id.map((id, i) =>
  `ID: ${id}<br>World: ${data.world[i] ?? ""}<br>Map: ${data.map_name[i] ?? ""}` +
  `<br>日時: ${data.hover_date[i]}<br>価格: ${data.unit_price[i]}` +
  `<br>精錬値: ${data.refining_level[i] ?? ""}<br>カード/エンチャント: ${data.cards[i]}` +
  `<br>ランダムオプション: ${data.random_options[i]}`);
Plotly.newPlot("chart", [{
  type: "scatter",
  mode: "markers",
  x: data.log_date,
  y: data.unit_price,
  text: hover,
  hoverinfo: "text",
  marker: { color: data.color, size: 12, opacity: 0.5 },
}], {
  title: title,
  xaxis: { title: "日付", type: "date" },
  yaxis: { title: "価格(Mz)" },
}, { responsive: true, displaylogo: false });
"#;

const AUTOCOMPLETE_SCRIPT: &str = r#"
fetch("/items").then(r => r.json()).then(items => {
  const list = document.getElementById("item-names");
  for (const name of Object.values(items)) {
    if (name === null) continue;
    const opt = document.createElement("option");
    opt.value = name;
    list.appendChild(opt);
  }
}).catch(() => {});
"#;
