use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::Query;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::params::{FilterParams, LookupParams};
use crate::chart::image::render_png;
use crate::chart::page::{query_string, EmptyPage, ItemPage, RenderPage, Resources};
use crate::chart::aggregate_facets;
use crate::config::{Config, CHART_IMAGE_SIZE};
use crate::db::TradeStore;
use crate::error::AppError;
use crate::export::{export_as, ExportFormat};
use crate::types::ItemNameQuery;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn TradeStore>,
    pub config: Arc<Config>,
}

impl ApiState {
    fn resources(&self) -> Resources<'_> {
        Resources {
            js_files: &self.config.chart_js_files,
            css_files: &self.config.chart_css_files,
        }
    }

    /// Scheme and host for absolute URLs handed to other sites.
    fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(base) = &self.config.public_base_url {
            return base.clone();
        }
        headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(|host| format!("https://{host}"))
            .unwrap_or_default()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/item/:item_id", get(item_page))
        .route("/item/:item_id/check", get(check_item))
        .route("/item/:item_id/export-image", get(export_image))
        .route("/item/:item_id/:file", get(export_file))
        .route("/item-lookup", get(item_lookup))
        .route("/chart-resources", get(chart_resources))
        .route("/items", get(items))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub success: bool,
    pub data: CheckData,
    pub export_img_url: String,
}

#[derive(Debug, Serialize)]
pub struct CheckData {
    pub item_id: i64,
    pub item_name: String,
    pub refinings: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct ChartResourcesResponse<'a> {
    pub success: bool,
    pub js_files: &'a [String],
    pub css_files: &'a [String],
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn item_page(
    State(state): State<ApiState>,
    Path(item_id): Path<i64>,
    Query(params): Query<FilterParams>,
) -> Result<Response, AppError> {
    let criteria = params.into_criteria(item_id);
    if !criteria.has_valid_item() {
        let page = EmptyPage {
            resources: state.resources(),
            searched: "",
        };
        return Ok(RenderPage(page).into_response());
    }

    let trades = state.store.item_trades(&criteria).await?;
    let facets = aggregate_facets(&trades.records);
    info!(
        item_id,
        trades = trades.records.len(),
        card_facets = facets.card_enchants.len(),
        option_facets = facets.random_options.len(),
        "chart page"
    );

    let page = ItemPage::new(state.resources(), &criteria, &trades, facets)?;
    Ok(RenderPage(page).into_response())
}

async fn item_lookup(
    State(state): State<ApiState>,
    Query(params): Query<LookupParams>,
) -> Result<Response, AppError> {
    if !params.name.is_empty() {
        let query = ItemNameQuery::parse(&params.name);
        if let Some(item_id) = state.store.find_item_id(&query).await? {
            return Ok(Redirect::to(&format!("/item/{item_id}")).into_response());
        }
        info!(name = %params.name, "item lookup found nothing");
    }

    let page = EmptyPage {
        resources: state.resources(),
        searched: &params.name,
    };
    Ok(RenderPage(page).into_response())
}

async fn export_image(
    State(state): State<ApiState>,
    Path(item_id): Path<i64>,
    Query(params): Query<FilterParams>,
) -> Result<Response, AppError> {
    let criteria = params.into_criteria(item_id);
    if !criteria.has_valid_item() {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let trades = state.store.item_trades(&criteria).await?;
    let title = trades.display_name();
    let file_name = if title.is_empty() {
        format!("trade-chart_{item_id}.png")
    } else {
        format!("trade-chart_{title}.png")
    };

    let records = trades.records;
    let png = tokio::task::spawn_blocking(move || render_png(&title, &records, CHART_IMAGE_SIZE))
        .await??;
    info!(item_id, bytes = png.len(), "chart image exported");

    Ok(attachment(png, "image/png", &file_name))
}

async fn check_item(
    State(state): State<ApiState>,
    Path(item_id): Path<i64>,
    headers: HeaderMap,
    Query(params): Query<FilterParams>,
) -> Result<Response, AppError> {
    let criteria = params.into_criteria(item_id);

    let (item_name, has_trades) = if criteria.has_valid_item() {
        let trades = state.store.item_trades(&criteria).await?;
        (trades.display_name(), !trades.records.is_empty())
    } else {
        (String::new(), false)
    };

    let base = state.base_url(&headers);
    let export_img_url = if has_trades {
        format!(
            "{base}/item/{item_id}/export-image{}",
            query_string(&criteria)
        )
    } else {
        format!("{base}{}", state.config.not_found_image_path)
    };

    let body = CheckResponse {
        success: true,
        data: CheckData {
            item_id,
            item_name,
            refinings: criteria.refinings,
        },
        export_img_url,
    };
    Ok((
        [(header::CONTENT_DISPOSITION, "inline; filename=check.json")],
        Json(body),
    )
        .into_response())
}

async fn export_file(
    State(state): State<ApiState>,
    Path((item_id, file)): Path<(i64, String)>,
    Query(params): Query<FilterParams>,
) -> Result<Response, AppError> {
    let Some(format) = file
        .strip_prefix("export.")
        .and_then(ExportFormat::from_extension)
    else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let criteria = params.into_criteria(item_id);
    if !criteria.has_valid_item() {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let records = state.store.trades(&criteria).await?;
    let export = export_as(format, &records)?;
    info!(item_id, rows = records.len(), file = format.file_name(), "export");

    Ok(attachment(
        export.body,
        export.format.content_type(),
        export.format.file_name(),
    ))
}

async fn chart_resources(State(state): State<ApiState>) -> Response {
    let body = ChartResourcesResponse {
        success: true,
        js_files: &state.config.chart_js_files,
        css_files: &state.config.chart_css_files,
    };
    (
        [(header::CONTENT_DISPOSITION, "inline; filename=chart.json")],
        Json(body),
    )
        .into_response()
}

async fn items(
    State(state): State<ApiState>,
) -> Result<Json<std::collections::BTreeMap<i64, Option<String>>>, AppError> {
    Ok(Json(state.store.item_names().await?))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn attachment(body: Vec<u8>, content_type: &str, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(file_name)),
        ],
        body,
    )
        .into_response()
}

/// RFC 6266 attachment header with an ASCII fallback name and the exact
/// UTF-8 name in `filename*`.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::chart::data::tests::record;
    use crate::db::memory::MemoryStore;
    use crate::types::{ItemMetadata, TradeRecord};

    fn trade(id: i64, refining: Option<i32>, cards: &[&str]) -> TradeRecord {
        record(id, refining, cards, &[])
    }

    fn app() -> Router {
        let store = MemoryStore {
            trades: vec![
                trade(1, Some(5), &["A", "B"]),
                trade(2, Some(7), &["A"]),
                trade(3, Some(9), &["B"]),
                trade(4, None, &["A", "B", "C"]),
                trade(5, Some(7), &["B", "A"]),
            ],
            items: vec![
                ItemMetadata {
                    item_id: 1101,
                    item_name: "Sword".to_string(),
                    slot: Some(3),
                    description: Some("A sword".to_string()),
                    has_illustration: false,
                },
                ItemMetadata {
                    item_id: 2000,
                    item_name: "Quiet Item".to_string(),
                    slot: None,
                    description: None,
                    has_illustration: false,
                },
            ],
            suggestions: vec![
                (2000, Some("Quiet Item".to_string())),
                (1101, Some("Sword[3]".to_string())),
                (3000, None),
            ],
        };
        router(ApiState {
            store: Arc::new(store),
            config: Arc::new(Config::for_tests()),
        })
    }

    async fn fetch(uri: &str) -> (StatusCode, HeaderMap, String) {
        let resp = app()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(header::HOST, "charts.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn export_ids(uri: &str) -> Vec<i64> {
        let (status, _, body) = fetch(uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
        doc.as_object()
            .unwrap()
            .keys()
            .map(|k| k.parse().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn non_positive_item_renders_empty_state() {
        let (status, _, body) = fetch("/item/0").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("action=\"/item-lookup\""));
        assert!(!body.contains("id=\"chart\""));
    }

    #[tokio::test]
    async fn item_page_shows_chart_and_facets() {
        let (status, _, body) = fetch("/item/1101?refining=7").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Sword[3]"));
        assert!(body.contains("id=\"chart\""));
        assert!(body.contains("2 trades"));
        assert!(body.contains("<option value=\"A\">A</option>"));
    }

    #[tokio::test]
    async fn refining_filter_is_a_union_of_levels() {
        let ids = export_ids("/item/1101/export.json?refining=5&refining=7").await;
        assert_eq!(ids, vec![1, 2, 5]);
    }

    #[tokio::test]
    async fn tag_filters_require_every_tag() {
        let ids = export_ids("/item/1101/export.json?card_enchants=A&card_enchants=B").await;
        assert_eq!(ids, vec![1, 4, 5]);
    }

    #[tokio::test]
    async fn malformed_refining_is_ignored() {
        let ids = export_ids("/item/1101/export.json?refining=abc&refining=9").await;
        assert_eq!(ids, vec![3]);
        let ids = export_ids("/item/1101/export.json?refining=abc").await;
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn csv_export_is_an_attachment() {
        let (status, headers, body) = fetch("/item/1101/export.csv?refining=7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
        assert!(headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"export.csv\""));
        assert_eq!(body.lines().count(), 3);
    }

    #[tokio::test]
    async fn unsupported_export_format_is_empty_not_found() {
        let (status, _, body) = fetch("/item/1101/export.xml").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn check_without_trades_points_at_placeholder() {
        let (status, headers, body) = fetch("/item/2000/check").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_DISPOSITION], "inline; filename=check.json");
        let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["success"], true);
        assert_eq!(doc["data"]["item_id"], 2000);
        assert_eq!(doc["data"]["item_name"], "Quiet Item");
        assert_eq!(
            doc["export_img_url"],
            "https://charts.example/assets/img/404_notfound.jpg"
        );
    }

    #[tokio::test]
    async fn check_with_trades_links_filtered_image() {
        let (_, _, body) = fetch("/item/1101/check?refining=7&refining=oops").await;
        let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["data"]["refinings"], serde_json::json!([7]));
        assert_eq!(
            doc["export_img_url"],
            "https://charts.example/item/1101/export-image?refining=7"
        );
    }

    #[tokio::test]
    async fn export_image_rejects_invalid_item() {
        let (status, _, _) = fetch("/item/0/export-image").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn export_image_is_a_png_attachment() {
        let (status, headers, body) = fetch("/item/1101/export-image?refining=7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert!(headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"trade-chart_Sword[3].png\""));
        // The leading 0x89 byte is not UTF-8 and comes back as U+FFFD.
        assert!(body.starts_with("\u{FFFD}PNG\r\n\u{1a}\n"));
    }

    #[tokio::test]
    async fn lookup_redirects_to_item() {
        let (status, headers, _) = fetch("/item-lookup?name=Sword%5B3%5D").await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(headers[header::LOCATION], "/item/1101");
    }

    #[tokio::test]
    async fn lookup_miss_renders_empty_state() {
        let (status, _, body) = fetch("/item-lookup?name=Sword").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No item named"));
    }

    #[tokio::test]
    async fn items_lists_suggestions_by_id() {
        let (status, _, body) = fetch("/items").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"1101":"Sword[3]","2000":"Quiet Item","3000":null}"#);
    }

    #[tokio::test]
    async fn chart_resources_lists_scripts() {
        let (_, _, body) = fetch("/chart-resources").await;
        let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["success"], true);
        assert_eq!(doc["js_files"].as_array().unwrap().len(), 1);
        assert!(doc["css_files"].as_array().unwrap().is_empty());
    }

    #[test]
    fn disposition_keeps_non_ascii_names() {
        let cd = content_disposition("trade-chart_剣[3].png");
        assert!(cd.starts_with("attachment; filename=\"trade-chart__[3].png\""));
        assert!(cd.contains("filename*=UTF-8''trade-chart_%E5%89%A3%5B3%5D.png"));
    }
}
