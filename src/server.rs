use axum::{
    Router,
    extract::{Query, State},
    response::{Html, Json},
    routing::get,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::kpx::Dataset;
use crate::kpx::analysis::{
    AGGREGATE_LABEL, HourlyVolume, RegionTotal, SOLAR_LABEL, Selection, SeriesPoint,
    SourceSelection, WIND_LABEL,
};
use crate::kpx::boundaries::FEATURE_NAME_PROPERTY;

#[derive(Clone)]
struct AppState {
    dataset: Arc<Dataset>,
    boundaries: Arc<Value>,
}

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Filter query shared by the dashboard and the view endpoints. Each time
/// dimension is either an integer or the aggregate marker (`합계`/`all`,
/// empty, or absent).
#[derive(Debug, Deserialize, Default)]
struct FilterQuery {
    month: Option<String>,
    day: Option<String>,
    hour: Option<String>,
    source: Option<String>,
}

fn parse_dimension(raw: Option<&str>) -> Result<Option<u32>, StatusCode> {
    match raw {
        None => Ok(None),
        Some(value) if value.is_empty() || value == AGGREGATE_LABEL || value == "all" => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| StatusCode::BAD_REQUEST),
    }
}

impl FilterQuery {
    fn selection(&self) -> Result<Selection, StatusCode> {
        let source = match self.source.as_deref() {
            None => SourceSelection::Aggregate,
            Some(value) => SourceSelection::parse(value).ok_or(StatusCode::BAD_REQUEST)?,
        };

        Ok(Selection {
            month: parse_dimension(self.month.as_deref())?,
            day: parse_dimension(self.day.as_deref())?,
            hour: parse_dimension(self.hour.as_deref())?,
            source,
        }
        .normalized())
    }
}

/// GET /health
async fn health() -> &'static str {
    "OK"
}

/// GET /api/v1/regions
/// All canonical regions observed in the dataset, sorted.
async fn list_regions(State(state): State<AppState>) -> Json<ApiResponse<Vec<String>>> {
    Json(ApiResponse::success(state.dataset.regions.clone()))
}

#[derive(Serialize)]
struct OptionsResponse {
    months: Vec<u32>,
    days: Vec<u32>,
    hours: Vec<u32>,
    sources: Vec<&'static str>,
}

/// GET /api/v1/options?month=M&day=D
/// Cascading selector option sets for the given upstream selection. Day
/// options are only populated under a concrete month, hour options under a
/// concrete month and day; the aggregate choice is implicit.
async fn get_options(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<ApiResponse<OptionsResponse>>, StatusCode> {
    let selection = query.selection()?;
    let dataset = &state.dataset;

    let days = selection
        .month
        .map(|month| dataset.day_options(month))
        .unwrap_or_default();
    let hours = match (selection.month, selection.day) {
        (Some(month), Some(day)) => dataset.hour_options(month, day),
        _ => Vec::new(),
    };

    Ok(Json(ApiResponse::success(OptionsResponse {
        months: dataset.month_options(),
        days,
        hours,
        sources: vec![SOLAR_LABEL, WIND_LABEL, AGGREGATE_LABEL],
    })))
}

/// GET /api/v1/views/region-totals?month=&day=&hour=&source=
async fn get_region_totals(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<ApiResponse<Vec<RegionTotal>>>, StatusCode> {
    let selection = query.selection()?;
    Ok(Json(ApiResponse::success(
        state.dataset.region_totals(selection),
    )))
}

/// GET /api/v1/views/time-series?month=&day=&hour=&source=
async fn get_time_series(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<ApiResponse<Vec<SeriesPoint>>>, StatusCode> {
    let selection = query.selection()?;
    Ok(Json(ApiResponse::success(
        state.dataset.time_series(selection),
    )))
}

/// GET /api/v1/views/hourly?month=&day=&source=
/// Per-(hour, region) totals, only defined while the hour filter is
/// aggregate.
async fn get_hourly(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<ApiResponse<Vec<HourlyVolume>>>, StatusCode> {
    let selection = query.selection()?;
    match state.dataset.hourly_by_region(selection) {
        Some(rows) => Ok(Json(ApiResponse::success(rows))),
        None => Ok(Json(ApiResponse::error(
            "hourly view requires the hour filter to be aggregate".to_string(),
        ))),
    }
}

use askama::Template;

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    month_options: Vec<SelectorOption>,
    day_options: Vec<SelectorOption>,
    hour_options: Vec<SelectorOption>,
    source_options: Vec<SelectorOption>,
    day_enabled: bool,
    hour_enabled: bool,
    record_count: usize,
    filtered_total: String,
    boundaries_json: String,
    map_data: String,
    map_layout: String,
    line_data: String,
    line_layout: String,
    has_animation: bool,
    anim_data: String,
    anim_layout: String,
    anim_frames: String,
}

struct SelectorOption {
    value: String,
    label: String,
    selected: bool,
}

fn selector_options(concrete: &[u32], selected: Option<u32>) -> Vec<SelectorOption> {
    std::iter::once(SelectorOption {
        value: AGGREGATE_LABEL.to_string(),
        label: AGGREGATE_LABEL.to_string(),
        selected: selected.is_none(),
    })
    .chain(concrete.iter().map(|value| SelectorOption {
        value: value.to_string(),
        label: value.to_string(),
        selected: selected == Some(*value),
    }))
    .collect()
}

fn source_options(selected: SourceSelection) -> Vec<SelectorOption> {
    [
        SourceSelection::Solar,
        SourceSelection::Wind,
        SourceSelection::Aggregate,
    ]
    .into_iter()
    .map(|source| SelectorOption {
        value: source.label().to_string(),
        label: source.label().to_string(),
        selected: source == selected,
    })
    .collect()
}

fn feature_id_key() -> String {
    format!("properties.{FEATURE_NAME_PROPERTY}")
}

/// Build the static choropleth trace and layout from the region totals.
/// The boundary GeoJSON is attached client-side to keep it out of the
/// trace JSON (it is embedded once per page).
fn choropleth_plot(totals: &[RegionTotal]) -> (String, String) {
    let locations: Vec<&str> = totals.iter().map(|t| t.region.as_str()).collect();
    let volumes: Vec<f64> = totals.iter().map(|t| t.volume_mwh).collect();
    let max = volumes.iter().copied().fold(0.0, f64::max);

    let data = json!([{
        "type": "choropleth",
        "locations": locations,
        "z": volumes,
        "featureidkey": feature_id_key(),
        "colorscale": "YlOrRd",
        "zmin": 0.0,
        "zmax": max,
        "colorbar": {"title": {"text": "발전량(MWh)"}}
    }]);

    let layout = json!({
        "title": {"text": "🗺 시도별 발전량 히트맵"},
        "geo": {"fitbounds": "locations", "visible": false},
        "margin": {"t": 50, "b": 10}
    });

    (data.to_string(), layout.to_string())
}

/// Build one line trace per region over time from the time-series view.
fn line_plot(series: &[SeriesPoint]) -> (String, String) {
    let mut by_region: BTreeMap<&str, (Vec<String>, Vec<f64>)> = BTreeMap::new();
    for point in series {
        let (x, y) = by_region.entry(point.region.as_str()).or_default();
        x.push(point.timestamp.format("%Y-%m-%d %H:%M").to_string());
        y.push(point.volume_mwh);
    }

    let traces: Vec<Value> = by_region
        .into_iter()
        .map(|(region, (x, y))| {
            json!({
                "x": x,
                "y": y,
                "name": region,
                "type": "scatter",
                "mode": "lines"
            })
        })
        .collect();

    let layout = json!({
        "title": {"text": "📈 시간대별 시도별 발전량 추이"},
        "xaxis": {"title": {"text": "시간"}, "tickangle": -45},
        "yaxis": {"title": {"text": "발전량(MWh)"}},
        "hovermode": "x unified"
    });

    (Value::Array(traces).to_string(), layout.to_string())
}

/// Build the animated choropleth: one frame per hour, slider plus play and
/// pause buttons, color domain fixed from 0 to the maximum across all
/// frames.
fn animated_choropleth_plot(rows: &[HourlyVolume]) -> (String, String, String) {
    let mut by_hour: BTreeMap<u32, (Vec<&str>, Vec<f64>)> = BTreeMap::new();
    for row in rows {
        let (locations, z) = by_hour.entry(row.hour).or_default();
        locations.push(row.region.as_str());
        z.push(row.volume_mwh);
    }
    let zmax = rows.iter().map(|r| r.volume_mwh).fold(0.0, f64::max);

    let frame_trace = |locations: &[&str], z: &[f64]| {
        json!({
            "type": "choropleth",
            "locations": locations,
            "z": z,
            "featureidkey": feature_id_key(),
            "colorscale": "YlOrRd",
            "zmin": 0.0,
            "zmax": zmax,
            "colorbar": {"title": {"text": "발전량(MWh)"}}
        })
    };

    let frames: Vec<Value> = by_hour
        .iter()
        .map(|(hour, (locations, z))| {
            json!({
                "name": hour.to_string(),
                "data": [frame_trace(locations, z)]
            })
        })
        .collect();

    let steps: Vec<Value> = by_hour
        .keys()
        .map(|hour| {
            json!({
                "label": hour.to_string(),
                "method": "animate",
                "args": [
                    [hour.to_string()],
                    {
                        "mode": "immediate",
                        "frame": {"duration": 500, "redraw": true},
                        "transition": {"duration": 0}
                    }
                ]
            })
        })
        .collect();

    let data = match by_hour.iter().next() {
        Some((_, (locations, z))) => json!([frame_trace(locations, z)]),
        None => json!([]),
    };

    let layout = json!({
        "geo": {"fitbounds": "locations", "visible": false},
        "margin": {"t": 10, "b": 10},
        "sliders": [{
            "currentvalue": {"prefix": "시: "},
            "steps": steps
        }],
        "updatemenus": [{
            "type": "buttons",
            "showactive": false,
            "x": 0.05,
            "y": 1.1,
            "buttons": [
                {
                    "label": "▶ 재생",
                    "method": "animate",
                    "args": [null, {
                        "frame": {"duration": 500, "redraw": true},
                        "fromcurrent": true,
                        "transition": {"duration": 0}
                    }]
                },
                {
                    "label": "⏸ 정지",
                    "method": "animate",
                    "args": [[null], {
                        "mode": "immediate",
                        "frame": {"duration": 0, "redraw": false}
                    }]
                }
            ]
        }]
    });

    (
        data.to_string(),
        layout.to_string(),
        Value::Array(frames).to_string(),
    )
}

/// GET /?month=&day=&hour=&source=
/// The dashboard page. Every filter change resubmits the form, re-running
/// the aggregation pipeline against the loaded dataset.
async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Html<String>, StatusCode> {
    let selection = query.selection()?;
    let dataset = &state.dataset;

    let totals = dataset.region_totals(selection);
    let series = dataset.time_series(selection);
    let hourly = dataset.hourly_by_region(selection);

    let (map_data, map_layout) = choropleth_plot(&totals);
    let (line_data, line_layout) = line_plot(&series);
    let (has_animation, anim_data, anim_layout, anim_frames) = match hourly {
        Some(rows) => {
            let (data, layout, frames) = animated_choropleth_plot(&rows);
            (true, data, layout, frames)
        }
        None => (false, String::new(), String::new(), String::new()),
    };

    let day_options = selection
        .month
        .map(|month| dataset.day_options(month))
        .unwrap_or_default();
    let hour_options = match (selection.month, selection.day) {
        (Some(month), Some(day)) => dataset.hour_options(month, day),
        _ => Vec::new(),
    };

    let template = DashboardTemplate {
        month_options: selector_options(&dataset.month_options(), selection.month),
        day_options: selector_options(&day_options, selection.day),
        hour_options: selector_options(&hour_options, selection.hour),
        source_options: source_options(selection.source),
        day_enabled: selection.month.is_some(),
        hour_enabled: selection.month.is_some() && selection.day.is_some(),
        record_count: dataset.records.len(),
        filtered_total: format!("{:.1}", dataset.filtered_total(selection)),
        boundaries_json: state.boundaries.to_string(),
        map_data,
        map_layout,
        line_data,
        line_layout,
        has_animation,
        anim_data,
        anim_layout,
        anim_frames,
    };

    template.render().map(Html).map_err(|e| {
        eprintln!("Template rendering error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

pub async fn start_server(dataset: Dataset, boundaries: Value, bind: &str) -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let state = AppState {
        dataset: Arc::new(dataset),
        boundaries: Arc::new(boundaries),
    };

    let app = Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health))
        .route("/api/v1/regions", get(list_regions))
        .route("/api/v1/options", get(get_options))
        .route("/api/v1/views/region-totals", get(get_region_totals))
        .route("/api/v1/views/time-series", get(get_time_series))
        .route("/api/v1/views/hourly", get(get_hourly))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    println!("🌞 Dashboard running on http://{bind}");
    println!("\nAvailable endpoints:");
    println!("  GET /");
    println!("  GET /health");
    println!("  GET /api/v1/regions");
    println!("  GET /api/v1/options?month=M&day=D");
    println!("  GET /api/v1/views/region-totals?month=M&day=D&hour=H&source=S");
    println!("  GET /api/v1/views/time-series?month=M&day=D&hour=H&source=S");
    println!("  GET /api/v1/views/hourly?month=M&day=D&source=S");
    println!("\nExamples:");
    println!("  curl 'http://localhost:3047/api/v1/views/region-totals?month=1&source=solar'");

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimension() {
        assert_eq!(parse_dimension(None).unwrap(), None);
        assert_eq!(parse_dimension(Some("")).unwrap(), None);
        assert_eq!(parse_dimension(Some("합계")).unwrap(), None);
        assert_eq!(parse_dimension(Some("all")).unwrap(), None);
        assert_eq!(parse_dimension(Some("7")).unwrap(), Some(7));
        assert!(parse_dimension(Some("January")).is_err());
    }

    #[test]
    fn test_query_selection_normalizes_cascade() {
        let query = FilterQuery {
            month: None,
            day: Some("5".to_string()),
            hour: Some("3".to_string()),
            source: Some("풍력".to_string()),
        };
        let selection = query.selection().unwrap();
        assert_eq!(selection.month, None);
        assert_eq!(selection.day, None);
        assert_eq!(selection.hour, None);
        assert_eq!(selection.source, SourceSelection::Wind);

        let bad = FilterQuery {
            source: Some("원자력".to_string()),
            ..FilterQuery::default()
        };
        assert_eq!(bad.selection().unwrap_err(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_choropleth_color_domain_is_anchored_at_zero() {
        let totals = vec![
            RegionTotal {
                region: "서울특별시".to_string(),
                volume_mwh: 12.0,
            },
            RegionTotal {
                region: "제주특별자치도".to_string(),
                volume_mwh: 30.0,
            },
        ];
        let (data, _) = choropleth_plot(&totals);
        let data: Value = serde_json::from_str(&data).unwrap();
        assert_eq!(data[0]["zmin"], 0.0);
        assert_eq!(data[0]["zmax"], 30.0);
        assert_eq!(data[0]["featureidkey"], "properties.CTP_KOR_NM");
    }

    #[test]
    fn test_animation_frames_share_one_color_domain() {
        let rows = vec![
            HourlyVolume {
                hour: 0,
                region: "서울특별시".to_string(),
                volume_mwh: 1.0,
            },
            HourlyVolume {
                hour: 13,
                region: "서울특별시".to_string(),
                volume_mwh: 250.0,
            },
        ];
        let (data, layout, frames) = animated_choropleth_plot(&rows);
        let frames: Value = serde_json::from_str(&frames).unwrap();
        assert_eq!(frames.as_array().unwrap().len(), 2);
        for frame in frames.as_array().unwrap() {
            assert_eq!(frame["data"][0]["zmax"], 250.0);
        }

        let data: Value = serde_json::from_str(&data).unwrap();
        assert_eq!(data[0]["z"][0], 1.0);

        let layout: Value = serde_json::from_str(&layout).unwrap();
        assert_eq!(layout["sliders"][0]["steps"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_line_plot_one_trace_per_region() {
        let timestamp = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let series = vec![
            SeriesPoint {
                timestamp,
                region: "서울특별시".to_string(),
                volume_mwh: 1.0,
            },
            SeriesPoint {
                timestamp,
                region: "제주특별자치도".to_string(),
                volume_mwh: 2.0,
            },
        ];
        let (data, _) = line_plot(&series);
        let data: Value = serde_json::from_str(&data).unwrap();
        assert_eq!(data.as_array().unwrap().len(), 2);
        assert_eq!(data[0]["name"], "서울특별시");
        assert_eq!(data[0]["x"][0], "2024-01-01 00:00");
    }
}
