mod kpx;
mod server;

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::kpx::analysis::{Selection, SourceSelection};
use crate::kpx::boundaries;

const DEFAULT_DATA_CSV: &str = "한국전력거래소_지역별 시간별 태양광 및 풍력 발전량_20241231.csv";
const DEFAULT_GEOJSON: &str = "korea_sido_boundaries.geojson";
const DEFAULT_BIND: &str = "0.0.0.0:3047";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let data_path = PathBuf::from(env_or("HAEBARAM_DATA_CSV", DEFAULT_DATA_CSV));
    let geojson_path = PathBuf::from(env_or("HAEBARAM_GEOJSON", DEFAULT_GEOJSON));
    let bind = env_or("HAEBARAM_BIND", DEFAULT_BIND);

    // Both inputs are loaded exactly once; a failure here aborts startup.
    let dataset = kpx::load_dataset(&data_path, encoding_rs::EUC_KR)
        .with_context(|| format!("loading dataset from {}", data_path.display()))?;
    let boundary_doc = boundaries::load_boundaries(&geojson_path)
        .with_context(|| format!("loading boundaries from {}", geojson_path.display()))?;

    println!("=== 2024 시도별 재생에너지 발전량 ===\n");
    println!("Records:    {}", dataset.records.len());
    println!("Regions:    {}", dataset.regions.len());
    println!("Boundaries: {} features", boundaries::feature_count(&boundary_doc));

    let first = dataset.records.iter().map(|r| r.timestamp).min();
    let last = dataset.records.iter().map(|r| r.timestamp).max();
    if let (Some(first), Some(last)) = (first, last) {
        println!(
            "Period:     {} – {}",
            first.format("%Y-%m-%d %H:%M"),
            last.format("%Y-%m-%d %H:%M")
        );
    }

    for source in [SourceSelection::Solar, SourceSelection::Wind] {
        let total = dataset.filtered_total(Selection {
            source,
            ..Selection::default()
        });
        println!("  {}: {:.1} MWh", source.label(), total);
    }
    println!();

    server::start_server(dataset, boundary_doc, &bind).await
}
