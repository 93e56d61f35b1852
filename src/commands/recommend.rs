//! Recommend command implementation

use anyhow::{Context, Result};
use chrono::Utc;
use reversion_reco::optimizer::Optimizer;
use reversion_reco::store::BarStore;
use reversion_reco::{Recommender, Side, Timeframe};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub fn run(config_path: Option<&Path>, side: String, risk_pct: Option<f64>, tf: Option<String>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let focus_tf = tf.as_deref().map(str::parse::<Timeframe>).transpose()?;

    let store: Arc<dyn BarStore> = Arc::new(super::open_store(&config, None)?);
    let optimizer = Arc::new(Optimizer::from_config(store, &config)?);
    let recommender = Recommender::new(optimizer, config.recommend.clone());

    let now = Utc::now().timestamp();
    let response = if side.trim().eq_ignore_ascii_case("auto") {
        recommender.recommend_auto(risk_pct, focus_tf, now)?
    } else {
        let side: Side = side.parse()?;
        recommender.recommend_at(side, risk_pct, focus_tf, now)?
    };
    info!("Recommendation ok={} side={}", response.ok, response.side);

    let json = serde_json::to_string_pretty(&response).context("Failed to serialize recommendation")?;
    println!("{}", json);
    Ok(())
}
