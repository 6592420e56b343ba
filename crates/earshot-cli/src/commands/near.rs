use crate::cli::NearArgs;
use crate::output::OutputWriter;
use crate::output_types::NearbyFeatureRow;
use anyhow::{Context, Result};
use earshot_core::config::LayeredConfig;
use earshot_core::models::Coordinate;
use earshot_tiles::{FileTileTransport, TileGridCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

pub async fn execute(args: NearArgs, config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let settings = config.resolve().context("Invalid configuration")?;
    let location = Coordinate::new(args.lon, args.lat);
    if !location.is_finite() {
        anyhow::bail!("Location {} is not a valid coordinate", location);
    }

    let transport = FileTileTransport::new(&args.tiles);
    let zoom = settings.grid.zoom_level;
    let grid = TileGridCache::new(settings.grid, Arc::new(transport), Handle::current())?
        .with_ruler(settings.ruler);

    let summary = grid.recompute(&location, zoom);
    output.info(format!("Loading {} tiles around {}", summary.targets, location));

    if tokio::time::timeout(Duration::from_secs(args.timeout), grid.settled()).await.is_err() {
        output.warning(format!(
            "Gave up waiting after {}s, {} tiles still loading",
            args.timeout,
            grid.pending_count()
        ));
    }

    let kinds = (!args.kinds.is_empty()).then_some(args.kinds.as_slice());
    let nearest = grid.nearest_features(&location, args.radius, args.limit.unwrap_or(usize::MAX), kinds);
    debug!(decoded = grid.decoded_tiles().len(), features = nearest.len(), "Grid queried");

    let rows: Vec<NearbyFeatureRow> =
        nearest.iter().map(|hit| NearbyFeatureRow::new(&hit.feature, &hit.nearest)).collect();

    output.info(format!("{} features within {}m", rows.len(), args.radius));
    output.table(rows)
}
