use crate::cli::WalkArgs;
use crate::output::OutputWriter;
use crate::output_types::CalloutRow;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use earshot_callouts::CalloutHistory;
use earshot_core::config::LayeredConfig;
use earshot_core::models::{Coordinate, FeatureKind, TrackedCallout};
use earshot_tiles::{FileTileTransport, TileGridCache};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

/// Kinds worth announcing while walking
const ANNOUNCED_KINDS: &[FeatureKind] = &[FeatureKind::Poi, FeatureKind::TransitStop];

pub async fn execute(args: WalkArgs, config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let settings = config.resolve().context("Invalid configuration")?;
    let track = read_track(&args.track)?;
    if track.is_empty() {
        bail!("Track {} has no points", args.track.display());
    }

    let zoom = settings.grid.zoom_level;
    let grid = TileGridCache::new(
        settings.grid,
        Arc::new(FileTileTransport::new(&args.tiles)),
        Handle::current(),
    )?
    .with_ruler(settings.ruler);
    let mut history = CalloutHistory::new(settings.history, settings.ruler)?;

    let start = Utc::now();
    let mut callouts = Vec::new();

    for (index, location) in track.iter().enumerate() {
        let now = step_time(start, args.step_secs, index)?;

        grid.recompute(location, zoom);
        if tokio::time::timeout(Duration::from_secs(args.timeout), grid.settled()).await.is_err() {
            output.warning(format!("Step {}: tiles still loading, continuing", index + 1));
        }

        history.trim_at(location, now);

        let nearby = grid.nearest_features(location, args.radius, usize::MAX, Some(ANNOUNCED_KINDS));
        debug!(step = index + 1, %location, nearby = nearby.len(), retained = history.size(), "Walk step");

        // Nearest first
        let candidates = nearby.into_iter().filter_map(|hit| {
            let name = hit.feature.name()?.to_string();
            let anchor = hit.feature.center()?;
            Some((name, anchor, hit.nearest))
        });

        for (name, anchor, nearest) in candidates {
            if history.check_and_add(TrackedCallout::at(name.clone(), anchor, now)) {
                callouts.push(CalloutRow {
                    step: index + 1,
                    text: name,
                    distance_m: nearest.distance,
                    bearing: nearest.bearing,
                    longitude: anchor.longitude,
                    latitude: anchor.latitude,
                });
            }
        }
    }

    output.info(format!("{} callouts over {} track points", callouts.len(), track.len()));
    output.table(callouts)
}

/// Simulated clock for the `index`th track point
fn step_time(start: DateTime<Utc>, step_secs: u64, index: usize) -> Result<DateTime<Utc>> {
    let offset = i64::try_from(step_secs)
        .ok()
        .zip(i64::try_from(index).ok())
        .and_then(|(step, index)| step.checked_mul(index))
        .and_then(TimeDelta::try_seconds);
    let Some(offset) = offset else {
        bail!("Step {} at {}s per step overflows the simulated clock", index + 1, step_secs);
    };
    start
        .checked_add_signed(offset)
        .with_context(|| format!("Step {} at {}s per step overflows the simulated clock", index + 1, step_secs))
}

/// Read `lon,lat` lines. Blank lines and `#` comments are skipped.
fn read_track(path: &Path) -> Result<Vec<Coordinate>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read track {}", path.display()))?;
    parse_track(&content)
}

fn parse_track(content: &str) -> Result<Vec<Coordinate>> {
    let mut points = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((lon, lat)) = line.split_once(',') else {
            bail!("Line {}: expected 'lon,lat', got '{}'", number + 1, line);
        };
        let lon: f64 = lon.trim().parse().with_context(|| format!("Line {}: bad longitude", number + 1))?;
        let lat: f64 = lat.trim().parse().with_context(|| format!("Line {}: bad latitude", number + 1))?;
        points.push(Coordinate::new(lon, lat));
    }
    Ok(points)
}
