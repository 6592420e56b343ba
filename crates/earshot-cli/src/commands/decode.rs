use crate::cli::DecodeArgs;
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use earshot_core::interchange::to_feature_collection;
use earshot_mvt::decode_tile;
use std::fs;

pub fn execute(args: DecodeArgs, output: &OutputWriter) -> Result<()> {
    let bytes = fs::read(&args.path)
        .with_context(|| format!("Failed to read tile {}", args.path.display()))?;

    let features = decode_tile(&bytes, args.tile)
        .with_context(|| format!("Failed to decode {} as tile {}", args.path.display(), args.tile))?;
    let decoded = features.len();

    let features = if args.kinds.is_empty() {
        features
    } else {
        features.filter_kinds(&args.kinds)
    };

    output.info(format!("Decoded {} features, kept {}", decoded, features.len()));
    output.data(&to_feature_collection(&features))
}
