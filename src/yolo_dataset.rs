use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::PrepareArgs;
use crate::conversion::{output_file_name, process_entry};
use crate::error::Result;
use crate::io::{create_dataset_yaml, setup_output_directories};
use crate::schema::ClassSchema;
use crate::types::{OutputDirs, ProcessingStats, Split, SplitData, ViaImage};
use crate::utils::create_progress_bar;
use crate::via::read_via_export;

/// Shuffle the entries with a seeded RNG and cut them at `floor(len * split_ratio)`:
/// the head is the train split, the tail the validation split.
pub fn split_entries(
    mut entries: Vec<(String, ViaImage)>,
    split_ratio: f64,
    seed: u64,
) -> SplitData {
    let mut rng = StdRng::seed_from_u64(seed);
    entries.shuffle(&mut rng);

    let split_idx = ((entries.len() as f64 * split_ratio).floor() as usize).min(entries.len());
    let val_entries = entries.split_off(split_idx);

    SplitData {
        train_entries: entries,
        val_entries,
    }
}

/// Keep only the last entry for each output file name, in split order.
///
/// Entries that would write the same image and label files are reduced to the
/// one a sequential run would leave behind, so parallel workers never share
/// an output path.
pub fn dedup_by_output_name(entries: &[(String, ViaImage)]) -> Vec<&(String, ViaImage)> {
    let last_index: HashMap<String, usize> = entries
        .iter()
        .enumerate()
        .map(|(idx, (filename, _))| (output_file_name(filename), idx))
        .collect();

    entries
        .iter()
        .enumerate()
        .filter(|(idx, (filename, _))| {
            let keep = last_index.get(&output_file_name(filename)) == Some(idx);
            if !keep {
                warn!(
                    "Entry {} is superseded by a later entry with the same file name",
                    filename
                );
            }
            keep
        })
        .map(|(_, entry)| entry)
        .collect()
}

/// Convert every entry of one split in parallel and return the merged statistics
pub fn process_split(
    entries: &[(String, ViaImage)],
    split: Split,
    source_dir: &Path,
    output_dirs: &OutputDirs,
    schema: &ClassSchema,
) -> ProcessingStats {
    let label = match split {
        Split::Train => "Train",
        Split::Val => "Val",
    };
    info!("Processing {} {} entries", entries.len(), split);
    let unique_entries = dedup_by_output_name(entries);
    let duplicates = entries.len() - unique_entries.len();
    let pb = create_progress_bar(unique_entries.len() as u64, label);

    let stats = unique_entries
        .par_iter()
        .map(|(filename, entry)| {
            let stats = process_entry(filename, entry, split, source_dir, output_dirs, schema)
                .unwrap_or_else(|e| {
                    error!("Failed to process {}: {}", filename, e);
                    ProcessingStats {
                        total_entries: 1,
                        failed_entries: 1,
                        ..ProcessingStats::default()
                    }
                });
            pb.inc(1);
            stats
        })
        .reduce(ProcessingStats::new, ProcessingStats::merge)
        .merge(ProcessingStats {
            total_entries: duplicates,
            skipped_duplicate_entry: duplicates,
            ..ProcessingStats::default()
        });

    pb.finish_with_message(format!("{} processing complete", label));
    stats
}

/// Main dataset processing pipeline: read the export, split it, write the
/// images and labels of both splits and emit the dataset yaml.
///
/// Returns the path of the dataset yaml.
pub fn process_dataset(args: &PrepareArgs, schema: &ClassSchema) -> Result<PathBuf> {
    info!("Loading annotations from: {}", args.annotations.display());
    let entries = read_via_export(&args.annotations)?;
    info!("Found {} image entries", entries.len());

    let output_dirs = setup_output_directories(&args.dataset_dir)?;

    let split_data = split_entries(entries, args.split_ratio, args.seed);
    info!(
        "Split with seed {}: {} train, {} val",
        args.seed,
        split_data.train_entries.len(),
        split_data.val_entries.len()
    );

    let stats = [Split::Train, Split::Val]
        .into_iter()
        .map(|split| {
            process_split(
                split_data.entries(split),
                split,
                &args.images_dir,
                &output_dirs,
                schema,
            )
        })
        .fold(ProcessingStats::new(), ProcessingStats::merge);
    stats.print_summary();

    info!("Creating dataset yaml file...");
    let yaml_path = create_dataset_yaml(&output_dirs, schema)?;
    info!("Dataset written to {}", output_dirs.dataset_dir.display());

    Ok(yaml_path)
}
