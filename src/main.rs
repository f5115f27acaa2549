use std::{path::PathBuf, process::exit, thread::scope};

use clap::{AppSettings, Parser};
use crossbeam_channel::bounded;
use crossbeam_utils::atomic::AtomicCell;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::Itertools;
use log::{debug, error, info};

use dkist::{load_datasets, Dataset, LoadedDataset, Sel, Selection};

#[derive(Parser)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_long_args = true)]
struct Args {
    /// A dataset metadata file, or a directory containing metadata files.
    dataset: PathBuf,

    /// List every frame file belonging to each dataset.
    #[clap(short, long)]
    files: bool,

    /// Read every frame and report frames that are missing or contain NaNs.
    #[clap(long)]
    verify: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    verbosity: u8,

    /// Disable progress bars.
    #[clap(long)]
    no_progress_bars: bool,
}

fn main() {
    let args = Args::parse();
    setup_logging(args.verbosity);

    let loaded = match load_datasets(&args.dataset) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Couldn't load {}: {e}", args.dataset.display());
            exit(1);
        }
    };
    info!(
        "Loaded {} dataset(s) from {}",
        loaded.len(),
        args.dataset.display()
    );

    let mut failed = false;
    for dataset in loaded.iter() {
        match dataset {
            LoadedDataset::Single(ds) => println!("{ds}"),
            LoadedDataset::Tiled(td) => println!("{td}"),
        }
        for ds in dataset.datasets() {
            if args.files {
                for name in ds.files().filenames() {
                    println!("{name}");
                }
            }
            if args.verify {
                failed |= !verify_dataset(ds, args.no_progress_bars);
            }
        }
    }
    if failed {
        exit(1);
    }
}

/// Read every frame of the dataset one at a time, counting NaNs. Returns
/// false if any frame failed to read.
fn verify_dataset(ds: &Dataset, no_progress_bars: bool) -> bool {
    let lazy = ds.data();
    let stripe_shape = lazy.stripe_shape();
    let num_frames = lazy.num_frames();

    let (tx, rx) = bounded(5);
    let read_failed = AtomicCell::new(false);
    let progress = ProgressBar::with_draw_target(
        Some(num_frames as _),
        if no_progress_bars {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stdout()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg:17}: [{wide_bar:.blue}] {pos:5}/{len:5} frames ({elapsed_precise}<{eta_precise})")
            .unwrap()
            .progress_chars("=> "),
    )
    .with_position(0)
    .with_message("Verifying");
    progress.tick();

    let read_failed = &read_failed;
    let progress = &progress;
    let reader_lazy = lazy.clone();
    scope(|s| {
        s.spawn(move || {
            for index in frame_indices(&stripe_shape) {
                debug!("Reading frame {index:?}");
                let key = Selection::new(index.iter().map(|&i| Sel::At(i)).collect());
                let frame = reader_lazy
                    .slice(key)
                    .expect("frame indices come from the stripe shape");
                match frame.compute() {
                    Ok(array) => {
                        if tx.send((index, array)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        error!("Frame {index:?} failed to read: {e}");
                        read_failed.store(true);
                        return;
                    }
                }
            }
        });

        s.spawn(move || {
            let mut nan_frames = 0;
            for (index, array) in rx.iter() {
                let nans = array.iter().filter(|v| v.is_nan()).count();
                if nans > 0 {
                    debug!("Frame {index:?} contains {nans} NaNs");
                    nan_frames += 1;
                }
                progress.inc(1);
            }
            progress.finish();
            if nan_frames > 0 {
                info!("{nan_frames}/{num_frames} frames contain NaNs");
            } else {
                info!("No NaNs in any of the {num_frames} frames");
            }
        });
    });

    !read_failed.load()
}

/// Every stripe cell index in grid order. A 0-d stripe has exactly one cell
/// reached by the empty subscript.
fn frame_indices(stripe_shape: &[usize]) -> Vec<Vec<usize>> {
    if stripe_shape.is_empty() {
        return vec![vec![]];
    }
    stripe_shape
        .iter()
        .map(|&len| 0..len)
        .multi_cartesian_product()
        .collect()
}

fn setup_logging(verbosity: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.init();
}
