//! Vocabulary and database test harness.
//!
//! # Usage
//!
//! ```bash
//! # ORB features extracted from <folder>/NNNNNN.png, diagnostics on the console
//! test_voc ORBvoc.txt sequences/05/image_0 orb
//!
//! # CNN descriptors from a binary file, matches of frame 70 written to cnn05.dat
//! test_voc cnn_voc.txt descriptors05.bin cnn cnn05
//! ```

use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};

use bowtest::{
    harness::{self, VocFormat},
    output::dat_path,
    BowResult, Cnn, EmptyFrames, FeatureKind, FeatureType, HarnessConfig, Orb, ParsePolicy,
};

/// Test a visual vocabulary and an image database on a sequence
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Vocabulary file
    vocabulary: PathBuf,

    /// Image folder (orb) or binary descriptor file (orb, cnn)
    descriptors: PathBuf,

    /// Feature type: orb or cnn
    feature_type: FeatureType,

    /// Output name, matches of the matching image go to <output_name>.dat
    output_name: Option<String>,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frame queried when an output name is given
    #[arg(short, long)]
    matching_image: Option<usize>,

    /// Fail on truncated descriptor records
    #[arg(long, conflicts_with = "lenient")]
    strict: bool,

    /// Ignore a truncated descriptor record and stop reading
    #[arg(long)]
    lenient: bool,

    /// Keep frames without features as empty entries
    #[arg(long)]
    keep_empty_frames: bool,

    /// Vocabulary format: text or bincode
    #[arg(long, default_value = "text")]
    voc_format: VocFormat,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => {
            print!("{}", e);
            return;
        }
        Err(e) => {
            eprint!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> BowResult<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(i) = args.matching_image {
        config.matching_image = i;
    }
    if args.strict {
        config.descriptors.policy = ParsePolicy::Strict;
    }
    if args.lenient {
        config.descriptors.policy = ParsePolicy::Lenient;
    }
    if args.keep_empty_frames {
        config.descriptors.empty_frames = EmptyFrames::Keep;
    }
    Ok(config)
}

fn run(args: &Args) -> BowResult<()> {
    let config = load_config(args)?;
    let output = args.output_name.as_deref().map(dat_path);

    match args.feature_type {
        FeatureType::Orb => {
            let frames = harness::load_orb_frames(&args.descriptors, &config)?;
            evaluate::<Orb>(args, &frames, &config, output.as_deref())
        }
        FeatureType::Cnn => {
            let frames = harness::load_cnn_frames(&args.descriptors, &config)?;
            evaluate::<Cnn>(args, &frames, &config, output.as_deref())
        }
    }
}

fn evaluate<F: FeatureKind>(
    args: &Args,
    frames: &[Vec<F::Descriptor>],
    config: &HarnessConfig,
    output: Option<&Path>,
) -> BowResult<()> {
    println!("Loaded {} features", frames.len());
    let voc = harness::load_vocabulary::<F>(&args.vocabulary, args.voc_format)?;
    info!("Testing vocabulary");
    harness::run(&voc, frames, config, output)
}
