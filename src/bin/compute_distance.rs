//! Distance of every pose of a ground truth trajectory to one reference pose.
//!
//! # Usage
//!
//! ```bash
//! compute_distance poses/05.txt dist05
//! compute_distance poses/05.txt dist05 --reference 0 --strict
//! ```
//!
//! Writes `<output_name>.dat` with a `#frame dist` header and one
//! `<index> <distance>` row per pose.

use clap::Parser;
use std::path::PathBuf;

use bowtest::{
    output::{dat_path, write_table},
    pose::{load_poses, trajectory_distances, DEFAULT_REFERENCE},
    BowResult, ParsePolicy,
};

/// Compute the distance of every ground truth pose to a reference pose
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ground truth trajectory, 12 values of a 3x4 pose per record
    ground_truth: PathBuf,

    /// Output name, results go to <output_name>.dat
    output_name: String,

    /// Index of the pose every other pose is compared with
    #[arg(short, long, default_value_t = DEFAULT_REFERENCE)]
    reference: usize,

    /// Fail on malformed lines instead of skipping them
    #[arg(long)]
    strict: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => {
            // --help and --version
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

fn run(args: &Args) -> BowResult<()> {
    let policy = if args.strict {
        ParsePolicy::Strict
    } else {
        ParsePolicy::Lenient
    };
    let poses = load_poses(&args.ground_truth, policy)?;
    let dist = trajectory_distances(&poses, args.reference)?;
    write_table(
        dat_path(&args.output_name),
        "frame dist",
        dist.iter().map(|d| (d.frame, d.distance)),
    )?;
    Ok(())
}
