//! CLI definition for the `ovlx` overlapper.
//!
//! The real knobs live in `cfg.rs` as typed config structs; the CLI exposes
//! either a preset (`-x ava|map`) or explicit overrides, with explicit flags
//! taking precedence over the preset.

use clap::{builder::PossibleValue, value_parser, Arg, ArgAction, ArgMatches, Command, ValueEnum};
use std::path::PathBuf;

use crate::cfg::Preset;

/// Build and parse the command line, returning clap's `ArgMatches`.
pub fn build_cli() -> ArgMatches {
    command().get_matches()
}

fn command() -> Command {
    Command::new("ovlx")
        .version(clap::crate_version!())
        .about("Find overlaps between long noisy reads with a minimizer index")
        .arg(
            Arg::new("target")
                .help("Target FASTA/FASTQ(.gz) file to index")
                .value_parser(value_parser!(PathBuf))
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("sequences")
                .help("Query FASTA/FASTQ(.gz) file; omit (or repeat the target) for all-vs-all")
                .value_parser(value_parser!(PathBuf))
                .index(2),
        )
        .arg(
            Arg::new("k")
                .help("Length of minimizers [default: 15]")
                .short('k')
                .long("kmer-length")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("w")
                .help("Length of the sliding window minimizers are found in [default: 5]")
                .short('w')
                .long("window-length")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("frequency")
                .help("Threshold for ignoring the most frequent minimizers")
                .short('f')
                .long("frequency-threshold")
                .default_value("0.001")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("micromize")
                .help("Use only a portion of all minimizers per query")
                .short('M')
                .long("micromize")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("m")
                .help("Discard chains with score lower than this [default: 100]")
                .short('m')
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("g")
                .help("Stop chain elongation on seed-free gaps longer than this many bases [default: 10000]")
                .short('g')
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("n")
                .help("Discard chains with fewer minimizers than this [default: 4]")
                .short('n')
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("preset")
                .help("Preset options, applied before explicit overrides")
                .short('x')
                .long("preset-options")
                .value_parser(value_parser!(Preset)),
        )
        .arg(
            Arg::new("threads")
                .help("Number of worker threads")
                .short('t')
                .long("threads")
                .default_value("1")
                .value_parser(value_parser!(usize)),
        )
}

impl ValueEnum for Preset {
    fn value_variants<'a>() -> &'a [Self] {
        &[Preset::Ava, Preset::Map]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(match self {
            Preset::Ava => {
                PossibleValue::new("ava").help("All-vs-all overlapping (-k19 -w5 -m100 -g10000 -n4)")
            }
            Preset::Map => {
                PossibleValue::new("map").help("Read-to-reference mapping (-k19 -w10 -m40 -g5000 -n3)")
            }
        })
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.to_possible_value()
            .expect("no values are skipped")
            .get_name()
            .fmt(f)
    }
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for variant in Self::value_variants() {
            if variant.to_possible_value().unwrap().matches(s, false) {
                return Ok(*variant);
            }
        }
        Err(format!("invalid preset: {s}"))
    }
}
