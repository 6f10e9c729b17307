//! Contains structures and functionality for the binary
use std::path::PathBuf;

use clap::ArgAction;
use rulezip::config::{
    MiningConfig, DEFAULT_BEAM_WIDTH, DEFAULT_MAX_BODY_ATOMS, DEFAULT_MIN_CONSTANT_COVERAGE,
    DEFAULT_MIN_FACT_COVERAGE, DEFAULT_STOP_COMPRESSION_RATIO,
};
use rulezip::eval::EvalMetric;

/// Possible settings for the scoring-metric option.
#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub(crate) enum Metric {
    /// Positive entailments per stored unit.
    Ratio,
    /// Net facts saved by the rule.
    #[default]
    Capacity,
    /// Cumulative information gain along the refinement history.
    InfoGain,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Ratio => f.write_str("ratio"),
            Metric::Capacity => f.write_str("capacity"),
            Metric::InfoGain => f.write_str("info-gain"),
        }
    }
}

impl From<Metric> for EvalMetric {
    fn from(val: Metric) -> Self {
        match val {
            Metric::Ratio => EvalMetric::CompressionRatio,
            Metric::Capacity => EvalMetric::CompressionCapacity,
            Metric::InfoGain => EvalMetric::InfoGain,
        }
    }
}

/// Verbosity options controlling the global logger.
#[derive(clap::Args, Debug)]
pub(crate) struct LoggingArgs {
    /// Print more detailed logs; may be repeated (-vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, group = "verbosity")]
    verbose: u8,
    /// Print errors only
    #[arg(short, long, group = "verbosity")]
    quiet: bool,
    /// Pick the log level directly
    #[arg(long = "log", value_parser=clap::builder::PossibleValuesParser::new(["error", "warn", "info", "debug", "trace"]), group = "verbosity")]
    log_level: Option<String>,
}

impl LoggingArgs {
    /// Builds the global logger from the verbosity options.
    ///
    /// An explicit `--log` level wins; otherwise `-q` selects errors only
    /// and each `-v` raises the level one step (info, debug, trace). The
    /// `RZP_LOG` environment variable applies when no flag is given, and
    /// the fallback level is warn.
    pub(crate) fn initialize_logging(&self) {
        let mut builder = env_logger::Builder::new();

        builder.filter_level(log::LevelFilter::Warn);
        builder.parse_env("RZP_LOG");
        if let Some(ref level) = self.log_level {
            builder.parse_filters(level);
        } else if self.quiet {
            builder.filter_level(log::LevelFilter::Error);
        } else if self.verbose > 0 {
            builder.filter_level(match self.verbose {
                1 => log::LevelFilter::Info,
                2 => log::LevelFilter::Debug,
                3 => log::LevelFilter::Trace,
                _ => log::LevelFilter::Warn,
            });
        }
        builder.init();
    }
}

/// Rulezip CLI
#[derive(clap::Parser, Debug)]
#[command(author, version, about)]
pub struct CliApp {
    /// Directory holding one relation file (.tsv or .csv) per relation
    #[arg(value_parser, required = true)]
    pub(crate) input: PathBuf,
    /// File to write the compression report to; stdout when omitted
    #[arg(short, long = "output")]
    pub(crate) output: Option<PathBuf>,
    /// Relation to compress; can be given multiple times, all relations when omitted
    #[arg(short, long = "target", action = ArgAction::Append)]
    pub(crate) targets: Vec<String>,
    /// Number of rules kept per beam level
    #[arg(long = "beam-width", default_value_t = DEFAULT_BEAM_WIDTH)]
    pub(crate) beam_width: usize,
    /// Minimum fraction of a target relation a candidate rule must cover
    #[arg(long = "fact-coverage", default_value_t = DEFAULT_MIN_FACT_COVERAGE)]
    pub(crate) min_fact_coverage: f64,
    /// Minimum fraction of a column a constant must occupy to be bound by rules
    #[arg(long = "constant-coverage", default_value_t = DEFAULT_MIN_CONSTANT_COVERAGE)]
    pub(crate) min_constant_coverage: f64,
    /// Compression ratio at which a candidate is accepted without further search
    #[arg(long = "stop-ratio", default_value_t = DEFAULT_STOP_COMPRESSION_RATIO)]
    pub(crate) stop_compression_ratio: f64,
    /// Upper bound on the number of body atoms per rule
    #[arg(long = "max-body-atoms", default_value_t = DEFAULT_MAX_BODY_ATOMS)]
    pub(crate) max_body_atoms: usize,
    /// Metric used to score candidate rules
    #[arg(short, long = "metric", value_enum, default_value_t)]
    pub(crate) metric: Metric,
    /// Check that the result reconstructs the input exactly
    #[arg(long = "validate")]
    pub(crate) validate: bool,
    /// Stop gracefully once this file exists
    #[arg(long = "stop-file")]
    pub(crate) stop_file: Option<PathBuf>,
    /// Logging verbosity options
    #[command(flatten)]
    pub(crate) logging: LoggingArgs,
}

impl CliApp {
    /// Assembles the mining parameters from the command line.
    pub(crate) fn mining_config(&self) -> MiningConfig {
        MiningConfig {
            beam_width: self.beam_width,
            min_fact_coverage: self.min_fact_coverage,
            min_constant_coverage: self.min_constant_coverage,
            stop_compression_ratio: self.stop_compression_ratio,
            max_body_atoms: self.max_body_atoms,
            metric: self.metric.into(),
            targets: self.targets.clone(),
        }
    }
}
