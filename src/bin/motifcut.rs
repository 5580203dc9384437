use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use motifcut::alignment::{Aligner, CommandAligner, PrecomputedAligner};
use motifcut::pipeline::{self, OutputLayout};
use motifcut::report::LogReporter;
use motifcut::{CascadeConfig, CoarseStrip, MotifCascade, StatsAggregator};
use polars::prelude::*;

/// motifcut CLI
#[derive(Parser)]
#[command(name = "motifcut")]
#[command(version)]
#[command(about = "Restriction-motif read cascade and alignment multiplicity", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Threads (0 = all cores)
    #[arg(long, default_value_t = 0, global = true)]
    threads: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in restriction enzymes
    Enzymes,

    /// Coarse strip + motif cascade on FASTQ files
    Cascade {
        /// Input files (FASTQ/FASTQ.GZ)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        cascade: CascadeArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Split alignment files into unmapped/unique/double/triple buckets
    Multiplicity {
        /// Input files (SAM/BAM, or `id<TAB>flag` lines); records of one read must be contiguous
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Cascade, align edge and inner reads, then classify multiplicity
    Run {
        /// Input files (FASTQ/FASTQ.GZ)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        cascade: CascadeArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Reference passed to the aligner as {reference}
        #[arg(long, required_unless_present = "alignment")]
        reference: Option<PathBuf>,
        /// Aligner command, e.g. "bowtie2 -x {reference} -U {reads} -S {output}"
        #[arg(long, conflicts_with = "alignment")]
        aligner_cmd: Option<String>,
        /// Use an existing SAM/BAM instead of running an aligner (one input only)
        #[arg(long)]
        alignment: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CascadeArgs {
    /// 5' adapter the cascade counts down from
    #[arg(long, default_value = "GCTCTTCCGATCT")]
    adapter5: String,
    /// 3' adapter the cascade counts down from
    #[arg(long, default_value = "AGATCGGAAGAGC")]
    adapter3: String,
    /// Motif as a sequence or an enzyme name (see `motifcut enzymes`)
    #[arg(long, default_value = "CATG")]
    motif: String,
    /// Cascade error rate
    #[arg(long, default_value_t = 0.01)]
    error_rate: f64,
    /// Coarse 3' adapter (default: --adapter3)
    #[arg(long)]
    coarse_adapter: Option<String>,
    /// Coarse strip minimum overlap
    #[arg(long, default_value_t = 12)]
    coarse_overlap: usize,
    /// Coarse strip error rate
    #[arg(long, default_value_t = 0.1)]
    coarse_error_rate: f64,
    /// Minimum read length after the coarse strip (inclusive)
    #[arg(long, default_value_t = 9)]
    min_length: usize,
}

impl CascadeArgs {
    fn config(&self) -> anyhow::Result<CascadeConfig> {
        let motif = motifcut::resolve_motif(&self.motif)?;
        let coarse_adapter = self.coarse_adapter.as_deref().unwrap_or(&self.adapter3);
        let coarse = CoarseStrip {
            min_overlap: self.coarse_overlap,
            error_rate: self.coarse_error_rate,
            min_length: self.min_length,
            ..CoarseStrip::new(coarse_adapter.as_bytes())
        };
        let mut cfg = CascadeConfig::new(self.adapter5.as_bytes(), self.adapter3.as_bytes(), &motif).with_coarse(coarse);
        cfg.error_rate = self.error_rate;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Args)]
struct OutputArgs {
    /// Output directory (default: next to each input)
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Write all stage counters to this CSV
    #[arg(long)]
    stats_csv: Option<PathBuf>,
    /// Print the stage counters of each file as a table
    #[arg(long)]
    table: bool,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    let threads = if cli.threads == 0 { num_cpus::get() } else { cli.threads };
    rayon::ThreadPoolBuilder::new().num_threads(threads).build_global().ok();
    log::debug!("using {threads} threads");

    if let Err(e) = dispatch(cli.command) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

fn dispatch(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Enzymes => cmd_enzymes(),
        Commands::Cascade { files, cascade, output } => {
            let cascade = MotifCascade::new(cascade.config()?)?;
            for_each_file(&files, &output, |input, layout, stats| {
                pipeline::run_cascade_file(input, &cascade, layout, stats).map(|_| ())
            })
        }
        Commands::Multiplicity { files, output } => for_each_file(&files, &output, |input, layout, stats| {
            pipeline::run_multiplicity_file(input, layout, stats).map(|_| ())
        }),
        Commands::Run { files, cascade, output, reference, aligner_cmd, alignment } => {
            let cascade = MotifCascade::new(cascade.config()?)?;
            let aligner = select_aligner(&files, aligner_cmd, alignment)?;
            let reference = reference.unwrap_or_default();
            for_each_file(&files, &output, |input, layout, stats| {
                pipeline::run_file(input, &cascade, aligner.as_ref(), &reference, layout, stats).map(|_| ())
            })
        }
    }
}

fn select_aligner(files: &[PathBuf], aligner_cmd: Option<String>, alignment: Option<PathBuf>) -> anyhow::Result<Box<dyn Aligner>> {
    match (aligner_cmd, alignment) {
        (Some(cmd), _) => Ok(Box::new(CommandAligner::from_template(&cmd)?)),
        (None, Some(_)) if files.len() > 1 => {
            anyhow::bail!("--alignment belongs to a single input, got {} input files", files.len())
        }
        (None, Some(path)) => Ok(Box::new(PrecomputedAligner { path })),
        (None, None) => anyhow::bail!("run needs --aligner-cmd or --alignment"),
    }
}

/// One stats session per file; a failed file does not stop the others.
fn for_each_file<F>(files: &[PathBuf], output: &OutputArgs, mut job: F) -> anyhow::Result<()>
where
    F: FnMut(&Path, &OutputLayout, &StatsAggregator) -> motifcut::Result<()>,
{
    let mut sessions = Vec::with_capacity(files.len());
    let mut failed = 0usize;
    for input in files {
        let layout = OutputLayout::for_input(input, output.out_dir.as_deref());
        if let Some(dir) = &output.out_dir {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let stats = StatsAggregator::new(input.display().to_string());
        match job(input, &layout, &stats) {
            Ok(()) => {
                stats.publish(&mut LogReporter)?;
                if output.table {
                    print_table(&stats)?;
                }
                sessions.push(stats);
            }
            Err(e) => {
                log::error!("{e}");
                failed += 1;
            }
        }
    }

    if let Some(path) = &output.stats_csv {
        let refs: Vec<&StatsAggregator> = sessions.iter().collect();
        pipeline::write_stats_csv(path, &refs).with_context(|| format!("writing {}", path.display()))?;
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} input files failed", files.len());
    }
    Ok(())
}

fn set_table_format() {
    std::env::set_var("POLARS_FMT_TABLE_FORMATTING", "UTF8_FULL");
    std::env::set_var("POLARS_FMT_MAX_COLS", "100000");
    std::env::set_var("POLARS_FMT_MAX_ROWS", "1000000");
    std::env::set_var("POLARS_FMT_STR_LEN", "100000");
}

fn print_table(stats: &StatsAggregator) -> anyhow::Result<()> {
    let df = stats.snapshot().to_dataframe()?;
    set_table_format();
    println!("{df}");
    Ok(())
}

fn cmd_enzymes() -> anyhow::Result<()> {
    let rows = motifcut::enzymes::enzyme_rows();
    let df = df!(
        "enzyme" => rows.iter().map(|r| r.0.clone()).collect::<Vec<_>>(),
        "site"   => rows.iter().map(|r| r.1.clone()).collect::<Vec<_>>(),
        "source" => rows.iter().map(|r| r.2.clone()).collect::<Vec<_>>(),
    )?;
    set_table_format();
    println!("{df}");
    Ok(())
}
