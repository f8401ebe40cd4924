use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod charts;
mod config;
mod console;
mod error;
mod export;
mod hypothesis;
mod loader;
mod models;
mod outliers;
mod pipeline;
mod regression;
mod report;
mod stats;

use config::AnalysisConfig;
use hypothesis::TTestVariant;

#[derive(Parser)]
#[command(name = "engagement-analysis")]
#[command(about = "Year-over-year engagement analysis for Q2 subscription cohorts", long_about = None)]
struct Cli {
    /// Log every pipeline step at debug level
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and write the workbook and charts
    Analyze {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long, default_value = "../excel")]
        out_dir: PathBuf,
        /// Skip rendering the PNG charts
        #[arg(long)]
        no_charts: bool,
    },
    /// Print the computed statistics without writing any files
    Summary {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, default_value = "../data")]
    data_dir: PathBuf,
    /// JSON file overriding the dataset table and analysis parameters
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed for the train/test split
    #[arg(long)]
    seed: Option<u64>,
    /// Quantile above which engagement records are dropped
    #[arg(long)]
    threshold: Option<f64>,
    #[arg(long, value_enum)]
    t_test: Option<TTestVariant>,
}

impl RunArgs {
    fn into_config(self, out_dir: PathBuf) -> anyhow::Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_file(path, &self.data_dir, out_dir)?,
            None => AnalysisConfig::new(&self.data_dir, out_dir),
        };
        if let Some(seed) = self.seed {
            config.split_seed = seed;
        }
        if let Some(threshold) = self.threshold {
            config.outlier_threshold = threshold;
        }
        if let Some(variant) = self.t_test {
            config.t_test = variant;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze {
            run,
            out_dir,
            no_charts,
        } => {
            let config = run.into_config(out_dir)?;
            let datasets = pipeline::prepare(&config).context("failed to prepare datasets")?;
            let results = pipeline::analyze(&datasets, &config).context("analysis failed")?;
            print!("{}", console::render_summary(&results));

            info!("exporting results to excel");
            let workbook = report::build_workbook(&results, &datasets);
            let workbook_path = config.workbook_path();
            export::write_workbook(&workbook, &workbook_path)?;
            println!("Workbook written to {}.", workbook_path.display());

            if !no_charts {
                info!("creating visualizations");
                let distributions = config.distributions_chart_path();
                charts::render_distributions(&datasets, config.histogram_bins, &distributions)?;
                println!("Saved {}.", distributions.display());

                let correlation = config.correlation_chart_path();
                charts::render_correlation(&datasets.certificates, &correlation)?;
                println!("Saved {}.", correlation.display());
            }
            info!("analysis complete");
        }
        Commands::Summary { run } => {
            let config = run.into_config(PathBuf::from("."))?;
            let datasets = pipeline::prepare(&config).context("failed to prepare datasets")?;
            let results = pipeline::analyze(&datasets, &config).context("analysis failed")?;
            print!("{}", console::render_summary(&results));
        }
    }

    Ok(())
}
