use anyhow::Result;
use log::info;
use opstats::{
    chart,
    config::{Corpus, FrequencyConfig, Output, SimilarityConfig},
    tasks,
};
use std::path::PathBuf;
use structopt::StructOpt;

/// Run every report: frequencies, similarity, utilization and utilization per distribution
#[derive(StructOpt)]
struct Options {
    #[structopt(short, long, default_value = "assets", parse(from_os_str))]
    assets_dir: PathBuf,
    #[structopt(short, long, default_value = "results", parse(from_os_str))]
    results_dir: PathBuf,
    /// Write the tables without rendering any chart
    #[structopt(long)]
    skip_charts: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load from .env file if it is present
    dotenv::dotenv().ok();
    // Initialize logging
    env_logger::init();
    // Get command line arguments
    let options = Options::from_args();
    let corpus = Corpus::new(options.assets_dir);
    let output = Output::new(options.results_dir);

    // Similarity reads the frequency tables, so frequencies must run first
    let mut jobs = tasks::frequencies(&corpus, &FrequencyConfig::default(), &output).await?;
    let similarity_config = SimilarityConfig::new(output.frequency_dir());
    jobs.extend(tasks::similarity(&corpus, &similarity_config, &output).await?);
    jobs.extend(tasks::utilization(&corpus, &output).await?);
    jobs.extend(tasks::utilization_distribution(&corpus, &output).await?);

    if options.skip_charts {
        info!("Skipping {} charts", jobs.len());
        return Ok(());
    }
    chart::Client::from_env()?.render_all(&jobs).await
}
