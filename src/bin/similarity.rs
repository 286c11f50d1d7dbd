use anyhow::Result;
use opstats::{
    chart,
    config::{Corpus, Output, SimilarityConfig},
    tasks,
};
use std::path::PathBuf;
use structopt::StructOpt;

/// Compare GitHub operator usage with Stack Overflow topics.
/// Expects the frequency tables written by `frequencies`.
#[derive(StructOpt)]
struct Options {
    #[structopt(short, long, default_value = "assets", parse(from_os_str))]
    assets_dir: PathBuf,
    #[structopt(short, long, default_value = "results", parse(from_os_str))]
    results_dir: PathBuf,
    /// Size of the most and least used subsets
    #[structopt(short, long, default_value = "15")]
    samples: usize,
    #[structopt(long)]
    skip_charts: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let options = Options::from_args();
    let output = Output::new(options.results_dir);
    let mut config = SimilarityConfig::new(output.frequency_dir());
    config.samples = options.samples;
    let jobs = tasks::similarity(&Corpus::new(options.assets_dir), &config, &output).await?;
    if !options.skip_charts {
        chart::Client::from_env()?.render_all(&jobs).await?;
    }
    Ok(())
}
