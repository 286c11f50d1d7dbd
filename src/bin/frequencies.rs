use anyhow::Result;
use opstats::{
    chart::{self, ChartKind},
    config::{Corpus, FrequencyConfig, Output},
    tasks,
};
use std::path::PathBuf;
use structopt::StructOpt;

/// Operator frequency tables and charts for each library
#[derive(StructOpt)]
struct Options {
    #[structopt(short, long, default_value = "assets", parse(from_os_str))]
    assets_dir: PathBuf,
    #[structopt(short, long, default_value = "results", parse(from_os_str))]
    results_dir: PathBuf,
    /// Number of operators in the most and least used charts
    #[structopt(short, long, default_value = "10")]
    samples: usize,
    /// Also list manifest operators that never occur, with a count of 0
    #[structopt(long)]
    include_manifest: bool,
    /// Draw horizontal bars
    #[structopt(long)]
    horizontal: bool,
    #[structopt(long)]
    skip_charts: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let options = Options::from_args();
    let config = FrequencyConfig {
        samples: options.samples,
        include_manifest: options.include_manifest,
        chart_kind: if options.horizontal { ChartKind::HorizontalBar } else { ChartKind::Bar },
    };
    let jobs = tasks::frequencies(&Corpus::new(options.assets_dir), &config, &Output::new(options.results_dir)).await?;
    if !options.skip_charts {
        chart::Client::from_env()?.render_all(&jobs).await?;
    }
    Ok(())
}
