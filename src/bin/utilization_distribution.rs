use anyhow::Result;
use opstats::{
    chart,
    config::{Corpus, Output},
    tasks,
};
use std::path::PathBuf;
use structopt::StructOpt;

/// One stacked bar per library comparing used and unused operator shares
#[derive(StructOpt)]
struct Options {
    #[structopt(short, long, default_value = "assets", parse(from_os_str))]
    assets_dir: PathBuf,
    #[structopt(short, long, default_value = "results", parse(from_os_str))]
    results_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let options = Options::from_args();
    let jobs =
        tasks::utilization_distribution(&Corpus::new(options.assets_dir), &Output::new(options.results_dir)).await?;
    chart::Client::from_env()?.render_all(&jobs).await
}
