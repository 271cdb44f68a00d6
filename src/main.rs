use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cadence::cli::Args::parse();
    cadence::cli::run(args).await
}
