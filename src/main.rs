use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = gangway::cli::Cli::parse();
    if let Err(e) = gangway::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
