use clap::Parser;
use museum::{ServerOptions, start_server};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Listening port, overrides RUST_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Start without the sample proposals.
    #[arg(long)]
    no_seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    start_server(ServerOptions {
        port: args.port,
        no_seed: args.no_seed,
    })
    .await
}
