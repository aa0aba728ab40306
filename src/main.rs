use american_roulette::commands::start;
use american_roulette::store::ACCOUNTS_FILE;
use clap::Parser;
use dotenv::dotenv;
use env_logger::Env;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "roulette")]
#[command(about = "American Roulette at the terminal")]
struct Args {
    /// Directory holding config.json and the accounts file
    #[arg(long, env = "ROULETTE_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Accounts file name inside the data directory
    #[arg(long, default_value = ACCOUNTS_FILE)]
    accounts_file: String,

    /// Seed the wheel for a reproducible sequence of spins
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if let Err(why) = start(args.data_dir, &args.accounts_file, args.seed).await {
        eprintln!("roulette: {why:#}");
        std::process::exit(1);
    }
}
