use std::{path::PathBuf, time::Duration};

use clap::Parser;
use server::{credentials::Sha256Hasher, database::Store};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    fixture: PathBuf,

    #[arg(long, default_value = "meals.db")]
    database: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let store = Store::open(&args.database, Duration::from_secs(5))?;
    let fixture = seed::load_fixture(&args.fixture)?;

    let summary = seed::seed(&store, &Sha256Hasher, fixture)?;

    println!("\nNew Accounts: {}", summary.accounts);
    println!("New Meals: {}", summary.meals);
    println!("Skipped: {}", summary.skipped);

    Ok(())
}
