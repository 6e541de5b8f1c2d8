use std::{env, fs, io, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use server::{models::Role, token::TokenIssuer};

const SECRET_VAR: &str = "JWT_SECRET";

/// Mints an access token for manual requests against the API.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long)]
    id: i64,

    #[arg(long, default_value = "user")]
    role: Role,

    #[arg(long, default_value = "/run/secrets/JWT_SECRET")]
    secret_file: PathBuf,

    #[arg(long, default_value_t = 3600)]
    ttl_secs: u64,
}

/// Same order as the server: secret file first, then the `JWT_SECRET` variable.
fn resolve_secret(file: io::Result<String>, fallback: Option<String>) -> Result<String> {
    match file {
        Ok(secret) => Ok(secret.trim().to_string()),
        Err(e) => fallback
            .map(|secret| secret.trim().to_string())
            .with_context(|| format!("secret file unreadable ({e}) and {SECRET_VAR} not set")),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let secret = resolve_secret(
        fs::read_to_string(&args.secret_file),
        env::var(SECRET_VAR).ok(),
    )?;
    let issuer = TokenIssuer::new(secret.as_bytes(), Duration::from_secs(args.ttl_secs));

    let token = issuer.issue(args.id, args.role)?;

    println!("{} {} token, valid {}s", args.role, args.id, args.ttl_secs);
    println!("x-access-token: Bearer {token}");

    Ok(())
}
