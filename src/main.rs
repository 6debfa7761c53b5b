use std::io::{self, Read};

use anyhow::Result;
use dgpt::{cli, config::Config, handlers};
use is_terminal::IsTerminal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // logs go to stderr so captured analysis output stays clean on stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = cli::Cli::parse();
    let cfg = Config::load();

    // Resolve model: CLI overrides config
    let effective_model = args
        .model
        .clone()
        .or_else(|| cfg.get("DEFAULT_MODEL"))
        .unwrap_or_else(|| "gpt-4o".to_string());

    // stdin handling: a question can be piped in instead of passed as an argument
    let mut question = args.question.clone();
    if question.is_none() && !io::stdin().is_terminal() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let piped = buf.trim();
        if !piped.is_empty() {
            question = Some(piped.to_string());
        }
    }

    match question {
        Some(q) => handlers::ask::run(&args, &cfg, &effective_model, &q).await,
        None => handlers::repl::run(&args, &cfg, &effective_model).await,
    }
}
