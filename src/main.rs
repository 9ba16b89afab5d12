mod cli;
mod history;
mod logging;
mod model;
mod orchestrator;
mod render;
mod storage;
mod text_summary;
mod trigger;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_json = args.json;
    logging::init(&args)?;

    match cli::run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if is_json {
                // Keep stdout machine-readable for scripted callers.
                println!("{}", serde_json::json!({ "error": format!("{e:#}") }));
                std::process::exit(1);
            } else {
                Err(e)
            }
        }
    }
}
