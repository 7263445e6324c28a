//! Interactive console entry point.
//!
//! Prompts for a comic URL and title, then downloads every chapter into
//! `<home>/Documents/Comics/<Title>/`, one merged PDF per chapter.

use std::io::{self, Write};
use std::path::PathBuf;

use log::{LevelFilter, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use tankobon::error::{Error, Result};
use tankobon::path_utils::{sanitize_filename, title_case};
use tankobon::prelude::*;

fn prompt(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );

    let url = prompt("Enter Comic URL: ")?;
    let title = title_case(&prompt("Enter Comic Title: ")?);
    if url.is_empty() || title.is_empty() {
        return Err(Error::Other(
            "A comic URL and a title are both required".to_string(),
        ));
    }

    let home = dirs::home_dir().ok_or_else(|| Error::NotFound("home directory".to_string()))?;
    let output_dir: PathBuf = home
        .join("Documents")
        .join("Comics")
        .join(sanitize_filename(&title));

    let config = TankobonConfig::builder().output_dir(output_dir).build()?;
    let reports = config.download_comic(&url).await?;

    let complete = reports.iter().filter(|r| r.document.is_some()).count();
    info!(
        "finished '{}': {}/{} chapters written",
        title,
        complete,
        reports.len()
    );
    Ok(())
}
