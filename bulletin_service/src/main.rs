use bulletin_service::config::{self, Configuration};
use bulletin_service::ingest::fetch::HttpFetcher;
use bulletin_service::logging::{self, DataSource, LogLevel};
use bulletin_service::output::{self, SpeechOutput};
use bulletin_service::pipeline::Dispatcher;
use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

const LOG_FILE: &str = "bulletin_service.log";

#[derive(Parser)]
#[command(name = "bulletin_service")]
#[command(about = "Generate spoken gauge and weather bulletins for a repeater", long_about = None)]
struct Cli {
    /// Configuration file (.json, or .toml)
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output additional debugging information to both stdout and the log file
    #[arg(long)]
    verbose: bool,

    /// Write the repeater playback conf file and exit
    #[arg(long)]
    writeconf: bool,

    /// Write text reports only; skip speech synthesis
    #[arg(long)]
    text_only: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.verbose {
        logging::init_logger(LogLevel::Info, LogLevel::Debug, Some(LOG_FILE));
    } else {
        logging::init_logger(LogLevel::Error, LogLevel::Warning, Some(LOG_FILE));
    }

    logging::info(
        DataSource::System,
        None,
        &format!("Starting run at {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
    );

    dotenv::dotenv().ok();
    let config = Configuration::load(&cli.config).inspect_err(|e| {
        logging::error(DataSource::Config, None, &e.to_string());
    })?;

    std::fs::create_dir_all(config.output_dir()).inspect_err(|e| {
        logging::error(
            DataSource::Output,
            None,
            &format!("Cannot create output directory {}: {}", config.output_dir().display(), e),
        );
    })?;

    if cli.writeconf {
        output::write_playback_conf(&config)?;
        return Ok(());
    }

    let fetcher = HttpFetcher::new(config.fetch_timeout())?;
    let sink = SpeechOutput::from_config(&config, cli.text_only);
    let sources = config.sources();

    Dispatcher::new(&fetcher, &sink)
        .with_max_workers(config.settings.max_workers)
        .run(&sources)?;

    logging::info(
        DataSource::System,
        None,
        &format!(
            "Done creating all files, exiting at {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ),
    );
    Ok(())
}
