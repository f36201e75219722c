use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use tracing::{debug, error};

use crate::config::{ConfigStore, LoggingSettings};
use crate::utils::logger::Logger;

pub const DEFAULT_CONFIG_PATH: &str = "./config.yml";

#[derive(Parser, Debug)]
#[command(name = "someimage")]
#[command(author = "Someimage Team")]
#[command(about = "Some image downloader", long_about = "Saves images")]
pub struct Cli {
    /// Path to config file
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "SOMEIMAGE_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config: PathBuf,
}

impl Cli {
    /// Read the config file and build the logger it describes.
    ///
    /// Failures are logged through whatever logger is current before being
    /// returned, so the caller only has to pick an exit status.
    pub fn load_config(&self) -> Result<Logger> {
        let store = ConfigStore::load(&self.config)
            .inspect_err(|err| {
                error!(
                    function = "load_config",
                    component = "config",
                    err = %err,
                    "Failed to load config file"
                )
            })
            .with_context(|| format!("Failed to load config file: {}", self.config.display()))?;

        let settings = LoggingSettings::from_store(&store);
        let logger = Logger::from_settings(&settings)
            .inspect_err(|err| {
                error!(
                    function = "load_config",
                    component = "logger",
                    err = %err,
                    "Failed to set up logger"
                )
            })
            .context("Failed to set up logger")?;

        Ok(logger)
    }

    /// Run the root command. With no subcommands this prints the help text.
    pub fn execute(self, logger: &Logger) -> Result<()> {
        debug!(
            config = %self.config.display(),
            level = %logger.severity(),
            formatter = ?logger.formatter(),
            handler = ?logger.handler(),
            log_file = ?logger.log_file(),
            "Configuration loaded"
        );

        Cli::command()
            .print_help()
            .inspect_err(|err| error!(component = "rootCmd", err = %err, "CLI error"))
            .context("Failed to print help")?;

        Ok(())
    }
}
