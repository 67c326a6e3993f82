//! Application configuration and run entry point with builder pattern.

use crate::errors::AppError;
use crate::summary::{HeaderSummary, MeshSummary};
use plymesh_data::{MeshRequest, extract_mesh, read_header};
use serde::Serialize;
use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// How the report is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
    #[cfg_attr(not(feature = "tracy"), allow(dead_code))]
    pub enable_tracy: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracy: false,
        }
    }
}

/// Builder for configuring and running one inspection.
pub struct AppBuilder {
    path: PathBuf,
    request: MeshRequest,
    header_only: bool,
    output: OutputFormat,
    logging: LoggingConfig,
}

impl AppBuilder {
    /// Create a new AppBuilder for the given file with default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            request: MeshRequest::default(),
            header_only: false,
            output: OutputFormat::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Set which attributes to extract.
    pub fn with_request(mut self, request: MeshRequest) -> Self {
        self.request = request;
        self
    }

    /// Only parse and report the header.
    pub fn with_header_only(mut self, header_only: bool) -> Self {
        self.header_only = header_only;
        self
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    /// Configure logging.
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = config;
        self
    }

    /// Initialize logging, build the report, and print it to stdout.
    pub fn run(self) -> Result<(), AppError> {
        self.init_logging();

        let report = self.report()?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", report)?;
        Ok(())
    }

    /// Decode the file and render the report without printing it.
    pub fn report(&self) -> Result<String, AppError> {
        if self.header_only {
            let header = read_header(&self.path)?;
            return self.render(&HeaderSummary::new(&self.path, &header));
        }

        debug!("Extracting with {:?}", self.request);
        let mesh = extract_mesh(&self.path, self.request)?;
        self.render(&MeshSummary::new(&self.path, &mesh))
    }

    fn render<T: Serialize + Display>(&self, value: &T) -> Result<String, AppError> {
        match self.output {
            OutputFormat::Text => Ok(value.to_string()),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        }
    }

    fn init_logging(&self) {
        #[cfg(feature = "tracy")]
        {
            if self.logging.enable_tracy {
                use tracing_subscriber::Layer;
                use tracing_subscriber::layer::SubscriberExt;
                use tracing_subscriber::util::SubscriberInitExt;
                tracing_subscriber::registry()
                    .with(tracing_tracy::TracyLayer::default())
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(std::io::stderr)
                            .with_filter(
                                tracing_subscriber::EnvFilter::try_from_default_env()
                                    .unwrap_or_else(|_| self.logging.level.clone().into()),
                            ),
                    )
                    .init();
                return;
            }
        }

        // Logs go to stderr so `--json` output stays parseable.
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level)),
            )
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
