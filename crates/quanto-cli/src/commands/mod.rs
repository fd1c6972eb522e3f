//! CLI subcommands and the helpers they share.

pub mod analyze;
pub mod config;
pub mod shell;

use std::path::{Path, PathBuf};

use glob::{Pattern, glob};
use tracing::debug;

use quanto_core::{
    AzureReceiptClient, BatchOrchestrator, Document, DocumentKind, ScannerConfig,
    UnreadableDocument,
};

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quanto")
        .join("config.json")
}

/// Load configuration from `--config` or the default location.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<ScannerConfig> {
    let config = ScannerConfig::load(config_path.map(Path::new), &default_config_path())?;
    debug!("Loaded configuration: {:?}", config);
    Ok(config)
}

/// Resolve credentials and build the orchestrator. Missing secrets are fatal.
pub fn build_orchestrator(
    config: &ScannerConfig,
) -> anyhow::Result<BatchOrchestrator<AzureReceiptClient>> {
    let credentials = config.azure.credentials()?;
    let client = AzureReceiptClient::new(credentials, config.azure.clone())?;
    Ok(BatchOrchestrator::new(client, config.batch.clone()))
}

/// Expand files and glob patterns into document paths, keeping the order
/// in which they were given.
///
/// Patterns only match files with a supported extension. A plain path is
/// kept as given, so a missing or unsupported file is reported as a failed
/// document instead of disappearing from the batch.
pub fn expand_inputs<S: AsRef<str>>(inputs: &[S]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        let input = input.as_ref();
        let literal = Pattern::escape(input) == input && !Path::new(input).is_dir();
        let mut matched: Vec<PathBuf> = if literal {
            vec![PathBuf::from(input)]
        } else {
            glob(input)?
                .filter_map(|r| r.ok())
                .filter(|p| p.is_file() && DocumentKind::is_supported_path(p))
                .collect()
        };
        matched.sort();

        if matched.is_empty() {
            debug!("No supported files matched {}", input);
        }
        for path in matched {
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Read documents from disk. Files that cannot be loaded are kept with
/// their error so the batch can report them.
pub fn load_documents(paths: &[PathBuf]) -> Vec<Result<Document, UnreadableDocument>> {
    paths.iter().map(|path| Document::load(path)).collect()
}
