use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its `.secrets` subdirectory and an initial `config.json` pointing
/// at `base_url`.
///
/// # Errors
/// - Returns an error if `base_url` is not a URL, if a config already exists, or if any file
///   operation fails.
pub async fn init(finanzas_home: &Path, base_url: &str) -> Result<Out<()>> {
    let config = Config::create(finanzas_home, base_url)
        .await
        .context("Unable to create the data directory and config")?;
    Ok(format!(
        "Created {} for {}. Now run 'finanzas login <USERNAME>'",
        config.config_path().display(),
        config.base_url()
    )
    .into())
}
