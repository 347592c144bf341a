// Configuration management module
// TOML settings stored next to the persisted index artifacts

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    AssistantConfig, CachePolicy, Config, ConfigError, DatasetConfig, GenerationConfig,
    OllamaConfig, RetrievalConfig,
};

/// Resolve the data directory, preferring an explicit override
#[inline]
pub fn resolve_data_dir(
    override_dir: Option<std::path::PathBuf>,
) -> Result<std::path::PathBuf, ConfigError> {
    match override_dir {
        Some(dir) => Ok(dir),
        None => Config::default_dir(),
    }
}
