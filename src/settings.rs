use std::path::Path;

use ppdf_lib::{PpdfError, RawConfig, Settings};

/// Option literals after merging CLI flags with the config file.
#[derive(Debug, Default, PartialEq)]
pub struct ResolvedOptions {
    pub args: Option<RawConfig>,
    pub upd: Option<RawConfig>,
}

/// Merge CLI literals with config file literals, preferring CLI when present.
pub fn resolve_options(
    cli_args: Option<String>,
    cli_upd: Option<String>,
    settings: &Settings,
) -> ResolvedOptions {
    ResolvedOptions {
        args: cli_args.or_else(|| settings.args.clone()).map(RawConfig::from),
        upd: cli_upd.or_else(|| settings.upd.clone()).map(RawConfig::from),
    }
}

/// Load settings from a TOML file, or return defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, PpdfError> {
    Settings::load(path)
}
