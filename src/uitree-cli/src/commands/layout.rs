//! Layout command handler

use anyhow::Result;
use std::path::Path;

use super::load_layout;
use crate::config::Config;

/// Handle the layout command
pub fn handle(layout: Option<&Path>) -> Result<()> {
    let layout = match layout {
        Some(path) => load_layout(path)?,
        None => Config::load()?.layout.unwrap_or_default(),
    };

    print!("{}", layout.to_toml_string()?);

    Ok(())
}
