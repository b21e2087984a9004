// SPDX-License-Identifier: MIT

//! Configuration discovery.
//!
//! Precedence: explicit `--config` flag, then `LB_CONFIG_PATH`, then the
//! user config directory (`$XDG_CONFIG_HOME/fleetbench/config.toml`). No hit
//! means built-in defaults.

use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "LB_CONFIG_PATH";

pub fn locate_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }
    let candidate = dirs::config_dir()?.join("fleetbench").join("config.toml");
    candidate.exists().then_some(candidate)
}

#[cfg(test)]
#[path = "config_locate_tests.rs"]
mod tests;
