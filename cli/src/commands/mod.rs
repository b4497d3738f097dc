// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for pg-warden CLI

use anyhow::{Context, Result};
use std::path::PathBuf;

use pg_warden_core::domain::warden_config::WardenConfigManifest;

pub mod classify;
pub mod config;
pub mod db;
pub mod policy;
pub mod query;

pub use self::classify::ClassifyArgs;
pub use self::config::ConfigCommand;
pub use self::db::DbCommand;
pub use self::policy::PolicyCommand;
pub use self::query::QueryArgs;

/// Discover, load and validate the manifest every command works from.
pub fn load_manifest(config_override: Option<PathBuf>) -> Result<WardenConfigManifest> {
    let manifest = WardenConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    manifest
        .validate()
        .context("Configuration validation failed")?;
    Ok(manifest)
}
