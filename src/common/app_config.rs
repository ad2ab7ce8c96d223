// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CONFIG: OnceLock<NovaProbeConfig> = OnceLock::new();

const CONFIG_ENV: &str = "NOVAPROBE_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "novaprobe.toml";

fn default_log_level() -> String {
    "info".to_string()
}

pub fn init_from_path(path: impl AsRef<Path>) -> Result<&'static NovaProbeConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let cfg = NovaProbeConfig::load_from_file(path.as_ref())?;
    let _ = CONFIG.set(cfg);
    Ok(CONFIG.get_or_init(NovaProbeConfig::default))
}

/// Load `$NOVAPROBE_CONFIG`, then `./novaprobe.toml`, else fall back to defaults.
pub fn init_from_env_or_default() -> Result<&'static NovaProbeConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let cfg = match config_path_from_env() {
        Some(path) => NovaProbeConfig::load_from_file(&path)?,
        None => NovaProbeConfig::default(),
    };
    let _ = CONFIG.set(cfg);
    Ok(CONFIG.get_or_init(NovaProbeConfig::default))
}

pub fn config() -> Result<&'static NovaProbeConfig> {
    init_from_env_or_default()
}

fn config_path_from_env() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CONFIG_ENV)
        && !p.trim().is_empty()
    {
        return Some(PathBuf::from(p.trim()));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}

#[derive(Clone, Debug, Deserialize)]
pub struct NovaProbeConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional full tracing EnvFilter expression.
    /// If set, this takes precedence over `log_level`.
    /// Example: "novaprobe=debug,novaprobe::exec::pipeline=trace"
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl NovaProbeConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        Self::from_toml_str(&s).with_context(|| format!("parse toml: {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: NovaProbeConfig = toml::from_str(s)?;
        cfg.runtime.validate()?;
        Ok(cfg)
    }

    pub fn effective_log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(&self.log_level)
    }
}

impl Default for NovaProbeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_filter: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    /// Initial capacity hint for channel set builders.
    #[serde(default = "default_expected_set_positions")]
    pub expected_set_positions: usize,
    #[serde(default = "default_driver_time_slice_ms")]
    pub driver_time_slice_ms: u64,
    /// Logical memory limit in bytes; negative means unlimited.
    #[serde(default = "default_mem_limit_bytes")]
    pub mem_limit_bytes: i64,
}

fn default_expected_set_positions() -> usize {
    10_000
}
fn default_driver_time_slice_ms() -> u64 {
    100
}
fn default_mem_limit_bytes() -> i64 {
    -1
}

impl RuntimeConfig {
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.driver_time_slice_ms > 0,
            "runtime.driver_time_slice_ms must be positive"
        );
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            expected_set_positions: default_expected_set_positions(),
            driver_time_slice_ms: default_driver_time_slice_ms(),
            mem_limit_bytes: default_mem_limit_bytes(),
        }
    }
}
