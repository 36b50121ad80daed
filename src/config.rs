use log::LevelFilter;
use std::net::SocketAddr;
use std::time::Duration;

use crate::solver::{Backend, SolverOptions};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Runtime configuration read from the environment.
///
/// | variable           | default          |
/// |--------------------|------------------|
/// | `SOLVER`           | `HIGHS`          |
/// | `FALLBACK_SOLVER`  | `MICROLP`        |
/// | `SOLVE_TIME_LIMIT` | none (seconds)   |
/// | `LOG_LEVEL`        | `info`           |
/// | `BIND_ADDR`        | `127.0.0.1:8080` |
///
/// Invalid values are replaced by their default. Loading returns one warning
/// per rejected value so the caller can log them once a logger is installed.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterConfig {
    pub solver: SolverOptions,
    pub log_level: LevelFilter,
    pub bind_addr: SocketAddr,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            solver: SolverOptions::default(),
            log_level: LevelFilter::Info,
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl RosterConfig {
    pub fn from_env() -> (Self, Vec<String>) {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> (Self, Vec<String>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut warnings = Vec::new();

        if let Some(value) = lookup("SOLVER") {
            match value.parse::<Backend>() {
                Ok(backend) => config.solver.primary = backend,
                Err(e) => warnings.push(format!("{e}; defaulting to {}", config.solver.primary)),
            }
        }

        if let Some(value) = lookup("FALLBACK_SOLVER") {
            if value.trim().eq_ignore_ascii_case("none") {
                config.solver.fallback = None;
            } else {
                match value.parse::<Backend>() {
                    Ok(backend) => config.solver.fallback = Some(backend),
                    Err(e) => warnings.push(format!("{e}; keeping default fallback")),
                }
            }
        }

        if let Some(value) = lookup("SOLVE_TIME_LIMIT") {
            match value.trim().parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs > 0.0 => {
                    config.solver.time_limit = Some(Duration::from_secs_f64(secs));
                }
                _ => warnings.push(format!(
                    "Invalid solve time limit '{value}', solving without a limit"
                )),
            }
        }

        if let Some(value) = lookup("LOG_LEVEL") {
            match value.trim().parse::<LevelFilter>() {
                Ok(level) => config.log_level = level,
                Err(_) => warnings.push(format!(
                    "Invalid log level '{value}', defaulting to {}",
                    config.log_level
                )),
            }
        }

        if let Some(value) = lookup("BIND_ADDR") {
            match value.trim().parse::<SocketAddr>() {
                Ok(addr) => config.bind_addr = addr,
                Err(_) => warnings.push(format!(
                    "Invalid bind address '{value}', defaulting to {DEFAULT_BIND_ADDR}"
                )),
            }
        }

        (config, warnings)
    }
}
