//! Environment-driven profiling switches
//!
//! - `OTTER_DISABLE_VALUE_PROFILING=1` makes every profile site resolve to
//!   "no profile"
//! - `OTTER_PROFILE_TRACE=1` raises profile creation and instrumentation
//!   events from `trace` to `debug`

use std::sync::OnceLock;

static GLOBAL_CONFIG: OnceLock<ProfilingConfig> = OnceLock::new();

/// Profiling switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfilingConfig {
    /// Whether value profiles are addressed at all
    pub value_profiling_enabled: bool,
    /// Whether profile events log at `debug` level
    pub trace_events: bool,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            value_profiling_enabled: true,
            trace_events: false,
        }
    }
}

fn parse_env_truthy(value: &str) -> bool {
    !matches!(value.trim(), "" | "0")
        && !value.trim().eq_ignore_ascii_case("false")
        && !value.trim().eq_ignore_ascii_case("off")
        && !value.trim().eq_ignore_ascii_case("no")
}

fn env_flag(var_name: &str) -> bool {
    std::env::var(var_name)
        .ok()
        .is_some_and(|v| parse_env_truthy(&v))
}

impl ProfilingConfig {
    /// Read the switches from the environment (uncached)
    pub fn from_env() -> Self {
        Self {
            value_profiling_enabled: !env_flag("OTTER_DISABLE_VALUE_PROFILING"),
            trace_events: env_flag("OTTER_PROFILE_TRACE"),
        }
    }

    /// Process-wide switches, read from the environment on first use
    pub fn global() -> &'static Self {
        GLOBAL_CONFIG.get_or_init(Self::from_env)
    }

    /// Config with value profiling turned off
    pub fn disabled() -> Self {
        Self {
            value_profiling_enabled: false,
            ..Self::default()
        }
    }
}
