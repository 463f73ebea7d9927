//! Argument vectors for the instrument-control tools
//!
//! Each tool is run as `<interpreter> <tool-path> <flags...>`. Endpoint
//! flags are added only when the configuration store has a value for them.

use std::path::{Path, PathBuf};

use super::Invocation;
use crate::common::config::ToolsConfig;
use crate::session::config_store::{ConfigStore, POWER_ADDR, RES_PORT, SCOPE_IP};

/// Builds invocations for the power supply, resistance box and scope tools
#[derive(Debug, Clone)]
pub struct Instruments {
    interpreter: PathBuf,
    power: PathBuf,
    resistance: PathBuf,
    scope: PathBuf,
}

impl Instruments {
    pub fn from_config(tools: &ToolsConfig) -> Self {
        Self {
            interpreter: tools.interpreter_path(),
            power: tools.power.clone(),
            resistance: tools.resistance.clone(),
            scope: tools.scope.clone(),
        }
    }

    fn invocation(&self, tool: &Path, description: String) -> Invocation {
        Invocation::new(&self.interpreter, description).arg(tool.display().to_string())
    }

    /// Output on, optionally programming voltage and current first
    ///
    /// Without setpoints only `-o on` is sent, so the supply keeps whatever it
    /// was last programmed with.
    pub fn power_on(&self, setpoints: Option<(&str, &str)>, store: &ConfigStore) -> Invocation {
        let inv = match setpoints {
            Some((voltage, current)) => self
                .invocation(&self.power, format!("power on {}V {}A", voltage, current))
                .arg("-v")
                .arg(voltage)
                .arg("-c")
                .arg(current),
            None => self.invocation(&self.power, "power on (restore output)".to_string()),
        };
        inv.arg("-o")
            .arg("on")
            .opt_arg("-a", store.get(POWER_ADDR))
    }

    pub fn power_off(&self, store: &ConfigStore) -> Invocation {
        self.invocation(&self.power, "power off".to_string())
            .arg("-o")
            .arg("off")
            .opt_arg("-a", store.get(POWER_ADDR))
    }

    /// Set resistance and close the relay in one call
    pub fn resistance_set(&self, value: &str, store: &ConfigStore) -> Invocation {
        self.invocation(&self.resistance, format!("set resistance {}", value))
            .arg("-v")
            .arg(value)
            .arg("--action")
            .arg("connect")
            .opt_arg("-p", store.get(RES_PORT))
    }

    pub fn resistance_connect(&self, store: &ConfigStore) -> Invocation {
        self.invocation(&self.resistance, "close resistance relay".to_string())
            .arg("--action")
            .arg("connect")
            .opt_arg("-p", store.get(RES_PORT))
    }

    pub fn resistance_disconnect(&self, store: &ConfigStore) -> Invocation {
        self.invocation(&self.resistance, "open resistance relay".to_string())
            .arg("--action")
            .arg("disconnect")
            .opt_arg("-p", store.get(RES_PORT))
    }

    /// Capture a screenshot into `output`
    pub fn scope_screenshot(&self, output: &Path, store: &ConfigStore) -> Invocation {
        let file = output.display().to_string();
        self.invocation(&self.scope, format!("screenshot {}", file))
            .arg("shot")
            .arg("-o")
            .arg(file)
            .opt_arg("--ip", store.get(SCOPE_IP))
    }

    /// Read the mean of a channel
    pub fn scope_mean(&self, channel: &str, store: &ConfigStore) -> Invocation {
        self.invocation(&self.scope, format!("read channel {}", channel))
            .arg("mean")
            .arg("-c")
            .arg(channel)
            .arg("--clean")
            .opt_arg("--ip", store.get(SCOPE_IP))
    }
}
