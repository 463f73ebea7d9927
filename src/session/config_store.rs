//! Configuration store
//!
//! Instrument endpoints set by CONFIG lines. An absent key means the tool's
//! own default applies, so the option is simply left off the invocation.

use std::collections::HashMap;

use crate::common::config::EndpointsConfig;

/// Resistance box serial port
pub const RES_PORT: &str = "RES_PORT";
/// Power supply address
pub const POWER_ADDR: &str = "POWER_ADDR";
/// Oscilloscope address
pub const SCOPE_IP: &str = "SCOPE_IP";

/// Keys with a meaning to the built-in instrument commands
pub const KNOWN_KEYS: [&str; 3] = [RES_PORT, POWER_ADDR, SCOPE_IP];

/// Endpoint settings keyed by upper-cased name; last write wins
#[derive(Debug, Default, Clone)]
pub struct ConfigStore {
    entries: HashMap<String, String>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from the configuration file's `[endpoints]` table
    pub fn from_endpoints(endpoints: &EndpointsConfig) -> Self {
        let mut store = Self::new();
        let seeds = [
            (RES_PORT, &endpoints.res_port),
            (POWER_ADDR, &endpoints.power_addr),
            (SCOPE_IP, &endpoints.scope_ip),
        ];
        for (key, value) in seeds {
            if let Some(value) = value {
                store.set(key, value);
            }
        }
        store
    }

    /// Store a value. Unknown keys are kept as well.
    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_uppercase(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&key.to_uppercase()).map(String::as_str)
    }

    /// Whether a key is one the instrument commands consult
    pub fn is_known(key: &str) -> bool {
        KNOWN_KEYS.contains(&key.to_uppercase().as_str())
    }
}
