//! Where secret values come from.
//!
//! The config file only names secrets; their values are read at sync time from
//! the process environment (after `.env` has been loaded).

/// Lookup of secret values by name
pub trait SecretSource: Send + Sync {
    /// Value for `name`, or `None` when unset or empty
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads secrets from the current process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl SecretSource for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|value| !value.is_empty())
    }
}

/// Fixed values for engine tests
#[cfg(test)]
impl SecretSource for std::collections::HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).filter(|value| !value.is_empty()).cloned()
    }
}
