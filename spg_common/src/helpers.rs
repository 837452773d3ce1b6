use std::env;

/// Reads an environment variable, treating empty values as unset.
pub fn env_var_non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}
