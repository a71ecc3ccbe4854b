//! Environment variable utilities
//!
//! Generic `env_get<T>` for parsing environment variables with defaults,
//! used by the runtime's `SchedulerConfig::from_env`.

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get environment variable as boolean
///
/// Accepts: "1", "true", "yes", "on" (case-insensitive) as true.
/// Everything else set counts as false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Get environment variable as optional value
///
/// Returns `Some(T)` if the variable is set and parses, `None` otherwise.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let v: usize = env_get("VTS_TEST_UNSET_VARIABLE_XYZ", 42);
        assert_eq!(v, 42);
    }

    #[test]
    fn test_env_get_bool_default() {
        assert!(env_get_bool("VTS_TEST_UNSET_VARIABLE_XYZ", true));
        assert!(!env_get_bool("VTS_TEST_UNSET_VARIABLE_XYZ", false));
    }

    #[test]
    fn test_env_get_opt_unset() {
        let v: Option<u64> = env_get_opt("VTS_TEST_UNSET_VARIABLE_XYZ");
        assert_eq!(v, None);
    }
}
