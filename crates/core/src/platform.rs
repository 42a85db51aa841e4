//! Platform detection for per-platform managed files
//!
//! Provides OS and architecture information using standard Unix conventions:
//! - macOS → `"darwin"` (kernel name)
//! - Linux → `"linux"`
//! - Windows → `"windows"`
//!
//! Platform info is cached on first access.

use std::sync::LazyLock;

/// Current platform information (cached)
///
/// # Example
/// ```
/// use rcm_core::platform::CURRENT_PLATFORM;
///
/// assert!(!CURRENT_PLATFORM.os.is_empty());
/// ```
pub static CURRENT_PLATFORM: LazyLock<Platform> = LazyLock::new(Platform::detect);

/// Platform information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// OS: "darwin" (macOS), "linux", "windows", "unknown"
    pub os: &'static str,
    /// CPU architecture: "x86_64", "aarch64", etc.
    pub arch: &'static str,
}

impl Platform {
    /// The platform this binary runs on
    pub fn detect() -> Self {
        Self {
            os: Self::detect_os(),
            arch: std::env::consts::ARCH,
        }
    }

    /// Check a managed file's platform filter against this platform
    ///
    /// An empty filter means "every platform".
    pub fn allowed_by<'a, I>(&self, platforms: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut platforms = platforms.into_iter().peekable();
        if platforms.peek().is_none() {
            return true;
        }
        platforms.any(|p| p.eq_ignore_ascii_case(self.os))
    }

    const fn detect_os() -> &'static str {
        #[cfg(target_os = "macos")]
        {
            "darwin"
        }

        #[cfg(target_os = "linux")]
        {
            "linux"
        }

        #[cfg(target_os = "windows")]
        {
            "windows"
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            "unknown"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> Platform {
        Platform {
            os: "linux",
            arch: "x86_64",
        }
    }

    #[test]
    fn test_empty_filter_allows_everything() {
        let none: Vec<String> = Vec::new();
        assert!(linux().allowed_by(&none));
    }

    #[test]
    fn test_filter_matches_current_os() {
        let filter = vec!["darwin".to_string(), "Linux".to_string()];
        assert!(linux().allowed_by(&filter));
    }

    #[test]
    fn test_filter_excludes_other_os() {
        let filter = vec!["windows".to_string()];
        assert!(!linux().allowed_by(&filter));
    }

    #[test]
    fn test_detect_is_cached_and_consistent() {
        assert_eq!(*CURRENT_PLATFORM, Platform::detect());
    }
}
