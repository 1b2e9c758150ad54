//! Editor configuration.
//!
//! Plain values with defaults; nothing is read from disk or the environment.

use tilde_term::input::ctrl;
#[cfg(unix)]
use tilde_term::terminal::RawConfig;

/// Tunables for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    /// Program name shown in the banner.
    pub name: String,
    /// Byte drawn at the start of every empty row.
    pub row_marker: u8,
    /// Byte that ends the session.
    pub quit_key: u8,
    /// Raw-mode read timeout in deciseconds. Also the window in which an
    /// escape sequence must arrive to be told apart from a lone Escape.
    pub read_timeout_ds: u8,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            name: "Tilde".to_string(),
            row_marker: b'~',
            quit_key: ctrl(b'q'),
            read_timeout_ds: 1,
        }
    }
}

impl EditorConfig {
    /// The welcome banner, e.g. `Tilde editor -- version 0.1.0`.
    #[must_use]
    pub fn banner(&self) -> String {
        format!("{} editor -- version {}", self.name, env!("CARGO_PKG_VERSION"))
    }

    /// Raw-mode settings derived from this config.
    #[cfg(unix)]
    #[must_use]
    pub const fn raw_config(&self) -> RawConfig {
        RawConfig {
            read_timeout_ds: self.read_timeout_ds,
            min_bytes: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = EditorConfig::default();
        assert_eq!(c.row_marker, b'~');
        assert_eq!(c.quit_key, 0x11);
        assert_eq!(c.read_timeout_ds, 1);
    }

    #[test]
    fn banner_carries_name_and_version() {
        let c = EditorConfig {
            name: "Kite".to_string(),
            ..EditorConfig::default()
        };
        assert_eq!(
            c.banner(),
            format!("Kite editor -- version {}", env!("CARGO_PKG_VERSION"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn raw_config_uses_read_timeout() {
        let c = EditorConfig {
            read_timeout_ds: 5,
            ..EditorConfig::default()
        };
        assert_eq!(
            c.raw_config(),
            RawConfig {
                read_timeout_ds: 5,
                min_bytes: 0
            }
        );
    }
}
