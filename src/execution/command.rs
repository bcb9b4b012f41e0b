//! Pending command configuration.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Defaults;

/// Shell used when neither the command nor the defaults name one.
#[cfg(unix)]
pub const HOST_DEFAULT_SHELL: &str = "/bin/sh";
/// Shell used when neither the command nor the defaults name one.
#[cfg(windows)]
pub const HOST_DEFAULT_SHELL: &str = "cmd.exe";

/// Settings applied to one invocation before its process starts.
///
/// Every field is optional; unset values fall back to the host defaults
/// when the process is spawned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandConfig {
    /// Shell binary that interprets the command line.
    pub shell: Option<String>,
    /// Working directory override.
    pub working_dir: Option<PathBuf>,
    /// Environment overlay, merged over the inherited environment.
    pub env: HashMap<String, String>,
    /// Maximum run time before the process is killed.
    pub timeout: Option<Duration>,
    /// Suppress live forwarding and diagnostics.
    pub quiet: bool,
    /// Report failures as unsuccessful outputs instead of errors.
    pub nothrow: bool,
}

impl CommandConfig {
    /// Seed a configuration from loaded defaults.
    pub fn from_defaults(defaults: &Defaults) -> Self {
        Self {
            shell: defaults.shell.clone(),
            working_dir: None,
            env: HashMap::new(),
            timeout: defaults.timeout(),
            quiet: defaults.quiet,
            nothrow: defaults.nothrow,
        }
    }

    /// Shell that will actually be spawned.
    pub fn resolved_shell(&self) -> &str {
        self.shell.as_deref().unwrap_or(HOST_DEFAULT_SHELL)
    }

    /// Full environment for the child: inherited variables with the
    /// overlay applied on top. The process environment is never modified.
    pub fn resolved_env(&self) -> HashMap<OsString, OsString> {
        let mut env: HashMap<OsString, OsString> = std::env::vars_os().collect();
        for (key, value) in &self.env {
            env.insert(key.into(), value.into());
        }
        env
    }
}

/// Flag that makes `shell` run a command string.
pub fn shell_flag(shell: &str) -> &'static str {
    // Windows paths must be recognised on every host.
    let name = shell
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(shell)
        .to_ascii_lowercase();

    if name.starts_with("cmd") {
        "/C"
    } else if name.starts_with("powershell") || name.starts_with("pwsh") {
        "-Command"
    } else {
        "-c"
    }
}

/// Quote a value so the host shell treats it as a single literal word.
pub fn quote(value: &str) -> String {
    shell_escape::escape(Cow::Borrowed(value)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CommandConfig::default();
        assert!(config.shell.is_none());
        assert!(config.working_dir.is_none());
        assert!(config.env.is_empty());
        assert!(config.timeout.is_none());
        assert!(!config.quiet);
        assert!(!config.nothrow);
        assert_eq!(config.resolved_shell(), HOST_DEFAULT_SHELL);
    }

    #[test]
    fn test_from_defaults() {
        let defaults = Defaults {
            shell: Some("/bin/bash".into()),
            quiet: true,
            nothrow: true,
            timeout_ms: Some(1500),
            ..Defaults::default()
        };
        let config = CommandConfig::from_defaults(&defaults);
        assert_eq!(config.resolved_shell(), "/bin/bash");
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
        assert!(config.quiet);
        assert!(config.nothrow);
    }

    #[test]
    fn test_resolved_env_overlay_wins() {
        let inherited = std::env::vars().next();
        let mut config = CommandConfig::default();
        config
            .env
            .insert("SHELL_CAPTURE_TEST_ONLY".into(), "overlay".into());
        if let Some((key, _)) = &inherited {
            config.env.insert(key.clone(), "replaced".into());
        }

        let env = config.resolved_env();
        assert_eq!(
            env.get(&OsString::from("SHELL_CAPTURE_TEST_ONLY")),
            Some(&OsString::from("overlay"))
        );
        if let Some((key, _)) = inherited {
            assert_eq!(env.get(&OsString::from(key)), Some(&OsString::from("replaced")));
        }
        assert!(std::env::var_os("SHELL_CAPTURE_TEST_ONLY").is_none());
    }

    #[test]
    fn test_shell_flag() {
        assert_eq!(shell_flag("/bin/sh"), "-c");
        assert_eq!(shell_flag("bash"), "-c");
        assert_eq!(shell_flag("C:\\Windows\\System32\\cmd.exe"), "/C");
        assert_eq!(shell_flag("pwsh"), "-Command");
        assert_eq!(shell_flag("PowerShell.exe"), "-Command");
    }

    #[cfg(unix)]
    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("two words"), "'two words'");
        assert_eq!(quote("it's"), "'it'\\''s'");
    }
}
