//! Command assembly macro.

/// Build a [`ShellCommand`](crate::ShellCommand) from a format string.
///
/// Literal fragments are used as written; every interpolated value is
/// rendered with `Display` and then quoted for the host shell, so it
/// always reaches the command as a single word.
///
/// ```
/// use shell_capture::sh;
///
/// let file = "my notes.txt";
/// let cmd = sh!("wc -l {}", file);
/// # #[cfg(unix)]
/// assert_eq!(cmd.command_line(), "wc -l 'my notes.txt'");
/// ```
#[macro_export]
macro_rules! sh {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::shell(format!($fmt $(, $crate::quote(&$arg.to_string()))*))
    };
}
