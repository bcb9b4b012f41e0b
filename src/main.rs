//! shell-capture binary entry point.

use std::process::ExitCode;

use futures_util::StreamExt;
use shell_capture::cli::{self, Args, OutputMode};
use shell_capture::{logging, Defaults, Output, ShellCaptureError, ShellCommand};
use tracing::{debug, error};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run 'shell-capture --help' for usage information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let defaults = match Defaults::load(&args) {
        Ok(defaults) => defaults,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    let _ = logging::init_with_filter(defaults.log_filter());
    debug!("shell-capture v{}", env!("CARGO_PKG_VERSION"));

    match run(&args, &defaults).await {
        Ok(output) => ExitCode::from(exit_status(&output)),
        Err(ShellCaptureError::Args(e)) => {
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            // Unless quiet, the child's stderr has already been forwarded.
            let forwarded = matches!(e, ShellCaptureError::Command(_)) && !defaults.quiet;
            if !forwarded || args.output != OutputMode::Stream {
                eprintln!("error: {}", e.to_string().trim_end());
            }
            match e {
                ShellCaptureError::Command(err) => ExitCode::from(exit_status(err.output())),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(args: &Args, defaults: &Defaults) -> shell_capture::Result<Output> {
    if args.command.is_empty() {
        return Err(cli::ArgsError::MissingCommand.into());
    }

    let mut cmd =
        ShellCommand::with_defaults(args.command_line(), defaults).envs(args.env.clone());
    if let Some(ref dir) = args.cwd {
        cmd = cmd.cwd(dir);
    }

    if args.output != OutputMode::Stream {
        cmd = cmd.quiet();
    }
    let lines = match args.output {
        OutputMode::Lines => Some(cmd.stream_lines()?),
        _ => None,
    };
    // The child gets no input from us; close its stdin right away.
    drop(cmd.stdin());

    match args.output {
        OutputMode::Stream => cmd.output().await,
        OutputMode::Text => {
            let output = cmd.output().await?;
            print!("{}", output);
            Ok(output)
        }
        OutputMode::Json => {
            let output = cmd.output().await?;
            match output.json() {
                Some(value) => {
                    let pretty = serde_json::to_string_pretty(&value)
                        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                    println!("{}", pretty);
                    Ok(output)
                }
                None => Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "command output is not valid JSON",
                )
                .into()),
            }
        }
        OutputMode::Lines => {
            if let Some(mut lines) = lines {
                while let Some(line) = lines.next().await {
                    println!("{}", serde_json::Value::String(line));
                }
            }
            cmd.output().await
        }
    }
}

/// Map a child's outcome onto this process's exit status.
fn exit_status(output: &Output) -> u8 {
    if let Some(signal) = output.signal() {
        return u8::try_from(128 + signal).unwrap_or(u8::MAX);
    }
    match output.exit_code() {
        code @ 0..=255 => u8::try_from(code).unwrap_or(1),
        _ => 1,
    }
}
