use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use savestore_cli::{run, CommandKind, CommonOptions, Streams};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!(error = %message, "command_failed");
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        print_usage();
        return Ok(());
    }

    let mut options = CommonOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--dir" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --dir".to_string())?;
                options.save_dir = Some(PathBuf::from(value));
                index += 2;
            }
            _ => break,
        }
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[(index + 1)..];
    let kind = parse_command(command, command_args)?;

    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    run(
        kind,
        &options,
        Streams {
            stdin: &mut stdin,
            stdout: &mut stdout,
            stderr: &mut stderr,
        },
    )
}

fn parse_command(command: &str, command_args: &[String]) -> Result<CommandKind, String> {
    match command {
        "save" => {
            let mut positional = Vec::<&String>::new();
            let mut encrypt = false;
            for arg in command_args {
                if arg == "--encrypt" {
                    encrypt = true;
                } else if arg.starts_with("--") {
                    return Err(format!(
                        "unknown save argument '{arg}' (expected --encrypt)"
                    ));
                } else {
                    positional.push(arg);
                }
            }
            let [key, input] = positional.as_slice() else {
                return Err("save requires <key> and <file|->".to_string());
            };
            Ok(CommandKind::Save {
                key: key.to_string(),
                input: input.to_string(),
                encrypt,
            })
        }
        "load" => Ok(CommandKind::Load {
            key: single_key(command, command_args)?,
        }),
        "inspect" => Ok(CommandKind::Inspect {
            key: single_key(command, command_args)?,
        }),
        "delete" => Ok(CommandKind::Delete {
            key: single_key(command, command_args)?,
        }),
        "bindings-check" => {
            if !command_args.is_empty() {
                return Err("bindings-check takes no arguments".to_string());
            }
            Ok(CommandKind::BindingsCheck)
        }
        other => Err(format!("unknown subcommand '{other}'")),
    }
}

fn single_key(command: &str, command_args: &[String]) -> Result<String, String> {
    match command_args {
        [key] => Ok(key.clone()),
        _ => Err(format!("{command} requires exactly one <key>")),
    }
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "savestore_cli - tamper-evident save records",
        "",
        "Usage:",
        "  savestore_cli [--dir <path>] save <key> <file|-> [--encrypt]",
        "  savestore_cli [--dir <path>] load <key>",
        "  savestore_cli [--dir <path>] inspect <key>",
        "  savestore_cli [--dir <path>] delete <key>",
        "  savestore_cli [--dir <path>] bindings-check",
        "",
        "Environment:",
        "  SAVESTORE_DIR         save directory (default LOG/GameData)",
        "  SAVESTORE_SALT        checksum salt",
        "  SAVESTORE_PASSPHRASE  encryption passphrase",
        "  RUST_LOG              log filter (default info)",
    ]
    .join("\n")
}
