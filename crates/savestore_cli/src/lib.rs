use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use savestore::{
    BindingOverrideStore, FileStatus, GameDataType, LoadSource, SecureStore, StoreConfig,
};

pub const STDIN_MARKER: &str = "-";

#[derive(Debug, Clone, Default)]
pub struct CommonOptions {
    pub save_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Save {
        key: String,
        input: String,
        encrypt: bool,
    },
    Load {
        key: String,
    },
    Inspect {
        key: String,
    },
    Delete {
        key: String,
    },
    BindingsCheck,
}

pub struct Streams<'a, R: Read, W: Write, E: Write> {
    pub stdin: &'a mut R,
    pub stdout: &'a mut W,
    pub stderr: &'a mut E,
}

pub fn build_store(opts: &CommonOptions) -> Result<SecureStore, String> {
    let mut config =
        StoreConfig::from_env().map_err(|error| format!("invalid configuration: {error}"))?;
    if let Some(dir) = &opts.save_dir {
        config.save_dir = dir.clone();
    }
    Ok(SecureStore::new(config))
}

pub fn run<R: Read, W: Write, E: Write>(
    kind: CommandKind,
    opts: &CommonOptions,
    io: Streams<'_, R, W, E>,
) -> Result<(), String> {
    let store = build_store(opts)?;
    match kind {
        CommandKind::Save {
            key,
            input,
            encrypt,
        } => {
            let content = read_input(&input, io.stdin)?;
            let path = store
                .try_save(&key, &content, encrypt)
                .map_err(|error| format!("save '{key}' failed: {error}"))?;
            write_line(io.stdout, &format!("saved {key} -> {}", path.display()))
        }
        CommandKind::Load { key } => {
            let outcome = store.load(&key);
            if outcome.was_tampered {
                write_line(
                    io.stderr,
                    &format!("warning: {key} failed verification (tampered or corrupt)"),
                )?;
            }
            if outcome.source == LoadSource::Backup {
                write_line(io.stderr, &format!("warning: {key} recovered from backup"))?;
            }
            match outcome.data {
                Some(data) => write_line(io.stdout, &data),
                None => Err(format!("no verified data for '{key}'")),
            }
        }
        CommandKind::Inspect { key } => {
            let report = store
                .inspect(&key)
                .map_err(|error| format!("inspect '{key}' failed: {error}"))?;
            write_line(io.stdout, &report.render_human_readable())?;
            if matches!(report.primary, FileStatus::Invalid { .. }) {
                return Err(format!("primary record for '{key}' is invalid"));
            }
            Ok(())
        }
        CommandKind::Delete { key } => {
            let removed = store
                .delete(&key)
                .map_err(|error| format!("delete '{key}' failed: {error}"))?;
            let message = if removed {
                format!("deleted {key}")
            } else {
                format!("nothing stored for {key}")
            };
            write_line(io.stdout, &message)
        }
        CommandKind::BindingsCheck => {
            let (overrides, tampered) = BindingOverrideStore::new(&store, false).load();
            if tampered {
                write_line(
                    io.stderr,
                    &format!(
                        "warning: {} failed verification",
                        GameDataType::InputKeyBindings
                    ),
                )?;
            }
            let duplicates = overrides.duplicates();
            if duplicates.is_empty() {
                return write_line(
                    io.stdout,
                    &format!("ok: {} overrides, no duplicates", overrides.bindings.len()),
                );
            }
            for conflict in &duplicates {
                let actions = conflict
                    .bindings
                    .iter()
                    .map(|binding| format!("{} ({})", binding.action, binding.id))
                    .collect::<Vec<_>>()
                    .join(", ");
                write_line(io.stdout, &format!("duplicate {}: {actions}", conflict.path))?;
            }
            Err(format!("{} duplicate binding path(s)", duplicates.len()))
        }
    }
}

fn read_input<R: Read>(input: &str, stdin: &mut R) -> Result<String, String> {
    if input == STDIN_MARKER {
        let mut content = String::new();
        stdin
            .read_to_string(&mut content)
            .map_err(|error| format!("failed to read stdin: {error}"))?;
        return Ok(content);
    }
    fs::read_to_string(input).map_err(|error| format!("failed to read '{input}': {error}"))
}

fn write_line<W: Write>(out: &mut W, line: &str) -> Result<(), String> {
    writeln!(out, "{line}").map_err(|error| format!("failed to write output: {error}"))
}
