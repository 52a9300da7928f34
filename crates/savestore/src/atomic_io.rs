use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes `text` next to `path` first and renames it into place, so readers
/// see either the old file or the complete new one.
pub(crate) fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path_for(path);
    if let Err(error) = fs::write(&staging, text.as_bytes()) {
        let _ = fs::remove_file(&staging);
        return Err(error);
    }
    promote(&staging, path)
}

/// Copies `source` over `target` through the same staging step as
/// [`write_text_atomic`].
pub(crate) fn copy_atomic(source: &Path, target: &Path) -> io::Result<()> {
    let staging = staging_path_for(target);
    if let Err(error) = fs::copy(source, &staging) {
        let _ = fs::remove_file(&staging);
        return Err(error);
    }
    promote(&staging, target)
}

/// Returns `Ok(false)` when there was nothing to remove.
pub(crate) fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

// rename() replaces an existing target, so `final_path` is never absent.
fn promote(staging: &Path, final_path: &Path) -> io::Result<()> {
    if let Err(error) = fs::rename(staging, final_path) {
        let _ = fs::remove_file(staging);
        return Err(error);
    }
    Ok(())
}

fn staging_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("record");
    // Unique per process and per call so concurrent writers never share one.
    let staging_name = format!(
        "{file_name}.{}.{}.tmp",
        process::id(),
        STAGING_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    match path.parent() {
        Some(parent) => parent.join(staging_name),
        None => PathBuf::from(staging_name),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn write_creates_parent_and_leaves_no_staging_file() {
        let temp = TempDir::new().expect("temp");
        let dir = temp.path().join("nested");
        let path = dir.join("slot.sav");
        write_text_atomic(&path, "{}").expect("write");

        assert_eq!(fs::read_to_string(&path).expect("read"), "{}");
        assert_eq!(file_names(&dir), vec!["slot.sav".to_string()]);
    }

    #[test]
    fn staging_names_are_unique_per_process_and_call() {
        let path = Path::new("saves").join("slot.sav");
        let first = staging_path_for(&path);
        let second = staging_path_for(&path);
        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(Path::new("saves")));

        let name = first.file_name().and_then(|name| name.to_str()).expect("name");
        let prefix = format!("slot.sav.{}.", process::id());
        assert!(name.starts_with(&prefix), "{name}");
        assert!(name.ends_with(".tmp"), "{name}");
    }

    #[test]
    fn failed_promote_cleans_up_staging() {
        let temp = TempDir::new().expect("temp");
        let source = temp.path().join("slot.sav");
        let target = temp.path().join("slot.sav.backup");
        fs::write(&source, "new").expect("source");
        fs::create_dir(&target).expect("block target");

        assert!(copy_atomic(&source, &target).is_err());
        assert!(target.is_dir());
        assert_eq!(
            file_names(temp.path()),
            vec!["slot.sav".to_string(), "slot.sav.backup".to_string()]
        );
    }

    #[test]
    fn write_replaces_existing_content() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("slot.sav");
        write_text_atomic(&path, "first").expect("first");
        write_text_atomic(&path, "second").expect("second");
        assert_eq!(fs::read_to_string(&path).expect("read"), "second");
    }

    #[test]
    fn copy_overwrites_target() {
        let temp = TempDir::new().expect("temp");
        let source = temp.path().join("slot.sav");
        let target = temp.path().join("slot.sav.backup");
        fs::write(&source, "new").expect("source");
        fs::write(&target, "old").expect("target");

        copy_atomic(&source, &target).expect("copy");
        assert_eq!(fs::read_to_string(&target).expect("read"), "new");
        assert!(source.exists());
    }

    #[test]
    fn remove_reports_missing_files() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("gone.sav");
        assert!(!remove_if_exists(&path).expect("missing"));
        fs::write(&path, "x").expect("write");
        assert!(remove_if_exists(&path).expect("present"));
        assert!(!path.exists());
    }
}
