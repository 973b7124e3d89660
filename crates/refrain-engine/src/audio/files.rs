use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every file under `dir` whose extension is one of `extensions`.
///
/// Extensions match case-insensitively and may be given with or without a
/// leading dot. Symlinks are not followed and unreadable entries are
/// skipped. The result is sorted so runs visit sources in a stable order.
pub fn find_files(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let wanted: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect();

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| has_extension(path, &wanted))
        .collect();

    files.sort();
    log::debug!("Found {} candidate file(s) under {}", files.len(), dir.display());
    files
}

fn has_extension(path: &Path, wanted: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| wanted.iter().any(|w| *w == ext))
}
