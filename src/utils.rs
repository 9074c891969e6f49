use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(&format!(
        "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
        label
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Create `path` and its parents unless it already exists
pub fn ensure_directory(path: &Path) -> std::io::Result<std::path::PathBuf> {
    if !path.is_dir() {
        log::debug!("Creating directory {}", path.display());
        fs::create_dir_all(path)?;
    }
    Ok(path.to_path_buf())
}

/// Forward-slash form of a relative path, for comparing against dataset file names
pub fn to_file_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
