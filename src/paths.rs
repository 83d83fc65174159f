use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Map file extensions picked up from input directories.
pub const MAP_EXTENSIONS: [&str; 4] = ["gif", "jpg", "jpeg", "png"];

/// Name of the combined track table written once per batch.
pub const TRACK_TABLE_NAME: &str = "weather_systems.csv";

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the default config path: `<exe_dir>/config.json`
pub fn get_config_path() -> PathBuf {
    get_exe_dir().join("config.json")
}

/// Output files for one map, all inside the output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct MapOutputPaths {
    /// `<map>_systems.csv`
    pub table: PathBuf,
    /// `<map>.json`
    pub json: PathBuf,
    /// `<map>_debug.png`
    pub overlay: PathBuf,
    /// `<map>_mask.png`
    pub mask: PathBuf,
}

impl MapOutputPaths {
    pub fn new(output_dir: &Path, map_name: &str) -> Self {
        Self {
            table: output_dir.join(format!("{}_systems.csv", map_name)),
            json: output_dir.join(format!("{}.json", map_name)),
            overlay: output_dir.join(format!("{}_debug.png", map_name)),
            mask: output_dir.join(format!("{}_mask.png", map_name)),
        }
    }
}

/// Map name for a file: its stem.
pub fn map_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_map_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MAP_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expands the command line inputs into map files.
///
/// Files are taken as given. Directories contribute their map files (not
/// recursive), sorted by name.
pub fn collect_map_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("Failed to read directory {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_map_file(p))
                .collect();
            found.sort();
            log::debug!("{}: {} map files", input.display(), found.len());
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_map_output_paths() {
        let paths = MapOutputPaths::new(Path::new("out"), "0600_UTC_Wed_03_JAN");
        assert_eq!(paths.table, Path::new("out/0600_UTC_Wed_03_JAN_systems.csv"));
        assert_eq!(paths.json, Path::new("out/0600_UTC_Wed_03_JAN.json"));
        assert_eq!(paths.overlay, Path::new("out/0600_UTC_Wed_03_JAN_debug.png"));
        assert_eq!(paths.mask, Path::new("out/0600_UTC_Wed_03_JAN_mask.png"));
    }

    #[test]
    fn test_map_name_is_stem() {
        assert_eq!(map_name(Path::new("maps/1200_UTC_Thu_04_JAN.gif")), "1200_UTC_Thu_04_JAN");
    }

    #[test]
    fn test_collect_map_files_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        for name in ["b.png", "a.GIF", "notes.txt", "c.jpeg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let files = collect_map_files(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.GIF", "b.png", "c.jpeg"]);
    }

    #[test]
    fn test_collect_keeps_explicit_files() {
        let files = collect_map_files(&[PathBuf::from("missing.gif")]).unwrap();
        assert_eq!(files, vec![PathBuf::from("missing.gif")]);
    }

    #[test]
    fn test_collect_missing_dir_is_not_error() {
        // A path that does not exist is treated as a file and fails later on read
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone");
        assert_eq!(collect_map_files(&[missing.clone()]).unwrap(), vec![missing]);
    }
}
