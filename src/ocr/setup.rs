use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";
const ENG_TRAINEDDATA: &str = "eng.traineddata";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

const COMMON_EXECUTABLES: [&str; 5] = [
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

const SYSTEM_TESSDATA: [&str; 7] = [
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];

/// Returns the directory for storing Tesseract files
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pressure-spotter")
        .join("tesseract")
}

fn has_eng_data(dir: &Path) -> bool {
    dir.join(ENG_TRAINEDDATA).exists()
}

/// Finds the Tesseract executable, checking our local dir first, then system
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = get_tesseract_dir().join(EXECUTABLE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
    {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    COMMON_EXECUTABLES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds the tessdata directory
pub fn find_tessdata_dir() -> Result<PathBuf> {
    let prefix = std::env::var("TESSDATA_PREFIX").ok().map(PathBuf::from);
    tessdata_candidates(prefix)
        .into_iter()
        .find(|dir| has_eng_data(dir))
        .ok_or_else(|| {
            anyhow!("tessdata directory not found. Please ensure eng.traineddata is available.")
        })
}

/// Search order: local data dir, `TESSDATA_PREFIX` (and its `tessdata`
/// child), then the usual system locations.
fn tessdata_candidates(prefix: Option<PathBuf>) -> Vec<PathBuf> {
    let mut candidates = vec![get_tesseract_dir().join("tessdata")];
    if let Some(prefix) = prefix {
        candidates.push(prefix.join("tessdata"));
        candidates.insert(1, prefix);
    }
    candidates.extend(SYSTEM_TESSDATA.iter().map(PathBuf::from));
    candidates
}

/// Ensures English trained data is available, downloading it into the local
/// data dir when no installed copy is found.
pub fn ensure_tessdata() -> Result<PathBuf> {
    if let Ok(dir) = find_tessdata_dir() {
        log::info!("Tessdata found at: {}", dir.display());
        return Ok(dir);
    }

    let tessdata_dir = get_tesseract_dir().join("tessdata");
    fs::create_dir_all(&tessdata_dir)
        .with_context(|| format!("Failed to create {}", tessdata_dir.display()))?;
    download_tessdata(&tessdata_dir)?;
    Ok(tessdata_dir)
}

/// Downloads English trained data
fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let eng_url = format!("{}/{}", TESSDATA_REPO, ENG_TRAINEDDATA);
    let eng_path = tessdata_dir.join(ENG_TRAINEDDATA);

    log::info!("Downloading {}...", ENG_TRAINEDDATA);

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&eng_url)
        .header("User-Agent", "pressure-spotter")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            ENG_TRAINEDDATA,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&eng_path)?;
    file.write_all(&bytes)?;

    log::info!("Downloaded {} ({} bytes)", ENG_TRAINEDDATA, bytes.len());

    Ok(())
}
