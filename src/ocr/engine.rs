use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::{find_tessdata_dir, find_tesseract_executable};
use crate::config::OcrConfig;
use crate::records::Region;

/// Represents a single word from OCR with confidence score
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    /// Recognition confidence, 0 to 100
    pub confidence: f32,
    /// Bounding box inside the recognized image
    pub region: Option<Region>,
}

impl OcrWord {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            region: None,
        }
    }
}

/// Turns a binarized crop (black text on white) into words in reading order.
///
/// Implementations must be usable from several worker threads at once.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, img: &GrayImage) -> Result<Vec<OcrWord>>;
}

/// Runs the Tesseract executable on each crop.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: PathBuf,
    page_segmentation: u8,
    char_whitelist: String,
}

impl TesseractEngine {
    pub fn new(executable: PathBuf, tessdata: PathBuf) -> Self {
        Self {
            executable,
            tessdata,
            page_segmentation: 7,
            char_whitelist: String::new(),
        }
    }

    /// Locates Tesseract and applies the OCR settings.
    pub fn from_config(config: &OcrConfig) -> Result<Self> {
        let executable = match &config.tesseract_path {
            Some(path) => PathBuf::from(path),
            None => find_tesseract_executable()?,
        };
        let tessdata = find_tessdata_dir()?;

        log::info!(
            "Using Tesseract at {} (tessdata: {})",
            executable.display(),
            tessdata.display()
        );

        Ok(Self {
            executable,
            tessdata,
            page_segmentation: config.page_segmentation,
            char_whitelist: config.recognizer_whitelist(),
        })
    }

    fn command(&self, input: &std::path::Path, output_base: &str) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(input)
            .arg(output_base)
            .arg("--tessdata-dir")
            .arg(&self.tessdata)
            .arg("-l")
            .arg("eng")
            .arg("--psm")
            .arg(self.page_segmentation.to_string());
        if !self.char_whitelist.is_empty() {
            cmd.arg("-c")
                .arg(format!("tessedit_char_whitelist={}", self.char_whitelist));
        }
        cmd.arg("tsv");
        cmd
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, img: &GrayImage) -> Result<Vec<OcrWord>> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        // Tesseract appends .tsv to the output base
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let output = self
            .command(temp_input.path(), &output_base)
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_output(&tsv_content))
    }
}

/// Parses Tesseract TSV output into words, keeping reading order.
pub(crate) fn parse_tsv_output(tsv: &str) -> Vec<OcrWord> {
    let mut words = Vec::new();

    for line in tsv.lines().skip(1) {
        // Skip header
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let level: i32 = fields[0].parse().unwrap_or(-1);
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11].trim();

        // Level 5 = word
        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        let bbox: Option<Vec<u32>> = fields[6..10].iter().map(|f| f.parse().ok()).collect();
        let region = bbox.map(|b| Region::new(b[0], b[1], b[2], b[3]));

        words.push(OcrWord {
            text: text.to_string(),
            confidence: conf,
            region,
        });
    }

    words
}
