//! Configuration types for map analysis.
//!
//! Settings are read from a JSON file (every field optional) and passed down
//! as an immutable value to each pipeline stage. There is no global instance:
//! two maps analyzed with the same config always see the same thresholds.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::records::{Region, SymbolKind};

/// A rectangle in relative coordinates (0.0 to 1.0).
/// Used for map areas that scale with image size, such as the title header.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    /// X position of top-left corner (0.0 = left edge, 1.0 = right edge)
    pub x: f32,
    /// Y position of top-left corner (0.0 = top edge, 1.0 = bottom edge)
    pub y: f32,
    /// Width as fraction of image width
    pub width: f32,
    /// Height as fraction of image height
    pub height: f32,
}

impl Default for RelativeRect {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.1,
            height: 0.1,
        }
    }
}

impl RelativeRect {
    /// Converts to absolute pixels for a `w` × `h` image, clamped to bounds.
    pub fn to_region(&self, w: u32, h: u32) -> Region {
        let x0 = ((self.x * w as f32) as u32).min(w);
        let y0 = ((self.y * h as f32) as u32).min(h);
        let rw = ((self.width * w as f32) as u32).min(w - x0);
        let rh = ((self.height * h as f32) as u32).min(h - y0);
        Region::new(x0, y0, rw, rh)
    }
}

/// Inclusive RGB box. A pixel matches when every channel is inside its bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    pub min: [u8; 3],
    pub max: [u8; 3],
}

impl ColorRange {
    pub fn contains(&self, rgb: [u8; 3]) -> bool {
        (0..3).all(|c| rgb[c] >= self.min[c] && rgb[c] <= self.max[c])
    }
}

/// Thresholds for turning the map into one binary mask.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskProfile {
    /// Linearly stretch luma to the full 0-255 range before thresholding
    pub stretch_contrast: bool,
    /// Lowest luma kept (inclusive)
    pub min_luma: u8,
    /// Highest luma kept (inclusive)
    pub max_luma: u8,
    /// Square kernel radius for erode-then-dilate cleanup, 0 disables
    pub open_radius: u8,
    /// Blobs with fewer pixels than this are removed as speckle
    pub min_blob_area: u32,
}

impl Default for MaskProfile {
    fn default() -> Self {
        Self {
            stretch_contrast: false,
            min_luma: 120,
            max_luma: 255,
            open_radius: 0,
            min_blob_area: 1,
        }
    }
}

/// Mask generation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// Profile for the L/H glyph mask
    pub symbols: MaskProfile,
    /// Profile for the X marker mask
    pub markers: MaskProfile,
    /// Map areas ignored entirely (title header, legend)
    pub exclude_regions: Vec<RelativeRect>,
    /// Cartography colors ignored (coastlines, grid, isobars)
    pub exclude_colors: Vec<ColorRange>,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            symbols: MaskProfile {
                stretch_contrast: true,
                min_luma: 220,
                max_luma: 255,
                open_radius: 0,
                min_blob_area: 4,
            },
            markers: MaskProfile {
                stretch_contrast: false,
                min_luma: 120,
                max_luma: 255,
                open_radius: 0,
                min_blob_area: 2,
            },
            // Valid-time header in the top-left corner of every chart
            exclude_regions: vec![RelativeRect {
                x: 0.0,
                y: 0.0,
                width: 0.38,
                height: 0.11,
            }],
            exclude_colors: Vec::new(),
        }
    }
}

/// L/H glyph acceptance settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolConfig {
    pub min_area: u32,
    pub max_area: u32,
    /// Smallest allowed bounding-box side in pixels
    pub min_size: u32,
    /// Largest allowed bounding-box side in pixels
    pub max_size: u32,
    /// Width / height bounds
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Required luma separation between glyph and surrounding box (0.0-1.0)
    pub min_contrast: f32,
    /// Best glyph score must reach this to be accepted (0.0-1.0)
    pub match_threshold: f32,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            min_area: 20,
            max_area: 2000,
            min_size: 6,
            max_size: 60,
            min_aspect: 0.4,
            max_aspect: 1.5,
            min_contrast: 0.1,
            match_threshold: 0.5,
        }
    }
}

/// X marker acceptance settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub min_area: u32,
    pub max_area: u32,
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Fraction of the bounding box covered by marker pixels
    pub min_fill: f32,
    pub max_fill: f32,
    /// Markers whose anchor is closer than this to the image edge are ignored
    pub border_margin: u32,
    pub match_threshold: f32,
    /// Candidates closer than this are consolidated into one marker
    pub merge_distance: f32,
    /// Symbol and pressure text regions are grown by this many pixels before
    /// excluding markers that touch them
    pub claim_padding: u32,
    pub sensitive: SensitivePass,
}

/// Second marker pass over a blurred, re-thresholded mask.
///
/// Catches small or smudged markers the shape pass drops. Only size, aspect
/// and border limits apply; hits near a shape-pass marker are duplicates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivePass {
    pub enabled: bool,
    /// Gaussian blur sigma applied to the marker mask
    pub blur_sigma: f32,
    /// Blurred pixels above this are set
    pub threshold: u8,
    pub min_area: u32,
    pub max_area: u32,
    pub min_aspect: f32,
    pub max_aspect: f32,
    pub border_margin: u32,
    /// Hits closer than this to an existing marker are dropped
    pub duplicate_distance: f32,
}

impl Default for SensitivePass {
    fn default() -> Self {
        Self {
            enabled: false,
            blur_sigma: 0.8,
            threshold: 100,
            min_area: 2,
            max_area: 150,
            min_aspect: 0.3,
            max_aspect: 3.0,
            border_margin: 5,
            duplicate_distance: 14.0,
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            min_area: 5,
            max_area: 100,
            min_aspect: 0.5,
            max_aspect: 2.0,
            min_fill: 0.2,
            max_fill: 0.8,
            border_margin: 10,
            match_threshold: 0.5,
            merge_distance: 10.0,
            claim_padding: 3,
            sensitive: SensitivePass::default(),
        }
    }
}

/// Which pixels of the OCR crop are text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPolarity {
    /// Light text on a dark map
    Bright,
    /// Dark text on a light map
    Dark,
}

/// One OCR misread substitution applied before digits are extracted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitConfusion {
    pub from: char,
    pub to: char,
}

fn default_confusions() -> Vec<DigitConfusion> {
    [
        ('O', '0'),
        ('o', '0'),
        ('Q', '0'),
        ('D', '0'),
        ('I', '1'),
        ('l', '1'),
        ('i', '1'),
        ('|', '1'),
        ('Z', '2'),
        ('S', '5'),
        ('B', '8'),
    ]
    .into_iter()
    .map(|(from, to)| DigitConfusion { from, to })
    .collect()
}

/// Pressure value extraction settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Run value extraction at all
    pub enabled: bool,
    /// Search window size in pixels
    pub window_width: u32,
    pub window_height: u32,
    /// Window center relative to the symbol anchor
    pub offset_x: i32,
    pub offset_y: i32,
    pub text_polarity: TextPolarity,
    /// Luma threshold separating text from background in the crop
    pub text_threshold: u8,
    /// Words below this recognition confidence (0-100) are ignored
    pub confidence_floor: f32,
    pub min_digits: usize,
    pub max_digits: usize,
    /// Plausible pressure range in hPa (inclusive)
    pub min_pressure: u32,
    pub max_pressure: u32,
    /// Apply `confusions` before extracting digits
    pub correct_confusions: bool,
    pub confusions: Vec<DigitConfusion>,
    /// Tesseract page segmentation mode
    pub page_segmentation: u8,
    /// Characters Tesseract may emit; empty disables the whitelist. The
    /// `from` side of `confusions` is added while correction is on.
    pub char_whitelist: String,
    /// Explicit Tesseract executable; searched for when unset
    pub tesseract_path: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_width: 80,
            window_height: 30,
            offset_x: 0,
            // Pressure is printed 20px below the glyph center
            offset_y: 20,
            text_polarity: TextPolarity::Bright,
            text_threshold: 120,
            confidence_floor: 30.0,
            min_digits: 3,
            max_digits: 4,
            min_pressure: 950,
            max_pressure: 1050,
            correct_confusions: true,
            confusions: default_confusions(),
            page_segmentation: 7,
            char_whitelist: "0123456789".to_string(),
            tesseract_path: None,
        }
    }
}

impl OcrConfig {
    /// Whitelist handed to the recognizer.
    ///
    /// With correction on, characters the confusion table maps from are
    /// allowed too, otherwise the recognizer could never emit them.
    pub fn recognizer_whitelist(&self) -> String {
        let mut whitelist = self.char_whitelist.clone();
        if whitelist.is_empty() || !self.correct_confusions {
            return whitelist;
        }
        for rule in &self.confusions {
            if !whitelist.contains(rule.from) {
                whitelist.push(rule.from);
            }
        }
        whitelist
    }
}

/// How markers are matched to systems.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationMode {
    /// Every marker independently picks its nearest system
    #[default]
    Greedy,
    /// Closest pairs first; each system keeps at most one marker
    OneToOne,
}

/// Marker-to-system association settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Maximum marker-to-symbol distance in pixels
    pub max_radius: f32,
    /// Candidates whose distances differ by at most this are a tie
    pub tie_tolerance: f32,
    pub mode: AssociationMode,
    /// Symbol kinds markers may attach to
    pub allowed_kinds: Vec<SymbolKind>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            max_radius: 100.0,
            tie_tolerance: 0.5,
            mode: AssociationMode::Greedy,
            allowed_kinds: vec![SymbolKind::Low, SymbolKind::High],
        }
    }
}

/// Complete analysis configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotterConfig {
    pub mask: MaskConfig,
    pub symbols: SymbolConfig,
    pub markers: MarkerConfig,
    pub ocr: OcrConfig,
    pub connector: ConnectorConfig,
    /// Emit debug imagery alongside the records
    pub debug: bool,
}

impl SpotterConfig {
    /// Load config from file, or return defaults if it is missing or invalid.
    pub fn load(config_path: &Path) -> Self {
        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(contents) => match Self::from_json_str(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", config_path.display());
                        return config;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse config: {:#}. Using defaults.", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read config: {}. Using defaults.", e);
                }
            }
        } else {
            log::info!(
                "{} not found. Using default config.",
                config_path.display()
            );
        }
        Self::default()
    }

    /// Like [`Self::load`], but writes the defaults to `config_path` first when
    /// no file exists there, so users have a file to edit.
    pub fn load_or_create(config_path: &Path) -> Self {
        if !config_path.exists() {
            match Self::save_default(config_path) {
                Ok(()) => log::info!("Wrote default config to {}", config_path.display()),
                Err(e) => log::warn!("Could not write default config: {:#}", e),
            }
        }
        Self::load(config_path)
    }

    /// Strict parse: malformed JSON or inconsistent ranges are errors.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents).context("Invalid config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Save default config to file (for reference).
    pub fn save_default(config_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;
        fs::write(config_path, json)
            .with_context(|| format!("Failed to write {}", config_path.display()))
    }

    /// Rejects inverted ranges and out-of-domain thresholds.
    pub fn validate(&self) -> Result<()> {
        for (name, profile) in [
            ("mask.symbols", &self.mask.symbols),
            ("mask.markers", &self.mask.markers),
        ] {
            if profile.min_luma > profile.max_luma {
                return Err(anyhow!("{}: min_luma is above max_luma", name));
            }
        }

        let s = &self.symbols;
        check_range("symbols area", s.min_area as f32, s.max_area as f32)?;
        check_range("symbols size", s.min_size as f32, s.max_size as f32)?;
        check_range("symbols aspect", s.min_aspect, s.max_aspect)?;
        check_unit("symbols.match_threshold", s.match_threshold)?;

        let m = &self.markers;
        check_range("markers area", m.min_area as f32, m.max_area as f32)?;
        check_range("markers aspect", m.min_aspect, m.max_aspect)?;
        check_range("markers fill", m.min_fill, m.max_fill)?;
        check_unit("markers.match_threshold", m.match_threshold)?;
        let sp = &m.sensitive;
        check_range("markers.sensitive area", sp.min_area as f32, sp.max_area as f32)?;
        check_range("markers.sensitive aspect", sp.min_aspect, sp.max_aspect)?;
        if sp.enabled && sp.blur_sigma <= 0.0 {
            return Err(anyhow!("markers.sensitive.blur_sigma must be positive"));
        }

        let o = &self.ocr;
        check_range("ocr digits", o.min_digits as f32, o.max_digits as f32)?;
        check_range("ocr pressure", o.min_pressure as f32, o.max_pressure as f32)?;
        if o.window_width == 0 || o.window_height == 0 {
            return Err(anyhow!("ocr search window must be non-empty"));
        }

        if self.connector.max_radius < 0.0 || self.connector.tie_tolerance < 0.0 {
            return Err(anyhow!("connector distances must be non-negative"));
        }

        Ok(())
    }
}

fn check_range(name: &str, min: f32, max: f32) -> Result<()> {
    if min > max {
        return Err(anyhow!("{}: minimum {} exceeds maximum {}", name, min, max));
    }
    Ok(())
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within 0.0-1.0, got {}", name, value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_relative_rect_to_region() {
        let rect = RelativeRect {
            x: 0.1,
            y: 0.25,
            width: 0.5,
            height: 0.1,
        };
        assert_eq!(rect.to_region(100, 200), Region::new(10, 50, 50, 20));
    }

    #[test]
    fn test_relative_rect_clamps() {
        let rect = RelativeRect {
            x: 0.9,
            y: 0.9,
            width: 0.5,
            height: 0.5,
        };
        assert_eq!(rect.to_region(100, 100), Region::new(90, 90, 10, 10));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            SpotterConfig::from_json_str(r#"{ "connector": { "max_radius": 50.0 }, "debug": true }"#)
                .unwrap();

        assert_eq!(config.connector.max_radius, 50.0);
        assert_eq!(config.connector.tie_tolerance, 0.5);
        assert!(config.debug);
        assert_eq!(config.ocr, OcrConfig::default());
    }

    #[test]
    fn test_enum_fields_parse() {
        let config = SpotterConfig::from_json_str(
            r#"{ "connector": { "mode": "one_to_one", "allowed_kinds": ["Low"] },
                 "ocr": { "text_polarity": "dark" } }"#,
        )
        .unwrap();

        assert_eq!(config.connector.mode, AssociationMode::OneToOne);
        assert_eq!(config.connector.allowed_kinds, vec![SymbolKind::Low]);
        assert_eq!(config.ocr.text_polarity, TextPolarity::Dark);
    }

    #[test]
    fn test_sensitive_pass_config() {
        let config = SpotterConfig::from_json_str(
            r#"{ "markers": { "sensitive": { "enabled": true, "threshold": 90 } } }"#,
        )
        .unwrap();
        assert!(config.markers.sensitive.enabled);
        assert_eq!(config.markers.sensitive.threshold, 90);
        assert_eq!(config.markers.sensitive.min_area, 2);

        let bad = SpotterConfig::from_json_str(
            r#"{ "markers": { "sensitive": { "enabled": true, "blur_sigma": 0.0 } } }"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_ranges() {
        let mut config = SpotterConfig::default();
        config.ocr.min_pressure = 1100;
        assert!(config.validate().is_err());

        let mut config = SpotterConfig::default();
        config.mask.markers.min_luma = 200;
        config.mask.markers.max_luma = 100;
        assert!(config.validate().is_err());

        assert!(SpotterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = SpotterConfig::load(&dir.path().join("nope.json"));
        assert_eq!(config, SpotterConfig::default());
    }

    #[test]
    fn test_load_invalid_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(SpotterConfig::load(&path), SpotterConfig::default());
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = SpotterConfig::load_or_create(&path);

        assert_eq!(config, SpotterConfig::default());
        assert!(path.exists());
        let written = SpotterConfig::from_json_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, SpotterConfig::default());
    }

    #[test]
    fn test_load_or_create_keeps_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "debug": true }"#).unwrap();

        let config = SpotterConfig::load_or_create(&path);

        assert!(config.debug);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{ "debug": true }"#);
    }

    #[test]
    fn test_load_or_create_unwritable_path_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("config.json");
        assert_eq!(SpotterConfig::load_or_create(&path), SpotterConfig::default());
    }

    #[test]
    fn test_save_default_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        SpotterConfig::save_default(&path).unwrap();
        let loaded = SpotterConfig::from_json_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(loaded, SpotterConfig::default());
    }

    #[test]
    fn test_recognizer_whitelist_includes_confusable_letters() {
        let config = OcrConfig::default();
        let whitelist = config.recognizer_whitelist();

        assert!(whitelist.starts_with("0123456789"));
        for c in ['O', 'l', 'I', 'B', 'S'] {
            assert!(whitelist.contains(c), "missing {}", c);
        }
        assert_eq!(whitelist.matches('0').count(), 1);
    }

    #[test]
    fn test_recognizer_whitelist_plain_when_correction_off() {
        let config = OcrConfig {
            correct_confusions: false,
            ..OcrConfig::default()
        };
        assert_eq!(config.recognizer_whitelist(), "0123456789");

        let open = OcrConfig {
            char_whitelist: String::new(),
            ..OcrConfig::default()
        };
        assert_eq!(open.recognizer_whitelist(), "");
    }

    #[test]
    fn test_color_range_contains() {
        let range = ColorRange {
            min: [0, 0, 100],
            max: [80, 80, 255],
        };
        assert!(range.contains([10, 20, 200]));
        assert!(!range.contains([10, 20, 50]));
    }
}
