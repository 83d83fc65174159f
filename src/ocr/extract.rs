use anyhow::Result;
use image::GrayImage;
use regex::Regex;

use super::engine::{OcrWord, TextRecognizer};
use super::preprocess::{binarize_text, blank_region, crop, search_window};
use crate::config::OcrConfig;
use crate::records::{PixelPoint, PressureValue, Region, SymbolRecord};

/// A token that survived normalization and the plausibility checks.
#[derive(Debug, Clone, PartialEq)]
struct PressureCandidate {
    text: String,
    value: u32,
    confidence: f32,
    region: Option<Region>,
}

/// Token normalization rules derived from [`OcrConfig`].
pub struct TokenFilter<'a> {
    config: &'a OcrConfig,
    non_digit: Regex,
    digit_count: Regex,
}

impl<'a> TokenFilter<'a> {
    pub fn new(config: &'a OcrConfig) -> Result<Self> {
        let non_digit = Regex::new(r"\D")?;
        let digit_count = Regex::new(&format!(
            r"^\d{{{},{}}}$",
            config.min_digits, config.max_digits
        ))?;
        Ok(Self {
            config,
            non_digit,
            digit_count,
        })
    }

    /// Applies the confusion table (when enabled) and strips non-digits.
    pub fn normalize(&self, token: &str) -> String {
        let corrected: String = if self.config.correct_confusions {
            token
                .chars()
                .map(|c| {
                    self.config
                        .confusions
                        .iter()
                        .find(|rule| rule.from == c)
                        .map_or(c, |rule| rule.to)
                })
                .collect()
        } else {
            token.to_string()
        };
        self.non_digit.replace_all(&corrected, "").into_owned()
    }

    /// Parses a token into a plausible pressure value.
    pub fn parse(&self, token: &str) -> Option<u32> {
        let digits = self.normalize(token);
        if !self.digit_count.is_match(&digits) {
            return None;
        }
        let value: u32 = digits.parse().ok()?;
        (self.config.min_pressure..=self.config.max_pressure)
            .contains(&value)
            .then_some(value)
    }
}

/// Picks the best pressure reading among recognized words.
///
/// Words below the confidence floor are ignored. Among surviving tokens the
/// highest confidence wins; ties go to the earliest token.
pub fn select_pressure(words: &[OcrWord], config: &OcrConfig) -> Result<PressureValue> {
    let filter = TokenFilter::new(config)?;
    let mut best: Option<PressureCandidate> = None;

    for word in words {
        if word.confidence < config.confidence_floor {
            continue;
        }
        for token in word.text.split_whitespace() {
            let Some(value) = filter.parse(token) else {
                continue;
            };
            if best
                .as_ref()
                .is_some_and(|b| b.confidence >= word.confidence)
            {
                continue;
            }
            best = Some(PressureCandidate {
                text: token.to_string(),
                value,
                confidence: word.confidence,
                region: word.region,
            });
        }
    }

    Ok(match best {
        Some(c) => PressureValue {
            raw_text: c.text,
            value: Some(c.value),
            confidence: (c.confidence / 100.0).clamp(0.0, 1.0),
            text_region: c.region,
        },
        None => {
            let seen: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
            PressureValue::unreadable(seen.join(" "))
        }
    })
}

/// Reads the pressure printed next to one symbol.
///
/// `luma` is the grayscale source map. Recognizer failures are logged and
/// reported as an unreadable value; nothing is retried.
pub fn extract_pressure(
    luma: &GrayImage,
    symbol: &SymbolRecord,
    config: &OcrConfig,
    recognizer: &dyn TextRecognizer,
) -> PressureValue {
    match read_pressure(luma, symbol, config, recognizer) {
        Ok(value) => {
            match value.value {
                Some(v) => log::debug!(
                    "Symbol {}: pressure {} (conf {:.2})",
                    symbol.id,
                    v,
                    value.confidence
                ),
                None => log::debug!("Symbol {}: no pressure in {:?}", symbol.id, value.raw_text),
            }
            value
        }
        Err(e) => {
            log::warn!("OCR failed for symbol {}: {:#}", symbol.id, e);
            PressureValue::unreadable("")
        }
    }
}

fn read_pressure(
    luma: &GrayImage,
    symbol: &SymbolRecord,
    config: &OcrConfig,
    recognizer: &dyn TextRecognizer,
) -> Result<PressureValue> {
    let window = search_window(symbol.anchor, config, luma.width(), luma.height());
    if window.is_empty() {
        return Ok(PressureValue::unreadable(""));
    }

    let cropped = crop(luma, window);
    let mut binary = binarize_text(&cropped, config.text_threshold, config.text_polarity);
    blank_region(&mut binary, PixelPoint::new(window.x, window.y), symbol.region);

    let words = recognizer.recognize(&binary)?;

    let mut value = select_pressure(&words, config)?;
    value.text_region = value
        .text_region
        .map(|r| Region::new(r.x + window.x, r.y + window.y, r.width, r.height));
    Ok(value)
}

/// Reads pressures for every symbol, in symbol order.
pub fn extract_values(
    luma: &GrayImage,
    symbols: &[SymbolRecord],
    config: &OcrConfig,
    recognizer: &dyn TextRecognizer,
) -> Vec<PressureValue> {
    symbols
        .iter()
        .map(|symbol| extract_pressure(luma, symbol, config, recognizer))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DigitConfusion;
    use crate::ocr::testing::ScriptedRecognizer;
    use crate::records::SymbolKind;

    fn word(text: &str, confidence: f32) -> OcrWord {
        OcrWord::new(text, confidence)
    }

    fn symbol() -> SymbolRecord {
        SymbolRecord {
            id: 1,
            kind: SymbolKind::Low,
            anchor: PixelPoint::new(100, 100),
            region: Region::new(94, 92, 12, 16),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_value_with_unit_suffix() {
        let config = OcrConfig::default();
        let value = select_pressure(&[word("1012 hPa", 85.0)], &config).unwrap();

        assert_eq!(value.value, Some(1012));
        assert_eq!(value.raw_text, "1012");
        assert!((value.confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_confusions_corrected() {
        let config = OcrConfig::default();
        assert_eq!(select_pressure(&[word("1OO8", 70.0)], &config).unwrap().value, Some(1008));
        assert_eq!(select_pressure(&[word("l0l2", 70.0)], &config).unwrap().value, Some(1012));
        assert_eq!(select_pressure(&[word("99B", 70.0)], &config).unwrap().value, Some(998));

        let strict = OcrConfig {
            correct_confusions: false,
            ..OcrConfig::default()
        };
        assert_eq!(select_pressure(&[word("1OO8", 70.0)], &strict).unwrap().value, None);
    }

    #[test]
    fn test_custom_confusion_rule_applies() {
        let config = OcrConfig::default();
        assert_eq!(select_pressure(&[word("99G", 70.0)], &config).unwrap().value, None);

        let custom = OcrConfig {
            confusions: vec![DigitConfusion { from: 'G', to: '6' }],
            ..OcrConfig::default()
        };
        let value = select_pressure(&[word("99G", 70.0)], &custom).unwrap();
        assert_eq!(value.value, Some(996));
        assert_eq!(value.raw_text, "99G");

        // The custom table replaces the defaults
        assert_eq!(select_pressure(&[word("1OO8", 70.0)], &custom).unwrap().value, None);
    }

    #[test]
    fn test_out_of_range_values_dropped() {
        let config = OcrConfig::default();
        for text in ["1200", "940", "12", "10120"] {
            let value = select_pressure(&[word(text, 95.0)], &config).unwrap();
            assert_eq!(value.value, None, "{} should be rejected", text);
        }
    }

    #[test]
    fn test_present_values_stay_in_range() {
        let config = OcrConfig::default();
        let samples = ["950", "1050", "949", "1051", "0999", "1O5O", "S00", "996 1004"];
        for text in samples {
            if let Some(v) = select_pressure(&[word(text, 90.0)], &config).unwrap().value {
                assert!((950..=1050).contains(&v), "{} gave {}", text, v);
            }
        }
    }

    #[test]
    fn test_low_confidence_words_ignored() {
        let config = OcrConfig::default();
        let value = select_pressure(&[word("1004", 12.0)], &config).unwrap();
        assert_eq!(value.value, None);
        assert_eq!(value.raw_text, "1004");
    }

    #[test]
    fn test_highest_confidence_wins_earliest_on_tie() {
        let config = OcrConfig::default();
        let words = [word("996", 60.0), word("1004", 80.0), word("1008", 80.0)];
        assert_eq!(select_pressure(&words, &config).unwrap().value, Some(1004));
    }

    #[test]
    fn test_extract_pressure_offsets_text_region() {
        let luma = GrayImage::new(300, 300);
        let recognizer = ScriptedRecognizer::words(vec![OcrWord {
            text: "1012".to_string(),
            confidence: 90.0,
            region: Some(Region::new(20, 5, 30, 15)),
        }]);

        let value = extract_pressure(&luma, &symbol(), &OcrConfig::default(), &recognizer);

        assert_eq!(value.value, Some(1012));
        // Window origin is (60, 105)
        assert_eq!(value.text_region, Some(Region::new(80, 110, 30, 15)));
    }

    #[test]
    fn test_recognizer_failure_is_unreadable() {
        let luma = GrayImage::new(300, 300);
        let recognizer = ScriptedRecognizer::failing("engine crashed");

        let value = extract_pressure(&luma, &symbol(), &OcrConfig::default(), &recognizer);

        assert_eq!(value.value, None);
        assert_eq!(value.confidence, 0.0);
    }

    #[test]
    fn test_glyph_region_blanked_before_recognition() {
        // Bright glyph inside the window must not reach the recognizer
        let mut luma = GrayImage::new(300, 300);
        for y in 100..120 {
            for x in 90..110 {
                luma.put_pixel(x, y, image::Luma([255]));
            }
        }
        let mut sym = symbol();
        sym.region = Region::new(90, 100, 20, 20);
        let recognizer = ScriptedRecognizer::words(Vec::new());

        extract_pressure(&luma, &sym, &OcrConfig::default(), &recognizer);

        let seen = recognizer.last_image().unwrap();
        assert!(seen.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_extract_values_one_per_symbol() {
        let luma = GrayImage::new(300, 300);
        let recognizer = ScriptedRecognizer::words(vec![word("1020", 75.0)]);
        let mut second = symbol();
        second.id = 2;
        second.anchor = PixelPoint::new(200, 200);

        let values = extract_values(
            &luma,
            &[symbol(), second],
            &OcrConfig::default(),
            &recognizer,
        );

        assert_eq!(values.len(), 2);
        assert!(values.iter().all(|v| v.value == Some(1020)));
    }
}
