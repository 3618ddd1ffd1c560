/*!
 * Language utilities for ISO language codes and translation targets.
 *
 * Source languages are plain ISO 639-1/639-3 codes. Target languages come
 * from a fixed table so every target has a stable file tag, the name the
 * translator is asked for, and the name the user sees.
 */

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use isolang::Language;
use serde::{Deserialize, Serialize};

// @const: (file tag, canonical name, ISO 639-3 code for the autonym lookup)
const SUPPORTED_LANGUAGES: &[(&str, &str, &str)] = &[
    ("en", "English", "eng"),
    ("tr", "Turkish", "tur"),
    ("es", "Spanish", "spa"),
    ("fr", "French", "fra"),
    ("de", "German", "deu"),
    ("it", "Italian", "ita"),
    ("pt", "Portuguese", "por"),
    ("ru", "Russian", "rus"),
    ("ja", "Japanese", "jpn"),
    ("zh-hans", "Chinese (Simplified)", "zho"),
    ("zh-hant", "Chinese (Traditional)", "zho"),
    ("ko", "Korean", "kor"),
    ("ar", "Arabic", "ara"),
    ("hi", "Hindi", "hin"),
    ("bn", "Bengali", "ben"),
    ("ur", "Urdu", "urd"),
    ("id", "Indonesian", "ind"),
    ("vi", "Vietnamese", "vie"),
    ("th", "Thai", "tha"),
    ("nl", "Dutch", "nld"),
    ("el", "Greek", "ell"),
    ("sv", "Swedish", "swe"),
    ("no", "Norwegian", "nor"),
    ("da", "Danish", "dan"),
    ("fi", "Finnish", "fin"),
    ("pl", "Polish", "pol"),
    ("uk", "Ukrainian", "ukr"),
    ("cs", "Czech", "ces"),
    ("ro", "Romanian", "ron"),
    ("hu", "Hungarian", "hun"),
    ("bg", "Bulgarian", "bul"),
    ("he", "Hebrew", "heb"),
    ("sw", "Swahili", "swa"),
    ("ms", "Malay", "msa"),
    ("fil", "Filipino", "fil"),
    ("fa", "Persian", "fas"),
    ("ta", "Tamil", "tam"),
    ("te", "Telugu", "tel"),
    ("kn", "Kannada", "kan"),
    ("ml", "Malayalam", "mal"),
    ("mr", "Marathi", "mar"),
    ("gu", "Gujarati", "guj"),
    ("pa", "Punjabi", "pan"),
];

// ISO 639-2/B codes that differ from their 639-2/T form
const PART2B_TO_PART2T: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

// @struct: One translation target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetLanguage {
    // @field: Output file tag, e.g. `zh-hans`
    pub code: String,

    // @field: Name given to the translator, e.g. `Chinese (Simplified)`
    pub canonical_name: String,

    // @field: Name shown to the user, e.g. `简体中文`
    pub display_name: String,
}

impl TargetLanguage {
    fn from_entry(entry: &(&str, &str, &str)) -> Self {
        let (code, canonical, part3) = *entry;
        let display = match code {
            "zh-hans" => "简体中文".to_string(),
            "zh-hant" => "繁體中文".to_string(),
            _ => Language::from_639_3(part3)
                .and_then(|lang| lang.to_autonym())
                .unwrap_or(canonical)
                .to_string(),
        };

        TargetLanguage {
            code: code.to_string(),
            canonical_name: canonical.to_string(),
            display_name: display,
        }
    }

    /// Resolve a file tag, canonical name or ISO code to a supported target
    pub fn parse(input: &str) -> Result<Self> {
        let wanted = input.trim().to_lowercase();
        if wanted.is_empty() {
            return Err(anyhow!("Empty target language"));
        }

        let by_tag_or_name = SUPPORTED_LANGUAGES
            .iter()
            .find(|(code, canonical, _)| *code == wanted || canonical.to_lowercase() == wanted);
        if let Some(entry) = by_tag_or_name {
            return Ok(Self::from_entry(entry));
        }

        // Plain Chinese means Simplified
        let tag = match normalize_to_part1_or_part2t(&wanted) {
            Ok(code) if code == "zh" => "zh-hans".to_string(),
            Ok(code) => code,
            Err(_) => return Err(anyhow!("Unsupported target language: {}", input)),
        };

        SUPPORTED_LANGUAGES
            .iter()
            .find(|(code, _, _)| *code == tag)
            .map(Self::from_entry)
            .ok_or_else(|| anyhow!("Unsupported target language: {}", input))
    }
}

impl FromStr for TargetLanguage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.code)
    }
}

/// Every supported target, in table order
pub fn supported_languages() -> Vec<TargetLanguage> {
    SUPPORTED_LANGUAGES.iter().map(TargetLanguage::from_entry).collect()
}

fn part2b_to_part2t(code: &str) -> Option<&'static str> {
    PART2B_TO_PART2T
        .iter()
        .find(|(b, _)| *b == code)
        .map(|(_, t)| *t)
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let normalized_code = code.trim().to_lowercase();

    if normalized_code.len() == 2 {
        if let Some(lang) = Language::from_639_1(&normalized_code) {
            return Ok(lang.to_639_3().to_string());
        }
    } else if normalized_code.len() == 3 {
        if Language::from_639_3(&normalized_code).is_some() {
            return Ok(normalized_code);
        }
        if let Some(part2t) = part2b_to_part2t(&normalized_code) {
            return Ok(part2t.to_string());
        }
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Normalize a language code to ISO 639-1 (2-letter) format if possible
/// Falls back to ISO 639-2/T if no ISO 639-1 code exists
pub fn normalize_to_part1_or_part2t(code: &str) -> Result<String> {
    let normalized_code = code.trim().to_lowercase();

    if normalized_code.len() == 2 {
        if Language::from_639_1(&normalized_code).is_some() {
            return Ok(normalized_code);
        }
    } else if normalized_code.len() == 3 {
        let part2t = part2b_to_part2t(&normalized_code).unwrap_or(normalized_code.as_str());

        if let Some(lang) = Language::from_639_3(part2t) {
            if let Some(code_639_1) = lang.to_639_1() {
                return Ok(code_639_1.to_string());
            }
            return Ok(part2t.to_string());
        }
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Check if two language codes represent the same language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}
