/*!
 * Tests for language utility functions
 */

use anyhow::Result;
use polysub::language_utils::{
    TargetLanguage, get_language_name, language_codes_match, normalize_to_part1_or_part2t, normalize_to_part2t,
    supported_languages,
};

/// Test normalization of language codes to ISO 639-2/T format
#[test]
fn test_normalize_to_part2t_withValidCodes_shouldNormalizeCorrectly() -> Result<()> {
    assert_eq!(normalize_to_part2t("en")?, "eng");
    assert_eq!(normalize_to_part2t("fr")?, "fra");
    assert_eq!(normalize_to_part2t("fre")?, "fra");
    assert_eq!(normalize_to_part2t(" DEU ")?, "deu");
    assert!(normalize_to_part2t("xx").is_err());
    Ok(())
}

/// Test that codes prefer their two-letter form
#[test]
fn test_normalize_to_part1_or_part2t_withThreeLetterCode_shouldPreferPart1() -> Result<()> {
    assert_eq!(normalize_to_part1_or_part2t("eng")?, "en");
    assert_eq!(normalize_to_part1_or_part2t("ger")?, "de");
    assert_eq!(normalize_to_part1_or_part2t("fil")?, "fil");
    Ok(())
}

/// Test that equivalent codes across ISO parts match
#[test]
fn test_language_codes_match_withEquivalentCodes_shouldMatch() {
    assert!(language_codes_match("en", "eng"));
    assert!(language_codes_match("ger", "de"));
    assert!(!language_codes_match("es", "pt"));
    assert!(!language_codes_match("en", "nonsense"));
}

/// Test English names for codes
#[test]
fn test_get_language_name_withKnownCodes_shouldReturnEnglishName() -> Result<()> {
    assert_eq!(get_language_name("en")?, "English");
    assert_eq!(get_language_name("jpn")?, "Japanese");
    assert!(get_language_name("zz").is_err());
    Ok(())
}

/// Test that targets carry their file tag and both names
#[test]
fn test_target_language_parse_withJapanese_shouldCarryNames() -> Result<()> {
    let target: TargetLanguage = "ja".parse()?;

    assert_eq!(target.code, "ja");
    assert_eq!(target.canonical_name, "Japanese");
    assert_eq!(target.display_name, "日本語");
    assert_eq!(target.to_string(), "日本語 (ja)");
    Ok(())
}

/// Test that both Chinese scripts are distinct targets
#[test]
fn test_target_language_parse_withChineseScripts_shouldStayDistinct() -> Result<()> {
    let simplified = TargetLanguage::parse("Chinese (Simplified)")?;
    let traditional = TargetLanguage::parse("ZH-HANT")?;
    let plain = TargetLanguage::parse("zh")?;

    assert_eq!(simplified.code, "zh-hans");
    assert_eq!(traditional.code, "zh-hant");
    assert_eq!(plain, simplified);
    assert_ne!(simplified.canonical_name, traditional.canonical_name);
    Ok(())
}

/// Test that the supported list starts with English and covers both scripts
#[test]
fn test_supported_languages_shouldIncludeCommonTargets() {
    let languages = supported_languages();
    let codes: Vec<&str> = languages.iter().map(|l| l.code.as_str()).collect();

    for code in ["en", "fr", "de", "es", "zh-hans", "zh-hant", "ko", "ar"] {
        assert!(codes.contains(&code), "missing {}", code);
    }
    assert!(languages.iter().all(|l| TargetLanguage::parse(&l.code).ok().as_ref() == Some(l)));
}
