/*!
 * Tests for file utility functions
 */

use std::fs;
use std::path::Path;

use anyhow::Result;
use polysub::file_utils::{FileManager, FileType};
use crate::common;

/// Test that file_exists returns true for existing files
#[test]
fn test_file_exists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "test_file_exists.tmp", "test content")?;

    assert!(FileManager::file_exists(&test_file));
    assert!(!FileManager::file_exists(temp_dir.path().join("missing.tmp")));
    Ok(())
}

/// Test that generate_output_path creates the correct path
#[test]
fn test_generate_output_path_withValidInputs_shouldCreateCorrectPath() {
    let stem = FileManager::output_stem("/tmp/input/video.mkv", None);
    let output_path = FileManager::generate_output_path(&stem, Path::new("/tmp/output"), "fr", ".srt");

    assert_eq!(output_path, Path::new("/tmp/output/video.fr.srt"));
}

/// Test that stems whose case mapping changes byte length never split a character
#[test]
fn test_output_stem_withMultibyteCaseFolding_shouldNotPanic() {
    // KELVIN SIGN lowercases to a one-byte 'k'
    assert_eq!(FileManager::output_stem("/x/a.\u{212A}o.srt", Some("ko")), "a.\u{212A}o");
    assert_eq!(FileManager::output_stem("/x/\u{212A}\u{212A}.srt", Some("kk")), "\u{212A}\u{212A}");
    assert_eq!(FileManager::output_stem("/x/лекция.ко.srt", Some("ko")), "лекция.ко");
    assert_eq!(FileManager::output_stem("/x/lecture.ko.srt", Some("KO")), "lecture");
}

/// Test file type detection by extension and by content
#[test]
fn test_detect_file_type_withVariousFiles_shouldClassify() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let srt = common::create_test_subtitle(temp_dir.path(), "talk.en.srt")?;
    let sniffed = common::create_test_subtitle(temp_dir.path(), "talk.subtitles")?;
    let wav = common::create_test_wav(temp_dir.path(), "talk.WAV", 0.5, 8000)?;
    let notes = common::create_test_file(temp_dir.path(), "notes.txt", "just some notes")?;

    assert_eq!(FileManager::detect_file_type(&srt)?, FileType::Subtitle);
    assert_eq!(FileManager::detect_file_type(&sniffed)?, FileType::Subtitle);
    assert_eq!(FileManager::detect_file_type(&wav)?, FileType::Media);
    assert_eq!(FileManager::detect_file_type(&notes)?, FileType::Unknown);
    assert!(FileManager::detect_file_type(temp_dir.path().join("gone.mp4")).is_err());
    Ok(())
}

/// Test that media discovery recurses and ignores other files
#[test]
fn test_find_media_files_withNestedDirs_shouldReturnSortedMedia() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("season1");
    fs::create_dir_all(&nested)?;
    common::create_test_wav(&nested, "b.wav", 0.1, 8000)?;
    common::create_test_wav(temp_dir.path(), "a.wav", 0.1, 8000)?;
    common::create_test_subtitle(temp_dir.path(), "a.en.srt")?;

    let files = FileManager::find_media_files(temp_dir.path())?;

    assert_eq!(files.len(), 2);
    assert!(files[0].ends_with("a.wav"));
    assert!(files[1].ends_with("season1/b.wav"));
    Ok(())
}

/// Test that existing outputs are kept unless forced
#[test]
fn test_write_output_withExistingFile_shouldRespectForce() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("out").join("talk.fr.srt");

    assert!(FileManager::write_output(&path, "first", false)?);
    assert!(!FileManager::write_output(&path, "second", false)?);
    assert_eq!(FileManager::read_to_string(&path)?, "first");

    assert!(FileManager::write_output(&path, "third", true)?);
    assert_eq!(FileManager::read_to_string(&path)?, "third");
    Ok(())
}
