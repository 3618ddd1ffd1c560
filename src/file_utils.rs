use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File and directory utilities

// @const: Extensions ffmpeg decodes that we treat as media
const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ogv", "ts", "mts",
    "m2ts", "mp3", "wav", "flac", "m4a", "aac", "ogg", "opus", "wma",
];

// @const: First SRT block
static SRT_SNIFF_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+\s*\r?\n\d{2}:\d{2}:\d{2},\d{3}\s+-->\s+\d{2}:\d{2}:\d{2},\d{3}")
        .expect("valid srt sniff regex")
});

/// Enum representing different file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Subtitle file (SRT)
    Subtitle,
    /// Audio or video file ffmpeg can decode
    Media,
    /// Unknown file type
    Unknown,
}

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @returns: File stem of the input, minus a trailing `.<tag>`
    pub fn output_stem<P: AsRef<Path>>(input_file: P, strip_tag: Option<&str>) -> String {
        let stem = input_file
            .as_ref()
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        match strip_tag {
            Some(tag) if !tag.is_empty() => {
                let suffix = format!(".{}", tag);
                // The cut must fall on a char boundary
                let cut = stem.len().saturating_sub(suffix.len());
                match (stem.get(..cut), stem.get(cut..)) {
                    (Some(head), Some(tail)) if cut > 0 && tail.to_lowercase() == suffix.to_lowercase() => head.to_string(),
                    _ => stem,
                }
            }
            _ => stem,
        }
    }

    // @generates: `<output_dir>/<stem>.<tag>.<extension>`
    pub fn generate_output_path<P: AsRef<Path>>(stem: &str, output_dir: P, tag: &str, extension: &str) -> PathBuf {
        let mut output_filename = stem.to_string();
        output_filename.push('.');
        output_filename.push_str(tag);
        output_filename.push('.');
        output_filename.push_str(extension.trim_start_matches('.'));

        output_dir.as_ref().join(output_filename)
    }

    // @returns: Directory of the input when no output dir is given
    pub fn default_output_dir<P: AsRef<Path>>(input_file: P) -> PathBuf {
        input_file
            .as_ref()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file, creating parent directories
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content).with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Write unless the file exists and `force` is off. Returns whether it wrote.
    pub fn write_output<P: AsRef<Path>>(path: P, content: &str, force: bool) -> Result<bool> {
        let path = path.as_ref();
        if path.exists() && !force {
            warn!("Keeping existing file {:?} (use --force-overwrite to replace it)", path);
            return Ok(false);
        }
        Self::write_to_file(path, content)?;
        debug!("Wrote {:?}", path);
        Ok(true)
    }

    /// Classify a file by extension, falling back to sniffing SRT content
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> Result<FileType> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow!("File does not exist: {:?}", path));
        }

        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy().to_lowercase();
            if ext_str == "srt" {
                return Ok(FileType::Subtitle);
            }
            if MEDIA_EXTENSIONS.contains(&ext_str.as_str()) {
                return Ok(FileType::Media);
            }
        }

        if let Ok(content) = fs::read_to_string(path) {
            if content.contains("-->") && SRT_SNIFF_REGEX.is_match(&content) {
                return Ok(FileType::Subtitle);
            }
        }

        Ok(FileType::Unknown)
    }

    /// Every media file under `dir`, sorted by path
    pub fn find_media_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if path.is_file() && Self::detect_file_type(path)? == FileType::Media {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }
}
