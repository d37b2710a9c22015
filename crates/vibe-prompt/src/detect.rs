//! Auto-detection interface.
//!
//! Detection heuristics live outside the gateway core; only the interface
//! and a minimal extension-based detector are provided here.

use std::path::Path;

use vibe_core::ContextOverrides;

/// Partial context produced by a detector, with the signals it relied on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedContext {
    pub context: ContextOverrides,
    pub signals: Vec<String>,
}

/// Infers context from the source text, file name and working directory.
pub trait ContextDetector: Send + Sync {
    fn detect(&self, source: &str, file_name: Option<&str>, working_dir: &Path) -> DetectedContext;
}

/// Detector that never reports anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDetection;

impl ContextDetector for NoDetection {
    fn detect(&self, _source: &str, _file_name: Option<&str>, _working_dir: &Path) -> DetectedContext {
        DetectedContext::default()
    }
}

/// Maps a file extension to a language.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileNameDetector;

fn language_for_extension(ext: &str) -> Option<&'static str> {
    let language = match ext {
        "rs" => "rust",
        "py" | "pyi" => "python",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "tsx" | "mts" => "typescript",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "rb" => "ruby",
        "php" => "php",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "swift" => "swift",
        "sh" | "bash" => "shell",
        "tf" | "hcl" => "terraform",
        "yml" | "yaml" => "yaml",
        _ => return None,
    };
    Some(language)
}

impl ContextDetector for FileNameDetector {
    fn detect(&self, _source: &str, file_name: Option<&str>, _working_dir: &Path) -> DetectedContext {
        let Some(ext) = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
        else {
            return DetectedContext::default();
        };

        match language_for_extension(&ext.to_ascii_lowercase()) {
            Some(language) => DetectedContext {
                context: ContextOverrides {
                    language: Some(language.to_string()),
                    ..Default::default()
                },
                signals: vec![format!("file-extension:{}", ext)],
            },
            None => DetectedContext::default(),
        }
    }
}
