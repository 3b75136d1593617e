use gdchat_core::error::{ChatError, Result};
use gdchat_core::transcript::TranscriptExporter;
use std::fs;
use std::path::PathBuf;

/// Saves transcripts as text files in a fixed directory.
#[derive(Debug, Clone)]
pub struct FileTranscriptExporter {
    dir: PathBuf,
}

impl FileTranscriptExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TranscriptExporter for FileTranscriptExporter {
    fn export(&self, file_name: &str, contents: &str) -> Result<String> {
        if file_name.contains(['/', '\\']) {
            return Err(ChatError::io(format!("invalid file name: {file_name}")));
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        fs::write(&path, contents)?;
        tracing::info!("[Export] Wrote {} bytes to {}", contents.len(), path.display());
        Ok(path.display().to_string())
    }
}
