use std::fmt;
use std::io::ErrorKind;
use std::process::Stdio;

use mp_core::{Error, OcrEngine, OcrOptions, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs the `tesseract` CLI, piping the encoded image through stdin.
pub struct TesseractEngine {
    binary: String,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    fn args(options: &OcrOptions) -> Vec<String> {
        vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            options.language.clone(),
            "--psm".to_string(),
            options.psm.to_string(),
        ]
    }

    /// First line of `tesseract --version`.
    pub async fn version(&self) -> Result<String> {
        let output = self.run_plain(&["--version"]).await?;
        Ok(output.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Installed language packs, from `tesseract --list-langs`.
    pub async fn languages(&self) -> Result<Vec<String>> {
        let output = self.run_plain(&["--list-langs"]).await?;
        Ok(output
            .lines()
            .skip(1)
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    async fn run_plain(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(Error::Ocr(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        // older releases print the version banner on stderr
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            text = String::from_utf8_lossy(&output.stderr).into_owned();
        }
        Ok(text)
    }

    fn spawn_error(&self, err: std::io::Error) -> Error {
        if err.kind() == ErrorKind::NotFound {
            Error::Ocr(format!("{} binary not found on PATH", self.binary))
        } else {
            Error::Ocr(format!("failed to run {}: {}", self.binary, err))
        }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl fmt::Debug for TesseractEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TesseractEngine").field("binary", &self.binary).finish()
    }
}

#[async_trait::async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "Tesseract"
    }

    async fn recognize(&self, image: &[u8], options: &OcrOptions) -> Result<String> {
        debug!("Running {} on {} bytes ({}, psm {})", self.binary, image.len(), options.language, options.psm);

        let mut child = Command::new(&self.binary)
            .args(Self::args(options))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Ocr("tesseract stdin unavailable".to_string()))?;

        let write = async move {
            stdin.write_all(image).await?;
            stdin.shutdown().await
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Error::Ocr(if stderr.is_empty() {
                format!("tesseract exited with {}", output.status)
            } else {
                stderr
            }));
        }
        // tesseract may stop reading early on unreadable input; its exit status is authoritative
        if let Err(e) = written {
            debug!("tesseract closed stdin early: {}", e);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
