//! Pluggable captcha recognition.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::utils::prompt;

/// Turns a captcha image into the text the portal expects.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, image: &[u8]) -> Result<String>;
}

/// Human in the loop: saves the image and asks on the console.
pub struct PromptSolver {
    dir: PathBuf,
}

impl Default for PromptSolver {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl PromptSolver {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl CaptchaSolver for PromptSolver {
    async fn solve(&self, image: &[u8]) -> Result<String> {
        let path = self.dir.join(format!("vtop-captcha-{}.img", nanoid::nanoid!(8)));
        tokio::fs::write(&path, image)
            .await
            .with_context(|| format!("Failed to write captcha image to {}", path.display()))?;
        info!(path = %path.display(), bytes = image.len(), "captcha image saved");

        let text = prompt(&format!("Captcha image: {}\nCaptcha text: ", path.display()))
            .await
            .context("Failed to read captcha text")?;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            debug!(error = %e, "could not remove captcha image");
        }

        if text.is_empty() {
            bail!("No captcha text entered");
        }
        Ok(text)
    }
}

/// Runs an external recognizer: image bytes on stdin, text on stdout.
pub struct CommandSolver {
    program: String,
    args: Vec<String>,
}

impl CommandSolver {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a command line on whitespace: the first word is the program.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self::new(program, words.collect()))
    }
}

#[async_trait]
impl CaptchaSolver for CommandSolver {
    async fn solve(&self, image: &[u8]) -> Result<String> {
        debug!(program = %self.program, args = ?self.args, "running captcha recognizer");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to start captcha recognizer '{}'", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image)
                .await
                .context("Failed to send image to captcha recognizer")?;
        }

        let output = child
            .wait_with_output()
            .await
            .context("Captcha recognizer did not finish")?;
        if !output.status.success() {
            bail!("Captcha recognizer exited with {}", output.status);
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            bail!("Captcha recognizer produced no text");
        }
        Ok(text)
    }
}
