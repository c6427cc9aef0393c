//! File operations derived from the backend primitives.
//!
//! Every [`SandboxBackend`] gets these for free: listing goes through
//! `execute`, reading through `download_files`, and writing/editing through
//! `download_files` + `upload_files`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::fmt::Write as _;

use super::SandboxBackend;

/// Higher-level file access for agents.
#[async_trait]
pub(crate) trait FileOps: SandboxBackend {
    /// Lists a directory, one entry per item; directories end with `/`.
    async fn ls(&self, dir: &str) -> Result<Vec<String>> {
        let response = self
            .execute(&format!("ls -1Ap {}", shell_words::quote(dir)))
            .await?;
        if response.exit_code != 0 {
            bail!("Cannot list {dir}: {}", response.output.trim());
        }

        Ok(response
            .output
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Reads up to `limit` lines starting after line `offset`, numbered like
    /// `cat -n`.
    async fn read(&self, path: &str, offset: usize, limit: usize) -> Result<String> {
        let bytes = download_one(self, path).await?;
        let text = String::from_utf8_lossy(&bytes);
        if text.is_empty() {
            return Ok(String::new());
        }

        let total = text.lines().count();
        if offset >= total {
            bail!("Line offset {offset} exceeds file length ({total} lines) for {path}");
        }

        let mut rendered = String::new();
        for (index, line) in text.lines().enumerate().skip(offset).take(limit) {
            if !rendered.is_empty() {
                rendered.push('\n');
            }
            write!(&mut rendered, "{:>6}\t{}", index + 1, line).unwrap();
        }
        Ok(rendered)
    }

    /// Creates a new file. Existing files are never overwritten.
    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let probe = self
            .execute(&format!("test -e {}", shell_words::quote(path)))
            .await?;
        if probe.exit_code == 0 {
            bail!("File already exists: {path}");
        }

        upload_one(self, path, content.as_bytes().to_vec()).await
    }

    /// Replaces `old` with `new` and returns the number of replacements.
    ///
    /// `old` must be unique in the file unless `replace_all` is set.
    async fn edit(&self, path: &str, old: &str, new: &str, replace_all: bool) -> Result<usize> {
        if old.is_empty() {
            bail!("Cannot edit {path}: search string is empty");
        }

        let bytes = download_one(self, path).await?;
        let text = String::from_utf8(bytes).with_context(|| format!("{path} is not UTF-8"))?;

        let occurrences = text.matches(old).count();
        if occurrences == 0 {
            bail!("String not found in {path}");
        }
        if occurrences > 1 && !replace_all {
            bail!(
                "String occurs {occurrences} times in {path}; \
                 use replace_all or include more surrounding context"
            );
        }

        let (updated, replaced) = if replace_all {
            (text.replace(old, new), occurrences)
        } else {
            (text.replacen(old, new, 1), 1)
        };
        upload_one(self, path, updated.into_bytes()).await?;

        Ok(replaced)
    }
}

impl<T: SandboxBackend + ?Sized> FileOps for T {}

async fn download_one<B: SandboxBackend + ?Sized>(backend: &B, path: &str) -> Result<Vec<u8>> {
    let response = backend
        .download_files(&[path.to_string()])
        .await?
        .pop()
        .with_context(|| format!("No download response for {path}"))?;

    if let Some(error) = response.error {
        bail!("Failed to read {path}: {error}");
    }
    response
        .content
        .with_context(|| format!("No content returned for {path}"))
}

async fn upload_one<B: SandboxBackend + ?Sized>(
    backend: &B,
    path: &str,
    content: Vec<u8>,
) -> Result<()> {
    let response = backend
        .upload_files(&[(path.to_string(), content)])
        .await?
        .pop()
        .with_context(|| format!("No upload response for {path}"))?;

    match response.error {
        Some(error) => bail!("Failed to write {path}: {error}"),
        None => Ok(()),
    }
}
