//! Release archive download and extraction.

use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::runtime::block_on;

pub trait ArtifactFetcher: Send + Sync {
    /// Download the archive at `url` and unpack it into `destination`.
    /// With `overwrite`, existing files are replaced.
    fn fetch(&self, url: &str, destination: &Path, overwrite: bool) -> anyhow::Result<()>;
}

/// Downloads zip archives over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpArtifactFetcher {
    timeout: Duration,
}

impl HttpArtifactFetcher {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn download(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("webdeploy/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let response = client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download release archive from {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Failed to download release archive: HTTP {} from {}",
                response.status(),
                url
            );
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;

        Ok(bytes.to_vec())
    }
}

impl Default for HttpArtifactFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactFetcher for HttpArtifactFetcher {
    fn fetch(&self, url: &str, destination: &Path, overwrite: bool) -> anyhow::Result<()> {
        url::Url::parse(url).with_context(|| format!("Invalid archive URL: {}", url))?;

        let data = block_on(self.download(url))??;
        tracing::debug!(url, bytes = data.len(), "release archive downloaded");

        let written = extract_zip(&data, destination, overwrite)?;
        tracing::info!(
            destination = %destination.display(),
            files = written,
            "release archive unpacked"
        );
        Ok(())
    }
}

/// Extract a zip archive into `dest`, returning the number of files written.
///
/// Entries whose names escape `dest` are skipped. When every entry sits under
/// one top-level directory (release archives ship as `whmcs/...`), that
/// directory is stripped. Without `overwrite`, an existing file is an error.
pub fn extract_zip(data: &[u8], dest: &Path, overwrite: bool) -> anyhow::Result<usize> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create extract directory: {}", dest.display()))?;

    let cursor = std::io::Cursor::new(data);
    let mut archive = zip::ZipArchive::new(cursor).context("Failed to read release archive as zip")?;
    let root = shared_root(&mut archive)?;
    if let Some(root) = &root {
        tracing::debug!(root = %root.display(), "stripping archive top-level directory");
    }
    let mut written = 0;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .with_context(|| format!("Failed to read zip entry {}", i))?;

        let Some(name) = file.enclosed_name() else {
            tracing::warn!(entry = file.name(), "skipping zip entry with unsafe path");
            continue;
        };
        let relative = match &root {
            Some(root) => name.strip_prefix(root).unwrap_or(&name).to_path_buf(),
            None => name,
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let outpath = dest.join(relative);

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)
                .with_context(|| format!("Failed to create directory: {}", outpath.display()))?;
            continue;
        }

        if outpath.exists() && !overwrite {
            anyhow::bail!(
                "Refusing to overwrite existing file: {}",
                outpath.display()
            );
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create parent directory: {}", parent.display())
            })?;
        }

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read zip entry: {}", file.name()))?;

        let mut outfile = std::fs::File::create(&outpath)
            .with_context(|| format!("Failed to create file: {}", outpath.display()))?;
        outfile
            .write_all(&buffer)
            .with_context(|| format!("Failed to write file: {}", outpath.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))
                    .with_context(|| {
                        format!("Failed to set permissions on {}", outpath.display())
                    })?;
            }
        }

        written += 1;
    }

    Ok(written)
}

/// The single top-level directory every safe entry lives under, if any.
fn shared_root<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> anyhow::Result<Option<PathBuf>> {
    let mut root: Option<PathBuf> = None;

    for i in 0..archive.len() {
        let file = archive
            .by_index(i)
            .with_context(|| format!("Failed to read zip entry {}", i))?;
        let Some(name) = file.enclosed_name() else {
            continue;
        };
        let mut components = name.components();
        let Some(first) = components.next() else {
            continue;
        };
        if components.next().is_none() && !file.is_dir() {
            return Ok(None);
        }
        let first = PathBuf::from(first.as_os_str());
        match &root {
            Some(existing) if *existing != first => return Ok(None),
            Some(_) => {}
            None => root = Some(first),
        }
    }

    Ok(root)
}
