//! Sync tool config writer.
//!
//! ## `write_sync_config` protocol
//!
//! 1. Render content (caller, via [`render_sync_config`]).
//! 2. SHA-256 hash the rendered content and the file already on disk.
//! 3. Identical → skip, tighten the existing file to 0600, report
//!    [`WriteResult::Unchanged`].
//! 4. Write to `<path>.offsite.tmp` (mode 0600 on Unix).
//! 5. Rename to final path (atomic on POSIX).

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use offsite_core::{settings::SyncToolSettings, ConnectionProfile, SecretBundle};
use offsite_renderer::{ConfigContext, TemplateEngine};

use crate::error::{io_err, ConfigurationError};

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of writing the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File already held exactly this content.
    Unchanged { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path } | WriteResult::Unchanged { path } => path,
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Build both connection profiles from `bundle` and render the config text.
///
/// Every missing credential key is reported at once, before anything touches
/// the filesystem.
pub fn render_sync_config(
    bundle: &SecretBundle,
    settings: &SyncToolSettings,
) -> Result<String, ConfigurationError> {
    let (source, destination) = ConnectionProfile::pair_from_bundle(bundle)?;
    let ctx = ConfigContext::new(&source, &destination, settings)?;
    let engine = TemplateEngine::new(settings.template_dir.as_deref())?;
    Ok(engine.render_sync_config(&ctx)?)
}

// ---------------------------------------------------------------------------
// Atomic write
// ---------------------------------------------------------------------------

fn digest(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Atomically write `content` to `path`, skipping the write if unchanged.
pub fn write_sync_config(path: &Path, content: &str) -> Result<WriteResult, ConfigurationError> {
    let tmp = PathBuf::from(format!("{}.offsite.tmp", path.display()));
    write_with_tmp(path, content, &tmp)
}

fn write_with_tmp(
    path: &Path,
    content: &str,
    tmp: &Path,
) -> Result<WriteResult, ConfigurationError> {
    let wanted = digest(content.as_bytes());
    match std::fs::read(path) {
        Ok(existing) if digest(&existing) == wanted => {
            tracing::debug!("unchanged: {}", path.display());
            restrict_to_owner(path)?;
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(path, e)),
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    write_private(tmp, content)?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("wrote sync tool config: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

#[cfg(unix)]
fn write_private(path: &Path, content: &str) -> Result<(), ConfigurationError> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| io_err(path, e))
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<(), ConfigurationError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<(), ConfigurationError> {
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &str) -> Result<(), ConfigurationError> {
    std::fs::write(path, content).map_err(|e| io_err(path, e))
}

/// Delete the config file. Returns `false` if it did not exist.
pub fn remove_sync_config(path: &Path) -> Result<bool, ConfigurationError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::info!("removed sync tool config: {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_err(path, e)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
