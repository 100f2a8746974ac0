use std::path::{Path, PathBuf};

use tokio::{fs, io::AsyncWriteExt};
use tracing::warn;

/// Sibling temp file used while rewriting `path`: `dir/.name.tmp`.
pub fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "db.json".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Directory holding `path`; a bare file name lives in `.`.
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Replace the file at `path` with `bytes` so that readers only ever see the
/// old or the new contents. The data is synced before the rename, and the
/// directory entry after it.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = temp_path(path);
    let result = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, path).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp).await;
        return result;
    }
    // The new contents are already in place; a failed directory sync only
    // weakens durability across a crash.
    if let Err(e) = sync_dir(parent_dir(path)).await {
        warn!(path = %path.display(), error = %e, "directory sync after rename failed");
    }
    Ok(())
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

// Directories cannot be opened as files here; the rename alone has to do.
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
