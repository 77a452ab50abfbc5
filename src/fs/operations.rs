use std::path::{Path, PathBuf};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use tokio::{fs::File, io::AsyncWriteExt};

/// Replaces the contents of `path` with `data`. Data is written into a sibling temporary file
/// which is then renamed over the target, so a crash leaves either the old or the new value.
pub async fn replace_file(path: &Path, data: &[u8]) -> Result<()> {
    let temporary = temporary_path(path);

    let mut file = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temporary)
        .await?;

    // Two writers racing on the same key must not interleave inside the temporary file.
    file.lock_exclusive()?;
    let written = write_and_sync(&mut file, data).await;
    file.unlock_async().await?;
    written?;
    drop(file);

    tokio::fs::rename(&temporary, path).await?;
    Ok(())
}

async fn write_and_sync(file: &mut File, data: &[u8]) -> Result<()> {
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
