use anyhow::Result;

/// Tracker mutations happen on one logical thread, so the binary never needs more than this.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
