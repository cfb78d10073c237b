//! List capturable sources.

use clipmix_platform_core::detect_display_server;

pub async fn run() -> anyhow::Result<()> {
    println!("Display server: {:?}", detect_display_server());
    list().await
}

#[cfg(feature = "gstreamer")]
async fn list() -> anyhow::Result<()> {
    use clipmix_capture_engine::GstCaptureBackend;
    use clipmix_platform_core::CaptureBackend;

    let backend = GstCaptureBackend::new()?;
    let sources = backend.list_sources().await?;
    if sources.is_empty() {
        println!("No capturable sources found.");
        return Ok(());
    }

    println!("{}", "=".repeat(50));
    for source in &sources {
        println!("  {:<24} {:<8} {}", source.id, format!("{:?}", source.kind), source.label);
    }
    Ok(())
}

#[cfg(not(feature = "gstreamer"))]
async fn list() -> anyhow::Result<()> {
    anyhow::bail!("Source discovery needs the `gstreamer` feature")
}
