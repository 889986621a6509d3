use std::path::Path;
use std::process::Command;

use curator_worker::CuratorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = CuratorConfig::from_env();

    println!(
        "curator-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    ensure_workdir(&config.work_dir).await?;
    ensure_tool("ffmpeg")?;
    ensure_tool("ffprobe")?;

    println!("curator-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;

    // The pipeline creates its run directories here.
    let probe = tempfile::Builder::new()
        .prefix("curator-selfcheck-")
        .tempdir_in(path)
        .map_err(|e| anyhow::anyhow!("work_dir {} is not writable: {}", path.display(), e))?;
    drop(probe);
    Ok(())
}

fn ensure_tool(name: &str) -> anyhow::Result<()> {
    let output = Command::new(name)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available: {}", name, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} -version failed: {:?}",
            name,
            output.status
        ));
    }
    Ok(())
}
