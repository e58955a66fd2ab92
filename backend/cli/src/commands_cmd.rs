//! `slashforge commands`: print the registration manifest.

use anyhow::Result;
use slashforge_config::SlashForgeConfig;

use crate::demo;

pub async fn run(config: &SlashForgeConfig) -> Result<()> {
    let tree = demo::tree(config).await?;
    let manifests = tree.manifests().await;
    println!("{}", serde_json::to_string_pretty(&manifests)?);
    Ok(())
}
