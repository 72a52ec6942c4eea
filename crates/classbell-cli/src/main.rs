use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    classbell_cli::run().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}
