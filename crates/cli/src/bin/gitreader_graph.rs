use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    gitreader_cli::main_entry().await
}
