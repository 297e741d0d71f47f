use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    context_engine_cli::main_entry().await
}
