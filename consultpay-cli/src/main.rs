use anyhow::Result;
use consultpay_cli::app;

#[tokio::main]
async fn main() -> Result<()> {
    app::run().await
}
