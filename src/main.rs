use dest_transformer::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::main().await
}
