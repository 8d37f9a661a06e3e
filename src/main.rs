#[tokio::main]
async fn main() -> anyhow::Result<()> {
    keystone_sync::run().await
}
