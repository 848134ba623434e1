#[tokio::main]
async fn main() -> anyhow::Result<()> {
    boatparty_server::start_server().await
}
