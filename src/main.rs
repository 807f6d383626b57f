use sunhome_bridge::options::Options;
use sunhome_bridge::prelude::*;

#[tokio::main]
async fn main() {
    let options = Options::new();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        let _ = shutdown_tx.send(());
    });

    if let Err(err) = sunhome_bridge::app(shutdown_rx, options).await {
        error!("{:?}", err);
        std::process::exit(255);
    }
}
