use std::time::Duration;

use switchboard::*;

#[tokio::main]
async fn main() -> Result {
    let broker = Broker::<String>::default();
    broker.start().await?;

    // Direct message: the recipient's mailbox is created on first use
    broker.send(Envelope::direct("main", "greeter", "World".to_string()));

    let timeout = Some(Duration::from_secs(1));
    if let Some(envelope) = broker.receive("greeter", timeout).await {
        let sender = envelope.sender();
        println!("Hello, {}! (from {sender})", envelope.payload());
    }

    // Stops background maintenance and wakes any pending receive
    broker.shutdown().await;
    Ok(())
}
