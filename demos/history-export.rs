//! History Export Example
//!
//! Sends a few envelopes and writes the broker history to stdout as JSON
//! Lines. Run with `--features serde`.

use std::io;

use switchboard::*;

#[tokio::main]
async fn main() -> Result {
    let broker = Broker::<serde_json::Value>::default();

    broker.subscribe_to_topic("metrics", "cpu");
    broker.send(Envelope::topic("sensor", "cpu", serde_json::json!({ "load": 0.42 })));
    broker.send(
        Envelope::direct("sensor", "alerts", serde_json::json!("disk almost full"))
            .with_kind(MessageKind::Error)
            .with_priority(Priority::High),
    );
    broker.send(Envelope::new("sensor", serde_json::json!(null)));

    let written = broker.export_history(io::stdout().lock())?;
    eprintln!("exported {written} envelopes");
    Ok(())
}
