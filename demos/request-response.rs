//! Request/Response Example
//!
//! A calculator agent answers requests sent through [`RequestResponse`]. The
//! client parks on `request` until the answer arrives or the timeout passes;
//! the last request goes to an agent that never answers.

use std::{sync::Arc, time::Duration};

use switchboard::{patterns::RequestResponse, *};

#[derive(Payload, Clone, Debug)]
enum Calc {
    Add(i64, i64),
    Mul(i64, i64),
    Result(i64),
}

async fn calculator(broker: Broker<Calc>, rr: Arc<RequestResponse<Calc>>) {
    while let Some(request) = broker.receive("calculator", None).await {
        let answer = match request.payload() {
            Calc::Add(a, b) => a + b,
            Calc::Mul(a, b) => a * b,
            Calc::Result(_) => continue,
        };
        tracing::info!(request = %request.payload().type_info(), answer, "Answering");
        let result = Calc::Result(answer);
        rr.respond(&request, "calculator", result).await;
    }
}

#[tokio::main]
async fn main() -> Result {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let broker = Broker::<Calc>::default();
    broker.start().await?;
    let rr = Arc::new(RequestResponse::new(&broker));

    let server = tokio::spawn(calculator(broker.clone(), rr.clone()));

    for question in [Calc::Add(2, 3), Calc::Mul(6, 7)] {
        let label = format!("{question:?}");
        match rr
            .request("client", "calculator", question, Duration::from_secs(1))
            .await
        {
            Some(answer) => println!("{label} = {:?}", answer.payload()),
            None => println!("{label} got no answer"),
        }
    }

    let patience = Duration::from_millis(200);
    let unanswered = rr
        .request("client", "sleeper", Calc::Add(1, 1), patience)
        .await;
    println!(
        "sleeper answered: {}, pending requests: {}",
        unanswered.is_some(),
        rr.pending_count()
    );

    broker.shutdown().await;
    server.await.map_err(Error::external)?;
    Ok(())
}
