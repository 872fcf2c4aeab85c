//! Workflow Example
//!
//! Three agents pass a document through `draft -> review -> publish` steps of
//! one workflow. A router sends urgent notes to the lead, a handler audits
//! every workflow envelope, and the workflow's history and statistics are
//! printed at the end.

use std::time::Duration;

use switchboard::{
    patterns::{ConditionalRouter, STEP_ID_KEY, WorkflowMessenger},
    *,
};

const WORKFLOW: &str = "release-7";

#[tokio::main]
async fn main() -> Result {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let broker = Broker::<String>::new(Config::default().with_max_history(100));
    broker.start().await?;

    let log_step = |envelope: Envelope<String>| async move {
        tracing::info!(
            step = envelope.meta.get(STEP_ID_KEY).unwrap_or("-"),
            from = %envelope.sender(),
            "Audit"
        );
        Ok(())
    };
    let audit = Handler::new(MessageFilter::new().workflow(WORKFLOW), log_step);
    broker.register_handler(audit.with_description("workflow audit"));

    let workflow = WorkflowMessenger::new(&broker);
    let router = ConditionalRouter::new(&broker)
        .rule(
            |e: &Envelope<String>| e.priority() <= Priority::High,
            "lead",
        )
        .fallback("backlog");

    for agent in ["writer", "reviewer", "publisher", "lead"] {
        broker.register_agent(agent);
    }

    let brief = "write release notes".to_string();
    workflow.send_step(WORKFLOW, "draft", "lead", "writer", brief);
    let steps = [
        ("writer", "reviewer", "review"),
        ("reviewer", "publisher", "publish"),
    ];
    for (me, next, step) in steps {
        let Some(mut task) = broker.receive(me, Some(Duration::from_secs(1))).await else {
            break;
        };
        broker.process_message_handlers(&mut task).await;
        println!("{me} handled: {}", task.payload());
        let done = format!("{} (done by {me})", task.payload());
        workflow.send_step(WORKFLOW, step, me, next, done);
    }

    router.route(
        Envelope::new("publisher", "typo in headline".to_string())
            .with_priority(Priority::Critical)
            .in_workflow(WORKFLOW),
    );
    workflow.broadcast_step(WORKFLOW, "done", "publisher", "release is out".into());

    println!("--- history of {WORKFLOW}");
    for envelope in workflow.history(WORKFLOW) {
        println!("{envelope}");
    }
    if let Some(stats) = workflow.stats(WORKFLOW) {
        let participants: Vec<_> = stats.participants.iter().map(|p| p.name()).collect();
        println!("{} messages between {participants:?}", stats.message_count);
    }

    broker.shutdown().await;
    Ok(())
}
