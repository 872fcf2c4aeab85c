use std::time::Duration;

use switchboard::{
    AgentId, Broker, Config, Envelope, Error, MessageFilter, MessageKind, Priority, Status, now,
};
use tokio::time::Instant;

fn text(s: &str) -> String {
    s.to_string()
}

#[tokio::test]
async fn test_priority_order_then_fifo() {
    let broker = Broker::<String>::default();
    for (payload, priority) in [
        ("low", Priority::Low),
        ("critical", Priority::Critical),
        ("normal-1", Priority::Normal),
        ("background", Priority::Background),
        ("normal-2", Priority::Normal),
        ("high", Priority::High),
    ] {
        assert!(broker.send(Envelope::direct("s", "A", text(payload)).with_priority(priority)));
    }

    let mut order = Vec::new();
    while let Some(envelope) = broker.receive("A", Some(Duration::from_millis(10))).await {
        order.push(envelope.payload().clone());
    }
    let expected = [
        "critical",
        "high",
        "normal-1",
        "normal-2",
        "low",
        "background",
    ];
    assert_eq!(order, expected);
}

#[tokio::test]
async fn test_fan_out_tolerates_full_mailbox() {
    let broker = Broker::<String>::new(Config::default().with_mailbox_capacity(1));
    broker.subscribe_to_topic("X", "jobs");
    broker.subscribe_to_topic("Y", "jobs");
    broker.send(Envelope::direct("s", "Y", text("filler")));

    let copies = broker.try_send(Envelope::topic("s", "jobs", text("job")));
    assert_eq!(copies.ok(), Some(1));
    assert_eq!(broker.queue_len("X"), 1);
    assert_eq!(broker.queue_len("Y"), 1);
    assert_eq!(broker.topic_stats("jobs").unwrap().message_count, 1);
}

#[tokio::test]
async fn test_topic_without_subscribers_fails() {
    let broker = Broker::<String>::default();
    assert!(!broker.send(Envelope::topic("s", "void", text("hello?"))));

    let failed = broker.get_messages(&MessageFilter::new().topic("void"));
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status(), Status::Failed);
}

#[tokio::test]
async fn test_no_route_touches_no_mailbox() {
    let broker = Broker::<String>::default();
    broker.register_agent("A");

    let envelope = Envelope::new("s", text("nowhere")).with_kind(MessageKind::Text);
    assert!(!broker.send(envelope));
    assert_eq!(broker.queue_len("A"), 0);
    assert_eq!(broker.agents().len(), 1);
    assert_eq!(broker.broker_stats().failed, 1);
}

#[tokio::test]
async fn test_expired_envelope_never_received() {
    let broker = Broker::<String>::default();
    let past = now() - Duration::from_secs(1).as_nanos() as u64;

    let envelope = Envelope::direct("s", "A", text("stale")).expires_at(past);
    assert!(matches!(broker.try_send(envelope), Err(Error::Expired(_))));
    let received = broker.receive("A", Some(Duration::from_millis(10))).await;
    assert!(received.is_none());
}

#[tokio::test]
async fn test_envelope_expiring_in_mailbox_is_skipped() {
    let broker = Broker::<String>::default();
    let ttl = Duration::from_millis(5);
    broker.send(Envelope::direct("s", "A", text("soon stale")).expires_in(ttl));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let received = broker.receive("A", Some(Duration::from_millis(10))).await;
    assert!(received.is_none());
    assert_eq!(broker.queue_len("A"), 0);
    assert_eq!(broker.broker_stats().expired, 1);
}

#[tokio::test]
async fn test_receive_timeout_returns_none() {
    let broker = Broker::<String>::default();
    let started = Instant::now();
    assert!(
        broker
            .receive("idle-agent", Some(Duration::from_millis(100)))
            .await
            .is_none()
    );
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(2));
    assert!(broker.is_registered("idle-agent"));
}

#[tokio::test]
async fn test_sent_and_received_counters() {
    let broker = Broker::<String>::default();
    for n in 0..5 {
        broker.send(Envelope::direct("S", "R", n.to_string()));
    }
    let timeout = Some(Duration::from_millis(10));
    for _ in 0..2 {
        assert!(broker.receive("R", timeout).await.is_some());
    }

    let sender = broker.agent_stats("S").unwrap();
    let receiver = broker.agent_stats("R").unwrap();
    assert_eq!(sender.sent_count, 5);
    assert_eq!(receiver.received_count, 2);
    assert_eq!(receiver.queue_depth, 3);

    let stats = broker.broker_stats();
    assert_eq!(stats.total_messages, 5);
    assert_eq!(stats.enqueued, 5);
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.messages_by_kind.get(&MessageKind::Text), Some(&5));
}

#[tokio::test]
async fn test_unregister_is_idempotent() {
    let broker = Broker::<String>::default();
    broker.subscribe_to_topic("X", "news");
    broker.subscribe_to_topic("Y", "news");

    assert!(broker.unregister_agent("X"));
    assert!(!broker.unregister_agent("X"));
    assert_eq!(broker.subscribers("news"), vec![AgentId::from("Y")]);
    assert_eq!(broker.topic_stats("news").unwrap().subscriber_count, 1);
}

#[tokio::test]
async fn test_history_keeps_most_recent() {
    let broker = Broker::<String>::new(Config::default().with_max_history(3));
    for n in 1..=5 {
        broker.send(Envelope::direct("s", "R", n.to_string()));
    }

    let kept: Vec<_> = broker
        .get_messages(&MessageFilter::new().recipient("R"))
        .into_iter()
        .map(|e| e.payload().clone())
        .collect();
    assert_eq!(kept, ["3", "4", "5"]);
}

#[tokio::test]
async fn test_history_filters_by_time_and_kind() {
    let broker = Broker::<String>::default();
    broker.send(Envelope::direct("s", "R", text("old")));
    tokio::time::sleep(Duration::from_millis(2)).await;
    let cutoff = now();
    broker.send(Envelope::direct("s", "R", text("new")).with_kind(MessageKind::Command));

    let recent = broker.get_messages(&MessageFilter::new().since(cutoff));
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].payload(), "new");

    let filter = MessageFilter::new().kind(MessageKind::Command).until(now());
    let commands = broker.get_messages(&filter);
    assert_eq!(commands.len(), 1);

    broker.clear_history();
    assert_eq!(broker.history_len(), 0);
}

#[tokio::test]
async fn test_lifecycle_timestamps() {
    let broker = Broker::<String>::default();
    broker.send(Envelope::direct("s", "R", text("hi")));

    let mut envelope = broker.try_receive("R").unwrap();
    assert_eq!(envelope.status(), Status::Delivered);
    assert!(envelope.sent_at().is_some());
    assert!(envelope.delivered_at() >= envelope.sent_at());

    assert!(envelope.mark_read());
    assert!(envelope.mark_processed());
    assert!(!envelope.mark_read());
    assert_eq!(envelope.status(), Status::Processed);
    assert!(envelope.processed_at().is_some());
}

#[tokio::test]
async fn test_snapshot_lists_agents() {
    let broker = Broker::<String>::default();
    broker.register_agent("b");
    broker.register_agent("a");
    broker.send(Envelope::direct("a", "b", text("x")));

    let snapshot = broker.snapshot();
    assert!(snapshot.timestamp > 0);
    assert_eq!(snapshot.stats.active_agents, 2);
    let names: Vec<_> = snapshot.agents.iter().map(|a| a.agent.name()).collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(snapshot.agents[1].queue_depth, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_and_consumers() {
    let broker = Broker::<String>::default();
    broker.start().await.unwrap();

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let broker = broker.clone();
            tokio::spawn(async move {
                let mut taken = 0;
                while broker
                    .receive("sink", Some(Duration::from_millis(200)))
                    .await
                    .is_some()
                {
                    taken += 1;
                }
                taken
            })
        })
        .collect();

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let broker = broker.clone();
            tokio::spawn(async move {
                for n in 0..250 {
                    assert!(broker.send(Envelope::direct(format!("p{p}"), "sink", n.to_string())));
                }
            })
        })
        .collect();

    for producer in producers {
        producer.await.unwrap();
    }
    let mut taken = 0;
    for consumer in consumers {
        taken += consumer.await.unwrap();
    }

    assert_eq!(taken, 1000);
    let stats = broker.broker_stats();
    assert_eq!(stats.total_messages, 1000);
    assert_eq!(stats.delivered, 1000);
    broker.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_does_not_deadlock_with_pending_receive() {
    let broker = Broker::<String>::default();
    broker.start().await.unwrap();

    let waiter = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.receive("A", None).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    tokio::time::timeout(Duration::from_secs(1), broker.shutdown())
        .await
        .unwrap();
    assert!(waiter.await.unwrap().is_none());
    assert!(!broker.send(Envelope::direct("s", "A", text("late"))));
}

#[tokio::test]
async fn test_throughput_is_sampled() {
    let broker = Broker::<String>::new(
        Config::default().with_stats_interval(Duration::from_millis(20)),
    );
    broker.start().await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut sampled = false;
    while !sampled && Instant::now() < deadline {
        broker.send(Envelope::direct("s", "R", text("tick")));
        tokio::time::sleep(Duration::from_millis(5)).await;
        sampled = broker.broker_stats().messages_per_second > 0.0;
    }
    assert!(sampled);
    broker.shutdown().await;
}
