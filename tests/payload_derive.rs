//! Integration test for the Payload derive macro.
#![cfg(feature = "macros")]

use switchboard::{Broker, Envelope, Handler, MessageFilter, Payload};

#[derive(Payload, Debug, Clone)]
#[allow(dead_code)]
enum Task {
    Ping,
    Resize(u32, u32),
    Build { target: String },
}

#[derive(Payload, Debug)]
struct Report {
    #[allow(dead_code)]
    lines: Vec<String>,
}

#[derive(Payload)]
struct Wrapped<T: Send + Sync + 'static>(#[allow(dead_code)] T);

#[test]
fn test_derived_type_info_unit() {
    assert_eq!(Task::Ping.type_info(), "Ping");
}

#[test]
fn test_derived_type_info_tuple() {
    assert_eq!(Task::Resize(640, 480).type_info(), "Resize");
}

#[test]
fn test_derived_type_info_struct_variant() {
    let task = Task::Build {
        target: "release".into(),
    };
    assert_eq!(task.type_info(), "Build");
}

#[test]
fn test_derived_type_info_struct() {
    assert_eq!(Report { lines: vec![] }.type_info(), "Report");
    assert_eq!(Wrapped(1u8).type_info(), "Wrapped");
}

#[tokio::test]
async fn test_derived_payload_travels_through_broker() {
    let broker = Broker::<Task>::default();
    let check = |envelope: Envelope<Task>| async move {
        assert_eq!(envelope.payload().type_info(), "Resize");
        Ok(())
    };
    broker.register_handler(Handler::new(MessageFilter::new(), check));

    assert!(broker.send(Envelope::direct("ui", "renderer", Task::Resize(800, 600))));
    let mut received = broker.try_receive("renderer").unwrap();
    assert_eq!(broker.process_message_handlers(&mut received).await, 1);
}
