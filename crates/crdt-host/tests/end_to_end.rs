//! Host behavior over a real TCP listener.

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crdt_host::core::{CrdtDelta, CrdtKind, CrdtOperation, CrdtState, CrdtValue, GCounterDelta, ReplicaId};
use crdt_host::protocol::{
    limits, CommandOutcome, FramedStream, HostErrorCode, HostResponse, ProtocolError, Transport,
};
use crdt_host::{CommandContext, EntityDefinition, EntityHost, HostError};
use crdt_host_testkit::fixtures::{
    counter_entity, descriptor_file, test_config, test_proxy, TestHost, COUNTER_SERVICE,
    DESCRIPTOR_BYTES,
};

fn gcounter(increment: u64) -> CrdtDelta {
    CrdtDelta::GCounter(GCounterDelta { increment })
}

fn reply_payload(outcome: CommandOutcome) -> Bytes {
    match outcome {
        CommandOutcome::Reply { payload, .. } => payload,
        CommandOutcome::Failure(message) => panic!("command failed: {message}"),
    }
}

fn flag_handler(ctx: &mut CommandContext<'_>, _: &str, _: &Bytes) -> anyhow::Result<Bytes> {
    ctx.mutate(CrdtOperation::Enable)?;
    Ok(Bytes::new())
}

fn noop_handler(_: &mut CommandContext<'_>, _: &str, _: &Bytes) -> anyhow::Result<Bytes> {
    Ok(Bytes::new())
}

#[test]
fn test_counter_delta_lifecycle() {
    let mut counter = CrdtState::new(CrdtKind::GCounter, ReplicaId::random());
    counter.mutate(CrdtOperation::Increment(5)).unwrap();
    counter.mutate(CrdtOperation::Increment(3)).unwrap();

    let delta = counter.export_delta(false).unwrap();
    assert_eq!(delta, gcounter(8));
    assert!(counter.export_delta(false).is_none());

    let replica = CrdtState::from_delta(ReplicaId::random(), &delta).unwrap();
    assert_eq!(replica.current_value(), CrdtValue::GCounter(8));
    assert_eq!(replica.to_string(), "GCounter(8)");
}

#[tokio::test]
async fn test_discover_single_counter() {
    let host = TestHost::counter().await;
    let mut client = host.client().await;

    let spec = client.discover(test_proxy()).await.unwrap();
    assert_eq!(spec.proto, Bytes::from_static(DESCRIPTOR_BYTES));
    assert_eq!(spec.entities.len(), 1);
    assert_eq!(spec.entities[0].entity_type, "crdt");
    assert_eq!(spec.entities[0].service_name, COUNTER_SERVICE);
    assert_eq!(spec.entities[0].persistence_id, "Counter");
    assert_eq!(spec.service_info.protocol_major_version, 0);
    assert_eq!(spec.service_info.protocol_minor_version, 2);
    assert_eq!(spec.service_info.service_name, "crdt-host-testkit");
    assert_eq!(spec.service_info.support_library_name, "crdt-host");

    host.shutdown().await;
}

#[tokio::test]
async fn test_discover_many_entities() {
    let host = TestHost::start([
        counter_entity(),
        EntityDefinition::crdt("example.flags.FeatureFlag", CrdtKind::Flag, flag_handler)
            .persistence_id("flags"),
        EntityDefinition::declared("crdt", "example.votes.Poll", "vote", noop_handler).unwrap(),
    ])
    .await;
    let mut client = host.client().await;

    let spec = client.discover(test_proxy()).await.unwrap();
    let ids: Vec<_> = spec
        .entities
        .iter()
        .map(|e| (e.service_name.as_str(), e.persistence_id.as_str()))
        .collect();
    assert_eq!(
        ids,
        [
            (COUNTER_SERVICE, "Counter"),
            ("example.flags.FeatureFlag", "flags"),
            ("example.votes.Poll", "Poll"),
        ]
    );
    assert_eq!(host.host().registry().len(), 3);

    // Discovery is repeatable on the same connection.
    assert_eq!(client.discover(test_proxy()).await.unwrap(), spec);
    host.shutdown().await;
}

#[tokio::test]
async fn test_counter_over_the_wire() {
    let host = TestHost::counter().await;

    let mut writer = host.client().await;
    assert_eq!(
        writer.open_session(COUNTER_SERVICE, "c-1", None).await.unwrap(),
        CrdtKind::GCounter
    );
    let mut deltas = Vec::new();
    for amount in ["5", "3"] {
        match writer.command("Increment", amount.as_bytes().to_vec()).await.unwrap() {
            CommandOutcome::Reply { delta, .. } => deltas.extend(delta),
            CommandOutcome::Failure(message) => panic!("command failed: {message}"),
        }
    }
    assert_eq!(deltas, [gcounter(5), gcounter(3)]);
    writer.close_session().await.unwrap();

    // Another replica receives the same increments as remote deltas.
    let mut follower = host.client().await;
    follower.open_session(COUNTER_SERVICE, "c-2", None).await.unwrap();
    for delta in deltas {
        follower.send_delta(delta).await.unwrap();
    }
    let value = reply_payload(follower.command("Get", Bytes::new()).await.unwrap());
    assert_eq!(value, Bytes::from_static(b"8"));

    // A session restored from the combined delta starts at the total.
    let mut restored = host.client().await;
    restored
        .open_session(COUNTER_SERVICE, "c-1", Some(gcounter(8)))
        .await
        .unwrap();
    let outcome = restored.command("Get", Bytes::new()).await.unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::Reply {
            payload: Bytes::from_static(b"8"),
            delta: None,
        }
    );

    host.shutdown().await;
}

#[tokio::test]
async fn test_invalid_increment_is_reported_and_harmless() {
    let host = TestHost::counter().await;
    let mut client = host.client().await;
    client.open_session(COUNTER_SERVICE, "c-1", None).await.unwrap();

    reply_payload(client.command("Increment", &b"2"[..]).await.unwrap());
    let outcome = client.command("Increment", &b"-1"[..]).await.unwrap();
    assert!(matches!(outcome, CommandOutcome::Failure(ref m) if m.contains("invalid operation")));

    let value = reply_payload(client.command("Get", Bytes::new()).await.unwrap());
    assert_eq!(value, Bytes::from_static(b"2"));

    let err = client
        .send_delta(CrdtDelta::Flag(crdt_host::core::FlagDelta { value: true }))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Remote {
            code: HostErrorCode::DeltaMismatch,
            ..
        }
    ));
    host.shutdown().await;
}

#[tokio::test]
async fn test_session_conflict_across_connections() {
    let host = TestHost::counter().await;
    let mut first = host.client().await;
    let mut second = host.client().await;

    first.open_session(COUNTER_SERVICE, "c-1", None).await.unwrap();
    let err = second
        .open_session(COUNTER_SERVICE, "c-1", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Remote {
            code: HostErrorCode::SessionConflict,
            ..
        }
    ));
    assert_eq!(host.host().active_sessions(), 1);

    first.close_session().await.unwrap();
    second.open_session(COUNTER_SERVICE, "c-1", None).await.unwrap();
    host.shutdown().await;
}

#[tokio::test]
async fn test_report_error_is_acknowledged() {
    let host = TestHost::counter().await;
    let mut client = host.client().await;
    client.report_error("entity crashed").await.unwrap();
    client.discover(test_proxy()).await.unwrap();
    host.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_registration_fails_before_bind() {
    // Hold the port: if the host tried to bind first it would fail with an I/O error.
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let descriptor = descriptor_file();
    let err = EntityHost::new(test_config(&descriptor).bind_port(port))
        .unwrap()
        .add_entity(counter_entity())
        .add_entity(counter_entity())
        .start()
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::DuplicateService(ref name) if name == COUNTER_SERVICE));
    assert!(err.is_startup_fatal());
}

#[tokio::test]
async fn test_missing_descriptor_is_fatal() {
    let descriptor = descriptor_file();
    let config = test_config(&descriptor).descriptor_set_path("/nonexistent/user-function.desc");
    let err = EntityHost::new(config).unwrap_err();
    assert!(matches!(err, HostError::Descriptor { .. }));
}

#[tokio::test]
async fn test_oversized_frame_closes_only_that_connection() {
    let host = TestHost::counter().await;

    let mut raw = TcpStream::connect(host.addr()).await.unwrap();
    let len = (limits::MAX_FRAME_LEN as u32) + 1;
    raw.write_all(&len.to_be_bytes()).await.unwrap();

    let mut framed = FramedStream::new(raw);
    let response: HostResponse = framed.recv().await.unwrap().unwrap();
    assert!(matches!(
        response,
        HostResponse::Error {
            code: HostErrorCode::MessageTooLarge,
            ..
        }
    ));
    assert!(framed.recv::<HostResponse>().await.unwrap().is_none());

    let mut client = host.client().await;
    client.discover(test_proxy()).await.unwrap();
    host.shutdown().await;
}
