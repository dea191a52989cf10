use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use vtouchpad::input::{BTN_TOUCH, REL_WHEEL};
use vtouchpad::sink::{KeyState, SinkCall};
use vtouchpad::{
    BUTTON_BACK, ControlResponse, ControlResult, ErrorKind, EventSink, Manager, RecordingSink, TouchpadArray, TouchpadClient,
    TouchpadConfig,
};

type Created = Arc<Mutex<Vec<RecordingSink>>>;

fn socket_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("vtouchpad-test-{}", ulid::Ulid::new()))
        .join("control.sock")
}

async fn start_manager(socket: &Path) -> Created {
    let created: Created = Arc::default();
    let log = Arc::clone(&created);
    let factory = move || -> Box<dyn EventSink + Send> {
        let sink = RecordingSink::new();
        log.lock().unwrap().push(sink.clone());
        Box::new(sink)
    };
    let touchpads = TouchpadArray::new(TouchpadConfig::default(), factory);
    let manager = Manager::new(socket, touchpads).unwrap();
    tokio::spawn(async move { manager.run().await });

    for _ in 0..100 {
        if socket.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    created
}

async fn connect(socket: &Path) -> TouchpadClient {
    for _ in 0..100 {
        if let Ok(client) = TouchpadClient::connect(socket).await {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("manager did not come up at {}", socket.display());
}

fn remote_kind(err: anyhow::Error) -> ErrorKind {
    err.downcast::<vtouchpad::client::RemoteError>()
        .expect("remote error")
        .kind
}

#[tokio::test]
async fn touch_round_trip_through_manager() {
    let socket = socket_path();
    let created = start_manager(&socket).await;
    let client = connect(&socket).await;

    client.ping().await.unwrap();
    client.attach().await.unwrap();
    let sinks = created.lock().unwrap().clone();
    assert_eq!(sinks.len(), 2);
    for sink in &sinks {
        sink.take_calls();
    }

    client.touch(1, 0.5, 0.5, 1.0).await.unwrap();
    client.touch(1, 0.5, 0.5, 1.0).await.unwrap();
    client.touch(1, 0.5, 0.5, 0.0).await.unwrap();
    assert_eq!(
        sinks[1].take_calls(),
        vec![
            SinkCall::MultiTouchXY {
                slot: 0,
                tracking_id: 0,
                x: 32768,
                y: 32768
            },
            SinkCall::Key {
                key: BTN_TOUCH,
                state: KeyState::Press
            },
            SinkCall::SynReport,
            SinkCall::Key {
                key: BTN_TOUCH,
                state: KeyState::Release
            },
            SinkCall::MultiTouchLift { slot: 0 },
            SinkCall::SynReport,
        ]
    );
    assert!(sinks[0].calls().is_empty());

    client.scroll(0, 0.0, -0.5).await.unwrap();
    assert_eq!(
        sinks[0].take_calls(),
        vec![
            SinkCall::Rel {
                axis: REL_WHEEL,
                delta: -2
            },
            SinkCall::SynReport,
        ]
    );
}

#[tokio::test]
async fn errors_keep_their_kind_over_the_wire() {
    let socket = socket_path();
    start_manager(&socket).await;
    let client = connect(&socket).await;

    let err = client.touch(0, 0.5, 0.5, 1.0).await.unwrap_err();
    assert_eq!(remote_kind(err), ErrorKind::Sequencing);

    client.attach().await.unwrap();
    let err = client.touch(7, 0.5, 0.5, 1.0).await.unwrap_err();
    assert_eq!(remote_kind(err), ErrorKind::InvalidArgument);
    let err = client.button_state(0, 0x10).await.unwrap_err();
    assert_eq!(remote_kind(err), ErrorKind::NotSupported);
    client.button_state(0, BUTTON_BACK).await.unwrap();

    client.detach().await.unwrap();
    let err = client.scroll(1, 0.1, 0.0).await.unwrap_err();
    assert_eq!(remote_kind(err), ErrorKind::Sequencing);
}

#[tokio::test]
async fn dump_reports_touchpad_state() {
    let socket = socket_path();
    start_manager(&socket).await;
    let client = connect(&socket).await;

    let text = client.dump().await.unwrap();
    assert!(text.contains("[virtual touchpad 0]\nsink = none"));
    assert!(text.contains("[virtual touchpad 1]\nsink = none"));

    client.attach().await.unwrap();
    client.button_state(1, BUTTON_BACK).await.unwrap();
    let text = client.dump().await.unwrap();
    assert!(text.contains("[virtual touchpad 1]\nsink = owned"));
    assert!(text.contains("last_buttons = 0x8"));
}

#[tokio::test]
async fn second_manager_on_same_socket_is_refused() {
    let socket = socket_path();
    start_manager(&socket).await;

    let touchpads = TouchpadArray::new(TouchpadConfig::default(), || -> Box<dyn EventSink + Send> {
        Box::new(RecordingSink::new())
    });
    assert!(Manager::new(&socket, touchpads).is_err());
}

#[tokio::test]
async fn negative_touchpad_id_gets_an_error_reply() {
    let socket = socket_path();
    start_manager(&socket).await;
    connect(&socket).await;

    let stream = UnixStream::connect(&socket).await.unwrap();
    let mut stream = BufReader::new(stream);
    stream
        .get_mut()
        .write_all(
            b"{\"id\":\"a\",\"command\":{\"Touch\":{\"touchpad\":-1,\"x\":0.5,\"y\":0.5,\"pressure\":1.0}}}\n",
        )
        .await
        .unwrap();

    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_line(&mut line))
        .await
        .expect("manager replied")
        .unwrap();
    let response: ControlResponse = serde_json::from_str(&line).unwrap();
    assert_eq!(response.id, "a");
    assert!(matches!(
        response.result,
        ControlResult::Error {
            kind: ErrorKind::InvalidArgument,
            ..
        }
    ));

    // The connection stays usable after a rejected line.
    stream.get_mut().write_all(b"{\"id\":\"b\",\"command\":\"Ping\"}\n").await.unwrap();
    line.clear();
    stream.read_line(&mut line).await.unwrap();
    let response: ControlResponse = serde_json::from_str(&line).unwrap();
    assert_eq!((response.id.as_str(), response.result), ("b", ControlResult::Pong));
}
