use std::time::Duration;

use hookline::agent::AgentRuntime;
use hookline::compiler::compile;
use hookline::config::Config;
use hookline::console::{Console, Notice};
use hookline::overlay::FeatureState;
use hookline::scene::{demo_scene, Scene, SimProjector, Vec3};
use hookline::transport::{Channel, TransportError};

const TIMEOUT: Duration = Duration::from_millis(2000);

/// Test full command flow: compile → program → agent state change
#[test]
fn test_command_flow_overlay_toggle() {
    let mut agent = AgentRuntime::new(&Config::default(), demo_scene());

    agent.apply_program(&compile("esp true").program);
    assert_eq!(agent.overlay.state(), FeatureState::Enabled);
    assert_eq!(agent.overlay.labels().len(), 2);

    agent.apply_program(&compile("esp false").program);
    assert_eq!(agent.overlay.state(), FeatureState::Disabled);
    assert!(agent.overlay.labels().is_empty());
}

/// Sending the enable program twice must not stack handlers or labels
#[test]
fn test_double_enable_idempotency_end_to_end() {
    let mut agent = AgentRuntime::new(&Config::default(), demo_scene());

    agent.apply_program(&compile("esp true").program);
    let labels = agent.overlay.labels().len();
    let subscriptions = agent.overlay.subscription_count();

    agent.apply_program(&compile("esp true").program);
    assert_eq!(agent.overlay.labels().len(), labels);
    assert_eq!(agent.overlay.subscription_count(), subscriptions);
}

/// Stat verbs land on the local player
#[test]
fn test_command_flow_stats() {
    let mut agent = AgentRuntime::new(&Config::default(), demo_scene());

    agent.apply_program(&compile("health 50").program);
    agent.apply_program(&compile("speed 30").program);
    agent.apply_program(&compile("size 2 2 2").program);

    let local = agent.scene.local_entity().unwrap();
    let entity = agent.scene.get(local).unwrap();
    assert_eq!(entity.health, 50.0);
    assert_eq!(entity.max_health, 50.0);
    assert_eq!(entity.speed, 30.0);
    assert_eq!(entity.scale, Vec3::new(2.0, 2.0, 2.0));
}

/// walkfling arms the exploit; the loop compounds velocity frame by frame
/// and unwalkfling tears it down lazily
#[test]
fn test_command_flow_walkfling() {
    let mut agent = AgentRuntime::new(&Config::default(), demo_scene());
    let projector = SimProjector::new(1920.0, 1080.0);
    let local = agent.scene.local_entity().unwrap();
    agent.scene.set_root_velocity(local, Vec3::new(1.0, 0.0, 0.0));

    agent.apply_program(&compile("walkfling true").program);
    agent.frame_tick(&projector);
    assert_eq!(
        agent.scene.root_velocity(local),
        Some(Vec3::new(1000.0, 500.0, 0.0))
    );

    agent.apply_program(&compile("unwalkfling").program);
    assert!(agent.fling.is_installed());
    agent.frame_tick(&projector);
    assert!(!agent.fling.is_installed());
}

/// Full socket round trip: program over the channel, state via request
#[tokio::test]
async fn test_socket_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Channel::at(dir.path().join("agent.sock"));

    assert!(!channel.probe());

    let agent = AgentRuntime::new(&Config::default(), demo_scene());
    let server = tokio::spawn(agent.serve(
        channel.clone(),
        Duration::from_millis(5),
        Box::new(SimProjector::new(1920.0, 1080.0)),
    ));

    // Wait for the socket to appear.
    for _ in 0..100 {
        if channel.probe() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(channel.probe());

    channel
        .send(&compile("esp true").program, TIMEOUT)
        .await
        .unwrap();

    // Fire-and-forget: poll status until the program has been applied.
    let mut status = serde_json::Value::Null;
    for _ in 0..100 {
        let response = channel.request("status", TIMEOUT).await.unwrap();
        status = serde_json::from_str(&response).unwrap();
        if status["overlay"]["state"] == "Enabled" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status["overlay"]["state"], "Enabled");
    assert_eq!(status["overlay"]["subscriptions"], 3);
    assert!(status["metrics"]["frames_ticked"].as_u64().unwrap() > 0);

    let explorer = channel.request("explorer", TIMEOUT).await.unwrap();
    let tree: serde_json::Value = serde_json::from_str(&explorer).unwrap();
    assert_eq!(tree["ClassName"], "Game");
    assert_eq!(tree["Children"].as_array().unwrap().len(), 3);

    server.abort();
}

/// A client that connects and never writes or closes must not stall the
/// frame clock or later requests
#[tokio::test]
async fn test_idle_connection_does_not_stall_agent() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Channel::at(dir.path().join("agent.sock"));

    let mut config = Config::default();
    config.connect_timeout_ms = 100;
    let agent = AgentRuntime::new(&config, demo_scene());
    let server = tokio::spawn(agent.serve(
        channel.clone(),
        Duration::from_millis(5),
        Box::new(SimProjector::new(1920.0, 1080.0)),
    ));

    for _ in 0..100 {
        if channel.probe() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Hold a connection open without ever writing.
    let idle = tokio::net::UnixStream::connect(channel.path()).await.unwrap();

    // The agent drops the idle peer after its read bound and answers.
    let response = channel
        .request("status", Duration::from_millis(1500))
        .await
        .unwrap();
    let status: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert!(status["metrics"]["frames_ticked"].is_u64());

    drop(idle);
    server.abort();
}

/// No agent: the console reports "please connect first" and stays usable
#[tokio::test]
async fn test_console_without_agent() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Channel::at(dir.path().join("agent.sock"));
    let (mut console, mut notices) = Console::new(channel, TIMEOUT);

    console.submit("walkfling true");
    assert_eq!(notices.recv().await, Some(Notice::AgentUnreachable));

    // The next command still flows through compilation and logging.
    let output = console.submit("cmds");
    assert!(output.iter().any(|l| l.contains("Available Commands")));
}

/// Raw transport errors carry their diagnostic text to the operator
#[tokio::test]
async fn test_transport_error_text_surfaces() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Channel::at(dir.path().join("agent.sock"));

    let err = channel.send("crash", TIMEOUT).await.unwrap_err();
    assert!(matches!(err, TransportError::NotFound));
    assert_eq!(Notice::AgentUnreachable.message(), "Please inject before executing!");
}

/// Passthrough text travels the wire untouched
#[tokio::test]
async fn test_passthrough_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Channel::at(dir.path().join("agent.sock"));

    let mut agent = AgentRuntime::new(&Config::default(), demo_scene());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    agent.set_raw_hook(Box::new(move |text| {
        let _ = tx.send(text.to_string());
    }));
    let server = tokio::spawn(agent.serve(
        channel.clone(),
        Duration::from_millis(50),
        Box::new(SimProjector::new(1920.0, 1080.0)),
    ));

    for _ in 0..100 {
        if channel.probe() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let line = "game.Players.LocalPlayer.WalkSpeed = 100";
    channel.send(&compile(line).program, TIMEOUT).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, line);

    server.abort();
}
