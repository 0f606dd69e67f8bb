//! Agent runtime — the in-process rendition of the injected payload.
//!
//! Owns the scene, the feature state machines, and the channel server.
//! Programs arrive over the channel as directive text; a `__REQ:`-tagged
//! first line switches the connection into request/response mode instead.
//! The frame clock drives the overlay tick, the movement-exploit loop,
//! and the crash loop inside the same single-threaded select loop, so no
//! lock discipline is needed around the label pool or the feature flags.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::exploit::FlingLoop;
use crate::metrics::Metrics;
use crate::overlay::OverlayEngine;
use crate::scene::{Projector, Scene, SimScene};
use crate::script::{parse_program, Directive};
use crate::transport::{Channel, REQUEST_TAG};

/// Health value the crash loop assigns every frame; far outside anything
/// the target accepts.
pub const CRASH_HEALTH: f64 = 1.8912898129813e24;

type DirectiveResult = Result<(), Box<dyn std::error::Error>>;

/// Hook receiving raw passthrough text for the host's own script
/// interpreter. The interpreter itself is outside this crate.
pub type RawScriptHook = Box<dyn FnMut(&str) + Send>;

pub struct AgentRuntime {
    pub scene: SimScene,
    pub overlay: OverlayEngine,
    pub fling: FlingLoop,
    pub metrics: Metrics,
    crash_loop: bool,
    raw_hook: Option<RawScriptHook>,
    /// Bound on a single connection's read; a peer that connects and
    /// never closes its write side must not stall the frame clock.
    read_timeout: Duration,
}

impl AgentRuntime {
    pub fn new(config: &Config, scene: SimScene) -> Self {
        Self {
            scene,
            overlay: OverlayEngine::new(config.overlay.label_offset_px),
            fling: FlingLoop::new(config.exploit.velocity_factor, config.exploit.lift),
            metrics: Metrics::new(),
            crash_loop: false,
            raw_hook: None,
            read_timeout: config.connect_timeout(),
        }
    }

    /// Install the host-interpreter hook for raw passthrough text.
    pub fn set_raw_hook(&mut self, hook: RawScriptHook) {
        self.raw_hook = Some(hook);
    }

    pub fn crash_loop_active(&self) -> bool {
        self.crash_loop
    }

    /// Execute a received program. Per-directive faults are logged and
    /// counted, never fatal — one bad line must not stop the rest.
    pub fn apply_program(&mut self, text: &str) {
        self.metrics.record_program();
        for directive in parse_program(text) {
            match self.apply(&directive) {
                Ok(()) => self.metrics.record_applied(),
                Err(e) => {
                    warn!(directive = %directive, error = %e, "directive failed");
                    self.metrics.record_failed();
                }
            }
        }
    }

    fn apply(&mut self, directive: &Directive) -> DirectiveResult {
        debug!(directive = %directive, "applying directive");
        match directive {
            Directive::SetHealth(amount) => {
                let local = self.local()?;
                self.scene.set_max_health(local, *amount);
                self.scene.set_health(local, *amount);
                Ok(())
            }
            Directive::SetSpeed(amount) => {
                let local = self.local()?;
                self.scene.set_speed(local, *amount);
                Ok(())
            }
            Directive::SetScale(scale) => {
                let local = self.local()?;
                self.scene.set_scale(local, *scale);
                Ok(())
            }
            Directive::Collide(enabled) => {
                let local = self.local()?;
                for part in self.scene.collidable_parts(local) {
                    self.scene.set_collide(local, &part, *enabled);
                }
                Ok(())
            }
            Directive::Overlay(true) => {
                self.overlay.enable(&self.scene);
                Ok(())
            }
            Directive::Overlay(false) => {
                self.overlay.disable();
                Ok(())
            }
            Directive::Fling(true) => {
                self.fling.arm();
                Ok(())
            }
            Directive::Fling(false) => {
                self.fling.disarm();
                Ok(())
            }
            Directive::Crash => {
                self.crash_loop = true;
                Ok(())
            }
            Directive::Raw(text) => {
                match self.raw_hook.as_mut() {
                    Some(hook) => hook(text),
                    None => debug!(bytes = text.len(), "raw script with no host hook, dropped"),
                }
                Ok(())
            }
        }
    }

    fn local(&self) -> Result<crate::scene::EntityRef, Box<dyn std::error::Error>> {
        self.scene
            .local_entity()
            .ok_or_else(|| "no local entity".into())
    }

    /// The host's per-frame "rendered" event.
    pub fn frame_tick(&mut self, projector: &dyn Projector) {
        self.overlay.on_frame(&self.scene, projector);
        self.fling.tick(&mut self.scene);
        if self.crash_loop {
            if let Some(local) = self.scene.local_entity() {
                self.scene.set_health(local, CRASH_HEALTH);
            }
        }
        self.metrics.record_frame();
    }

    /// Entity joined the scene: overlay may need a label.
    pub fn entity_joined(&mut self, entity: crate::scene::EntityRef) {
        self.overlay.on_entity_added(&self.scene, entity);
    }

    /// Entity about to leave: overlay evicts its label first, while the
    /// identity is still resolvable.
    pub fn entity_leaving(&mut self, entity: crate::scene::EntityRef) {
        self.overlay.on_entity_removed(&self.scene, entity);
        self.scene.remove_entity(entity);
    }

    /// Feature/label/metric snapshot for the `status` request.
    pub fn status(&self) -> serde_json::Value {
        let mut metrics = serde_json::to_value(&self.metrics).unwrap_or_default();
        if let Some(counters) = metrics.as_object_mut() {
            counters.insert("apply_rate".to_string(), self.metrics.apply_rate().into());
        }
        serde_json::json!({
            "overlay": {
                "state": self.overlay.state(),
                "labels": self.overlay.labels(),
                "subscriptions": self.overlay.subscription_count(),
            },
            "fling": {
                "state": self.fling.state(),
                "installed": self.fling.is_installed(),
            },
            "crash_loop": self.crash_loop,
            "metrics": metrics,
        })
    }

    /// Object-tree snapshot of the scene for the `explorer` request.
    pub fn explorer_snapshot(&self) -> serde_json::Value {
        let children: Vec<_> = self
            .scene
            .entities()
            .iter()
            .filter_map(|&e| {
                let entity = self.scene.get(e)?;
                let parts: Vec<_> = entity
                    .parts
                    .iter()
                    .map(|p| {
                        serde_json::json!({
                            "Name": p.name,
                            "ClassName": "Part",
                            "Children": [],
                        })
                    })
                    .collect();
                Some(serde_json::json!({
                    "Name": entity.name,
                    "ClassName": "Entity",
                    "Children": parts,
                }))
            })
            .collect();

        serde_json::json!({
            "Name": "Scene",
            "ClassName": "Game",
            "Children": children,
        })
    }

    fn handle_request(&self, command: &str) -> String {
        match command.trim() {
            "status" => self.status().to_string(),
            "explorer" => self.explorer_snapshot().to_string(),
            other => {
                warn!(command = %other, "unknown request");
                serde_json::json!({"error": format!("unknown request: {}", other)}).to_string()
            }
        }
    }

    async fn handle_connection(&mut self, mut stream: UnixStream) {
        let mut text = String::new();
        match tokio::time::timeout(self.read_timeout, stream.read_to_string(&mut text)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "failed to read incoming payload");
                return;
            }
            Err(_) => {
                warn!(timeout = ?self.read_timeout, "dropping connection that never closed");
                return;
            }
        }

        if let Some(rest) = text.strip_prefix(REQUEST_TAG) {
            let command = rest.lines().next().unwrap_or("");
            let response = self.handle_request(command);
            if let Err(e) = stream.write_all(response.as_bytes()).await {
                warn!(error = %e, "failed to write response");
            }
            let _ = stream.shutdown().await;
        } else {
            self.apply_program(&text);
        }
    }

    /// Bind the channel and run the accept/frame loop until ctrl-c.
    pub async fn serve(
        mut self,
        channel: Channel,
        frame_interval: Duration,
        projector: Box<dyn Projector + Send>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // A stale socket file from a crashed agent blocks the bind.
        let _ = std::fs::remove_file(channel.path());
        let listener = UnixListener::bind(channel.path())?;
        info!(path = %channel.path().display(), "agent channel listening");

        let mut frame = tokio::time::interval(frame_interval);
        let mut uptime = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                conn = listener.accept() => {
                    match conn {
                        Ok((stream, _)) => self.handle_connection(stream).await,
                        Err(e) => error!(error = %e, "accept failed"),
                    }
                }
                _ = frame.tick() => {
                    self.frame_tick(projector.as_ref());
                }
                _ = uptime.tick() => {
                    self.metrics.increment_uptime(1);
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(channel.path());
        Ok(())
    }
}
