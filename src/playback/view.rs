//! Match view task and registry
//!
//! Every mounted view is one tokio task that exclusively owns its scheduler.
//! Commands come in over an mpsc channel, the armed step timer is a
//! `sleep_until` in the same `select!`, and frames go out over a broadcast
//! channel plus a latest-frame slot for polling readers.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::stream::decoder::FrameDecoder;
use crate::stream::protocol::{MatchPhase, StreamFrame};
use crate::util::time::frame_period;

use super::geometry::Point;
use super::scheduler::{ArmedTimer, SequenceScheduler};
use super::snapshot::{FrameBuilder, FrameStats, RenderFrame};

/// Idle views still publish about once a second
const KEEPALIVE_SECS: u32 = 1;

/// Input to a view task
#[derive(Debug)]
pub enum ViewCommand {
    /// An already decoded stream frame
    Frame(StreamFrame),
    /// Raw stream bytes; may hold partial frames
    Ingest(Bytes),
    /// The upstream stream ended; flush any trailing frame
    EndOfStream,
    /// New formation slots from the tactics side
    Formation(Vec<(u32, Point)>),
    Reset,
}

#[derive(Debug, thiserror::Error)]
#[error("view {0} is closed")]
pub struct ViewClosed(pub Uuid);

/// Cheap handle to a running view
#[derive(Clone)]
pub struct ViewHandle {
    pub id: Uuid,
    pub match_id: Option<String>,
    pub command_tx: mpsc::Sender<ViewCommand>,
    pub frame_tx: broadcast::Sender<Arc<RenderFrame>>,
    latest: Arc<RwLock<Arc<RenderFrame>>>,
    /// Out of band, so a full command queue cannot block unmounting
    shutdown: Arc<Notify>,
}

impl ViewHandle {
    pub async fn send(&self, command: ViewCommand) -> Result<(), ViewClosed> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| ViewClosed(self.id))
    }

    /// Most recently published frame
    pub fn latest_frame(&self) -> Arc<RenderFrame> {
        self.latest.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RenderFrame>> {
        self.frame_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.frame_tx.receiver_count()
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Stop the view task. Queued commands are dropped.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

/// Registry of all mounted views
pub struct ViewRegistry {
    views: DashMap<Uuid, ViewHandle>,
    render_fps: u32,
}

impl ViewRegistry {
    pub fn new(render_fps: u32) -> Self {
        Self {
            views: DashMap::new(),
            render_fps,
        }
    }

    /// Mount a new view and start its task
    pub fn open(&self, match_id: Option<String>) -> ViewHandle {
        let (view, handle) = PlaybackView::new(Uuid::new_v4(), match_id, self.render_fps);
        tokio::spawn(view.run());
        self.insert(handle.clone());
        handle
    }

    /// Unmount a view. Its task stops and any armed timer dies with it.
    pub fn close(&self, id: &Uuid) -> bool {
        match self.remove(id) {
            Some(handle) => {
                handle.shutdown();
                debug!(view_id = %id, "View unmounting");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<ViewHandle> {
        self.views.get(id).map(|v| v.value().clone())
    }

    pub fn insert(&self, handle: ViewHandle) {
        self.views.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<ViewHandle> {
        self.views.remove(id).map(|(_, h)| h)
    }

    pub fn active_views(&self) -> usize {
        self.views.len()
    }

    pub fn total_subscribers(&self) -> usize {
        self.views
            .iter()
            .map(|v| v.value().subscriber_count())
            .sum()
    }

    pub fn list(&self) -> Vec<ViewHandle> {
        self.views.iter().map(|v| v.value().clone()).collect()
    }

    pub fn find_by_match(&self, match_id: &str) -> Vec<ViewHandle> {
        self.views
            .iter()
            .filter(|v| v.value().match_id.as_deref() == Some(match_id))
            .map(|v| v.value().clone())
            .collect()
    }

    /// Drop handles whose task has ended
    pub fn sweep(&self) -> usize {
        let before = self.views.len();
        self.views.retain(|_, v| !v.is_closed());
        before - self.views.len()
    }
}

/// One match view: scheduler, stream decoder and frame publishing
pub struct PlaybackView {
    id: Uuid,
    scheduler: SequenceScheduler,
    decoder: FrameDecoder,
    command_rx: mpsc::Receiver<ViewCommand>,
    frame_tx: broadcast::Sender<Arc<RenderFrame>>,
    latest: Arc<RwLock<Arc<RenderFrame>>>,
    shutdown: Arc<Notify>,
    builder: FrameBuilder,
    stats: FrameStats,
    render_period: Duration,
    started: Instant,
    /// Armed step timer and its deadline
    timer: Option<(ArmedTimer, Instant)>,
}

impl PlaybackView {
    pub fn new(id: Uuid, match_id: Option<String>, render_fps: u32) -> (Self, ViewHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (frame_tx, _) = broadcast::channel(64);
        let latest = Arc::new(RwLock::new(Arc::new(RenderFrame::empty())));
        let shutdown = Arc::new(Notify::new());

        let handle = ViewHandle {
            id,
            match_id,
            command_tx,
            frame_tx: frame_tx.clone(),
            latest: latest.clone(),
            shutdown: shutdown.clone(),
        };

        let fps = render_fps.max(1);
        let view = Self {
            id,
            scheduler: SequenceScheduler::default(),
            decoder: FrameDecoder::new(),
            command_rx,
            frame_tx,
            latest,
            shutdown,
            builder: FrameBuilder::new(fps * KEEPALIVE_SECS),
            stats: FrameStats::default(),
            render_period: frame_period(fps),
            started: Instant::now(),
            timer: None,
        };

        (view, handle)
    }

    pub async fn run(mut self) {
        info!(view_id = %self.id, "View mounted");

        let mut render = interval(self.render_period);
        render.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = self.timer.map(|(_, at)| at);

            tokio::select! {
                _ = self.shutdown.notified() => break,
                command = self.command_rx.recv() => match command {
                    None => break,
                    Some(command) => {
                        self.handle_command(command);
                        self.publish();
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_timer();
                    self.publish();
                }
                _ = render.tick() => {
                    self.scheduler.prune_effects(self.now_ms());
                    if self.builder.should_publish(self.scheduler.phase()) {
                        self.publish();
                    }
                }
            }
        }

        info!(
            view_id = %self.id,
            frames = self.stats.frames_published,
            skipped = self.decoder.skipped(),
            "View unmounted"
        );
    }

    /// Milliseconds since the view was mounted
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn handle_command(&mut self, command: ViewCommand) {
        match command {
            ViewCommand::Frame(frame) => self.apply_frame(frame),
            ViewCommand::Ingest(chunk) => {
                for frame in self.decoder.push(&chunk) {
                    self.apply_frame(frame);
                }
            }
            ViewCommand::EndOfStream => {
                for frame in self.decoder.finish() {
                    self.apply_frame(frame);
                }
                info!(view_id = %self.id, "Engine stream ended");
            }
            ViewCommand::Formation(slots) => {
                let updated = self.scheduler.set_formation(&slots);
                debug!(view_id = %self.id, updated, "Formation updated");
            }
            ViewCommand::Reset => {
                self.scheduler.reset();
                self.decoder.clear();
                self.timer = None;
            }
        }
    }

    fn apply_frame(&mut self, frame: StreamFrame) {
        let now = self.now_ms();
        match frame {
            StreamFrame::Lineup(lineup) => {
                self.scheduler.load_lineup(&lineup);
                self.timer = None;
            }
            StreamFrame::Minute(tick) => {
                let next = self.scheduler.on_tick(&tick, now);
                self.arm(next);
            }
            // Goals and cards are replayed from the minute's own sequence
            StreamFrame::Goal(event) | StreamFrame::Card(event) => {
                debug!(view_id = %self.id, event = %event.event_type, "Event notice");
            }
            StreamFrame::HalfTime(marker) => {
                self.scheduler.on_phase_marker(&marker, MatchPhase::HalfTime)
            }
            StreamFrame::FullTime(marker) => {
                self.scheduler.on_phase_marker(&marker, MatchPhase::FullTime)
            }
            StreamFrame::Error(message) => {
                warn!(view_id = %self.id, error = %message, "Engine reported an error");
                self.scheduler.halt(message);
                self.timer = None;
            }
        }
    }

    fn fire_timer(&mut self) {
        if let Some((armed, _)) = self.timer.take() {
            let next = self.scheduler.on_timer(armed.generation, self.now_ms());
            self.arm(next);
        }
    }

    fn arm(&mut self, timer: Option<ArmedTimer>) {
        self.timer = timer.map(|t| {
            let at = Instant::now() + Duration::from_millis(u64::from(t.delay_ms));
            (t, at)
        });
    }

    fn publish(&mut self) {
        let frame = Arc::new(self.scheduler.frame(self.now_ms()));
        self.stats.record(frame.agents.len());
        *self.latest.write() = frame.clone();
        // No subscribers is fine
        let _ = self.frame_tx.send(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::scheduler::PlaybackPhase;
    use crate::stream::protocol::encode_frame;
    use serde_json::json;
    use tokio::time::sleep;

    fn lineup() -> String {
        encode_frame(
            "lineup",
            &json!({
                "home": [
                    {"id": 1, "position": "GK", "x": 5.0, "y": 50.0},
                    {"id": 7, "name": "Ada", "position": "CM", "x": 30.0, "y": 40.0}
                ],
                "away": [
                    {"id": 12, "position": "GK", "x": 95.0, "y": 50.0}
                ]
            }),
        )
        .expect("encode")
    }

    fn pass_minute(minute: u32, actor: u32, duration_ms: u32) -> String {
        encode_frame(
            "minute",
            &json!({
                "minute": minute,
                "phase": "open_play",
                "events": [{
                    "event_type": "pass",
                    "team": "home",
                    "sequence": [{
                        "action": "pass",
                        "actor_id": actor,
                        "ball_start": {"x": 30.0, "y": 40.0},
                        "ball_end": {"x": 60.0, "y": 50.0},
                        "duration_ms": duration_ms
                    }]
                }]
            }),
        )
        .expect("encode")
    }

    fn spawn() -> ViewHandle {
        let (view, handle) = PlaybackView::new(Uuid::new_v4(), Some("m-1".into()), 30);
        tokio::spawn(view.run());
        handle
    }

    async fn ingest(handle: &ViewHandle, text: String) {
        handle
            .send(ViewCommand::Ingest(Bytes::from(text)))
            .await
            .expect("view alive");
    }

    #[tokio::test(start_paused = true)]
    async fn pass_drains_returns_and_idles() {
        let handle = spawn();
        ingest(&handle, lineup()).await;
        ingest(&handle, pass_minute(10, 7, 400)).await;

        sleep(Duration::from_millis(10)).await;
        let frame = handle.latest_frame();
        assert_eq!(frame.playback, PlaybackPhase::Draining);
        assert_eq!(frame.active_agent, Some(7));
        assert_eq!(frame.minute, 10);

        sleep(Duration::from_millis(400)).await;
        assert_eq!(handle.latest_frame().playback, PlaybackPhase::ReturnToFormation);

        sleep(Duration::from_millis(600)).await;
        let frame = handle.latest_frame();
        assert_eq!(frame.playback, PlaybackPhase::Idle);
        let ada = frame.agents.iter().find(|a| a.id == 7).expect("agent");
        assert_eq!((ada.x, ada.y), (30.0, 40.0));
    }

    #[tokio::test(start_paused = true)]
    async fn later_tick_preempts_earlier_sequence() {
        let handle = spawn();
        ingest(&handle, lineup()).await;
        ingest(&handle, pass_minute(20, 7, 400)).await;
        sleep(Duration::from_millis(200)).await;

        let first = handle.latest_frame().generation;
        ingest(&handle, pass_minute(21, 7, 500)).await;
        sleep(Duration::from_millis(250)).await;

        // The first tick's timer would have fired at 400 ms
        let frame = handle.latest_frame();
        assert!(frame.generation > first);
        assert_eq!(frame.minute, 21);
        assert_eq!(frame.playback, PlaybackPhase::Draining);
    }

    #[tokio::test(start_paused = true)]
    async fn error_frame_halts_the_view() {
        let handle = spawn();
        ingest(&handle, lineup()).await;
        ingest(&handle, pass_minute(30, 7, 400)).await;
        ingest(&handle, "event: error\ndata: {\"message\":\"engine crashed\"}\n\n".into()).await;

        sleep(Duration::from_millis(1000)).await;
        let frame = handle.latest_frame();
        assert_eq!(frame.playback, PlaybackPhase::Stopped);
        assert_eq!(frame.halted.as_deref(), Some("engine crashed"));
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_receive_frames() {
        let handle = spawn();
        let mut rx = handle.subscribe();
        ingest(&handle, lineup()).await;

        let frame = rx.recv().await.expect("frame");
        assert!(frame.agents.len() <= 3);
        assert_eq!(handle.subscriber_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn registry_open_and_close() {
        let registry = ViewRegistry::new(30);
        let handle = registry.open(Some("m-9".into()));
        assert_eq!(registry.active_views(), 1);
        assert_eq!(registry.find_by_match("m-9").len(), 1);

        assert!(registry.close(&handle.id));
        assert!(!registry.close(&handle.id));
        assert_eq!(registry.active_views(), 0);

        sleep(Duration::from_millis(50)).await;
        assert!(handle.is_closed());
        assert!(handle.send(ViewCommand::Reset).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn close_stops_a_view_with_a_full_queue() {
        let registry = ViewRegistry::new(30);
        let handle = registry.open(None);

        // The view task has not run yet, so nothing drains the queue
        let mut queued = 0;
        while handle.command_tx.try_send(ViewCommand::Reset).is_ok() {
            queued += 1;
        }
        assert_eq!(queued, 256);

        assert!(registry.close(&handle.id));
        sleep(Duration::from_secs(2)).await;
        assert!(handle.is_closed());
    }
}
