use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::{
    sync::{broadcast, Notify},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        queue::{QueueSnapshot, TrackQueue},
        track::Track,
        transport::{AudioTransport, CompletionSignal, PlaybackEnd, SharedConnection},
    },
    error::{MusicError, TransportError},
};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Nothing is playing; the loop, if any, waits for the queue
    Idle,
    /// A track was dequeued and its source is being opened; no audio yet
    Starting,
    /// Audio is flowing
    Playing,
    Paused,
    /// `stop` is tearing the player down
    Stopping,
}

/// Published on every track transition so the command surface can report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    TrackStarted(Track),
    TrackEnded(Track),
    TrackFailed { track: Track, error: TransportError },
}

/// Queue, now-playing slot and player loop for a single guild.
///
/// All state sits behind one short-lived lock that is never held across an
/// `.await`. A generation counter ties each loop task to the queue it was
/// spawned for: `stop` bumps it, so a loop that is still mid-iteration finds
/// itself stale and exits without touching the fresh state.
pub struct GuildPlayer<S> {
    guild_id: GuildId,
    transport: Arc<dyn AudioTransport<Source = S>>,
    inner: Mutex<PlayerInner<S>>,
    events: broadcast::Sender<PlayerEvent>,
    loops_spawned: AtomicUsize,
}

struct PlayerInner<S> {
    queue: TrackQueue,
    wake: Arc<Notify>,
    now_playing: Option<Track>,
    status: PlayerStatus,
    /// Where new tracks start
    connection: Option<SharedConnection<S>>,
    /// Where the current track was started; set exactly while Playing or Paused
    playing_on: Option<SharedConnection<S>>,
    /// `skip` arrived while Starting; applied once the source is live
    skip_requested: bool,
    loop_task: Option<JoinHandle<()>>,
    generation: u64,
}

impl<S: Send + 'static> GuildPlayer<S> {
    pub fn new(guild_id: GuildId, transport: Arc<dyn AudioTransport<Source = S>>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            guild_id,
            transport,
            inner: Mutex::new(PlayerInner {
                queue: TrackQueue::new(),
                wake: Arc::new(Notify::new()),
                now_playing: None,
                status: PlayerStatus::Idle,
                connection: None,
                playing_on: None,
                skip_requested: false,
                loop_task: None,
                generation: 0,
            }),
            events,
            loops_spawned: AtomicUsize::new(0),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Points the player at the guild's current voice connection.
    ///
    /// A track still running on a different connection is stopped, so the loop
    /// moves on and the next track starts on the new one.
    pub async fn attach(&self, connection: SharedConnection<S>) {
        let stale = {
            let mut inner = self.inner.lock();
            let stale = inner
                .playing_on
                .as_ref()
                .filter(|current| !Arc::ptr_eq(*current, &connection))
                .cloned();
            inner.connection = Some(connection);
            stale
        };

        if let Some(stale) = stale {
            debug!(guild_id = %self.guild_id, "Connection replaced mid-track, stopping the old source");
            if let Err(error) = stale.stop().await {
                debug!(guild_id = %self.guild_id, "Ignoring stop failure: {}", error);
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> PlayerStatus {
        self.inner.lock().status
    }

    pub fn is_playing(&self) -> bool {
        self.status() == PlayerStatus::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.status() == PlayerStatus::Paused
    }

    pub fn now_playing(&self) -> Option<Track> {
        self.inner.lock().now_playing.clone()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let inner = self.inner.lock();
        QueueSnapshot {
            now_playing: inner.now_playing.clone(),
            pending: inner.queue.snapshot(),
        }
    }

    /// How many player loops this guild has ever started.
    pub fn loops_spawned(&self) -> usize {
        self.loops_spawned.load(Ordering::Relaxed)
    }

    /// Appends a track and makes sure exactly one loop is draining the queue.
    ///
    /// Returns the track's 1-based position in play order, counting the track
    /// that is currently playing.
    pub fn enqueue(self: &Arc<Self>, track: Track) -> usize {
        let mut inner = self.inner.lock();

        inner.queue.push(track);
        let position = inner.queue.len() + usize::from(inner.now_playing.is_some());

        let loop_alive = inner
            .loop_task
            .as_ref()
            .is_some_and(|task| !task.is_finished());

        if !loop_alive {
            let generation = inner.generation;
            let wake = Arc::clone(&inner.wake);
            let spawned = self.loops_spawned.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(guild_id = %self.guild_id, generation, spawned, "🔁 Spawning player loop");
            inner.loop_task = Some(tokio::spawn(Arc::clone(self).run(generation, wake)));
        }

        inner.wake.notify_one();
        position
    }

    pub async fn pause(&self) -> Result<(), MusicError> {
        let connection = {
            let mut inner = self.inner.lock();
            if inner.status != PlayerStatus::Playing {
                return Err(MusicError::NothingPlaying);
            }
            let connection = inner.playing_on.clone().ok_or_else(missing_source)?;
            inner.status = PlayerStatus::Paused;
            connection
        };

        if let Err(error) = connection.pause().await {
            self.swap_status(PlayerStatus::Paused, PlayerStatus::Playing);
            return Err(error.into());
        }

        info!(guild_id = %self.guild_id, "⏸️ Playback paused");
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), MusicError> {
        let connection = {
            let mut inner = self.inner.lock();
            if inner.status != PlayerStatus::Paused {
                return Err(MusicError::NothingPaused);
            }
            let connection = inner.playing_on.clone().ok_or_else(missing_source)?;
            inner.status = PlayerStatus::Playing;
            connection
        };

        if let Err(error) = connection.resume().await {
            self.swap_status(PlayerStatus::Playing, PlayerStatus::Paused);
            return Err(error.into());
        }

        info!(guild_id = %self.guild_id, "▶️ Playback resumed");
        Ok(())
    }

    /// Stops the current source; the loop sees the same completion as a
    /// natural end and moves to the next queued track. A track that is still
    /// starting is skipped as soon as its source goes live.
    pub async fn skip(&self) -> Result<(), MusicError> {
        let connection = {
            let mut inner = self.inner.lock();
            match inner.status {
                PlayerStatus::Playing => inner.playing_on.clone().ok_or_else(missing_source)?,
                PlayerStatus::Starting => {
                    inner.skip_requested = true;
                    info!(guild_id = %self.guild_id, "⏭️ Skip requested while starting");
                    return Ok(());
                }
                _ => return Err(MusicError::NothingPlaying),
            }
        };

        connection.stop().await?;
        info!(guild_id = %self.guild_id, "⏭️ Skipped current track");
        Ok(())
    }

    /// Clears everything and cancels the loop. Safe from any state, and safe
    /// to call repeatedly.
    pub async fn stop(&self) {
        let (connection, task) = {
            let mut inner = self.inner.lock();
            inner.status = PlayerStatus::Stopping;
            inner.generation += 1;
            inner.queue = TrackQueue::new();
            inner.wake = Arc::new(Notify::new());
            inner.now_playing = None;
            inner.skip_requested = false;
            let playing_on = inner.playing_on.take();
            let attached = inner.connection.take();
            (playing_on.or(attached), inner.loop_task.take())
        };

        if let Some(connection) = connection {
            if let Err(error) = connection.stop().await {
                debug!(guild_id = %self.guild_id, "Ignoring stop failure: {}", error);
            }
        }

        if let Some(task) = task {
            task.abort();
        }

        self.swap_status(PlayerStatus::Stopping, PlayerStatus::Idle);
        info!(guild_id = %self.guild_id, "⏹️ Player stopped and queue cleared");
    }

    async fn run(self: Arc<Self>, generation: u64, wake: Arc<Notify>) {
        while let Some(track) = self.next_track(generation, &wake).await {
            let outcome = self.play_track(generation, &track).await;

            if !self.finish_track(generation) {
                break;
            }

            match outcome {
                Ok(PlaybackEnd::Finished) => self.emit(PlayerEvent::TrackEnded(track)),
                Ok(PlaybackEnd::Errored(reason)) => {
                    self.report_failure(track, TransportError::Playback(reason))
                }
                Err(error) => self.report_failure(track, error),
            }
        }

        debug!(guild_id = %self.guild_id, generation, "Player loop exited");
    }

    /// Waits until the queue yields a track, then marks it as now playing in
    /// the same critical section. `None` means this loop has been superseded.
    async fn next_track(&self, generation: u64, wake: &Notify) -> Option<Track> {
        loop {
            {
                let mut inner = self.inner.lock();
                if inner.generation != generation {
                    return None;
                }
                if let Some(track) = inner.queue.pop_front() {
                    inner.now_playing = Some(track.clone());
                    inner.status = PlayerStatus::Starting;
                    return Some(track);
                }
            }

            wake.notified().await;
        }
    }

    async fn play_track(
        &self,
        generation: u64,
        track: &Track,
    ) -> Result<PlaybackEnd, TransportError> {
        let source = self.transport.open(track.stream_url()).await?;

        let connection = {
            let inner = self.inner.lock();
            if inner.generation != generation {
                return Ok(PlaybackEnd::Finished);
            }
            inner.connection.clone().ok_or(TransportError::NotConnected)?
        };

        let (signal, finished) = CompletionSignal::channel();
        connection.play(source, signal).await?;

        let skip_requested = {
            let mut inner = self.inner.lock();
            if inner.generation == generation {
                inner.status = PlayerStatus::Playing;
                inner.playing_on = Some(Arc::clone(&connection));
                Some(std::mem::take(&mut inner.skip_requested))
            } else {
                None
            }
        };

        // Stopped while the source was starting: it must not keep playing.
        let Some(skip_requested) = skip_requested else {
            if let Err(error) = connection.stop().await {
                debug!(guild_id = %self.guild_id, "Ignoring stop failure: {}", error);
            }
            return Ok(PlaybackEnd::Finished);
        };

        info!(guild_id = %self.guild_id, "🎵 Now playing: {}", track.title());
        self.emit(PlayerEvent::TrackStarted(track.clone()));

        if skip_requested {
            connection.stop().await?;
            info!(guild_id = %self.guild_id, "⏭️ Skipped current track");
        }

        // A dropped signal means the connection went away mid-track.
        Ok(finished.await.unwrap_or(PlaybackEnd::Finished))
    }

    /// Clears now-playing. Returns false when the loop is stale.
    fn finish_track(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        inner.now_playing = None;
        inner.playing_on = None;
        inner.skip_requested = false;
        if inner.status != PlayerStatus::Stopping {
            inner.status = PlayerStatus::Idle;
        }
        true
    }

    fn report_failure(&self, track: Track, error: TransportError) {
        warn!(guild_id = %self.guild_id, "❌ Could not play {}: {}", track.title(), error);
        self.emit(PlayerEvent::TrackFailed { track, error });
    }

    fn swap_status(&self, from: PlayerStatus, to: PlayerStatus) {
        let mut inner = self.inner.lock();
        if inner.status == from {
            inner.status = to;
        }
    }

    fn emit(&self, event: PlayerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn missing_source() -> MusicError {
    MusicError::InvariantViolation("player is playing without a source connection".into())
}
