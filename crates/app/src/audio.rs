use anyhow::{bail, Context, Result};
use echoplay_core::PlaybackConfig;
use echoplay_engine::{AudioEvent, AudioEventSender, AudioSink, Generation, MediaError, NullSink};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

const TICK: Duration = Duration::from_millis(500);
/// Bitrate assumed when estimating a duration from Content-Length.
const NOMINAL_KBPS: u64 = 128;
/// Where the clock ends a source whose length is unknown.
const FALLBACK_LENGTH: Duration = Duration::from_secs(180);

/// Either backend the daemon can drive.
pub enum Backend {
    Probe(ProbeSink),
    Null(NullSink),
}

pub fn build_audio_backend(cfg: &PlaybackConfig, events: AudioEventSender) -> Result<Backend> {
    match cfg.audio_backend.trim().to_ascii_lowercase().as_str() {
        "probe" => Ok(Backend::Probe(ProbeSink::new(
            events,
            Duration::from_millis(cfg.probe_timeout_ms),
        )?)),
        "null" => Ok(Backend::Null(NullSink::new(events))),
        other => bail!("unknown audio backend {other:?} (expected \"probe\" or \"null\")"),
    }
}

impl AudioSink for Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Probe(s) => s.name(),
            Backend::Null(s) => s.name(),
        }
    }

    fn load(&mut self, url: &str, generation: Generation) -> Result<(), MediaError> {
        match self {
            Backend::Probe(s) => s.load(url, generation),
            Backend::Null(s) => s.load(url, generation),
        }
    }

    fn start(&mut self) -> Result<(), MediaError> {
        match self {
            Backend::Probe(s) => s.start(),
            Backend::Null(s) => s.start(),
        }
    }

    fn pause(&mut self) -> Result<(), MediaError> {
        match self {
            Backend::Probe(s) => s.pause(),
            Backend::Null(s) => s.pause(),
        }
    }

    fn stop(&mut self) {
        match self {
            Backend::Probe(s) => s.stop(),
            Backend::Null(s) => s.stop(),
        }
    }

    fn seek(&mut self, position_ms: u64) -> Result<(), MediaError> {
        match self {
            Backend::Probe(s) => s.seek(position_ms),
            Backend::Null(s) => s.seek(position_ms),
        }
    }

    fn set_looping(&mut self, looping: bool) {
        match self {
            Backend::Probe(s) => s.set_looping(looping),
            Backend::Null(s) => s.set_looping(looping),
        }
    }

    fn release(&mut self) {
        match self {
            Backend::Probe(s) => s.release(),
            Backend::Null(s) => s.release(),
        }
    }
}

/// Checks that a source answers before reporting it prepared, then runs a
/// wall clock in place of decoded audio.
pub struct ProbeSink {
    client: reqwest::Client,
    events: AudioEventSender,
    probe_timeout: Duration,
    fallback_length_ms: u64,
    generation: Generation,
    probe: Option<JoinHandle<()>>,
    clock: Option<JoinHandle<()>>,
    position_ms: Arc<AtomicU64>,
    duration_ms: Arc<AtomicU64>,
    looping: Arc<AtomicBool>,
    released: bool,
}

impl ProbeSink {
    pub fn new(events: AudioEventSender, probe_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(probe_timeout)
            .build()
            .context("failed to build audio probe client")?;
        Ok(Self {
            client,
            events,
            probe_timeout,
            fallback_length_ms: FALLBACK_LENGTH.as_millis() as u64,
            generation: 0,
            probe: None,
            clock: None,
            position_ms: Arc::new(AtomicU64::new(0)),
            duration_ms: Arc::new(AtomicU64::new(0)),
            looping: Arc::new(AtomicBool::new(false)),
            released: false,
        })
    }

    fn stop_clock(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.abort();
        }
    }
}

impl AudioSink for ProbeSink {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn load(&mut self, url: &str, generation: Generation) -> Result<(), MediaError> {
        if self.released {
            return Err(MediaError::Released);
        }
        if url.trim().is_empty() {
            return Err(MediaError::Load {
                url: url.to_string(),
                reason: "empty source url".to_string(),
            });
        }
        self.stop();
        self.generation = generation;

        let request = self.client.head(url);
        let events = self.events.clone();
        let duration = self.duration_ms.clone();
        let timeout = self.probe_timeout;
        let url = url.to_string();
        self.probe = Some(tokio::spawn(async move {
            let event = match tokio::time::timeout(timeout, request.send()).await {
                Ok(Ok(resp)) if resp.status().is_success() => {
                    // HEAD bodies are empty, so the header is read directly.
                    let estimate = resp
                        .headers()
                        .get(reqwest::header::CONTENT_LENGTH)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .filter(|len| *len > 0)
                        .map(estimate_duration_ms);
                    duration.store(estimate.unwrap_or(0), Ordering::Relaxed);
                    debug!(url = %url, generation, ?estimate, "source answered");
                    AudioEvent::Prepared {
                        generation,
                        duration_ms: estimate,
                    }
                }
                Ok(Ok(resp)) => AudioEvent::Failed {
                    generation,
                    reason: format!("source answered with status {}", resp.status().as_u16()),
                },
                Ok(Err(err)) => AudioEvent::Failed {
                    generation,
                    reason: err.to_string(),
                },
                Err(_) => AudioEvent::Failed {
                    generation,
                    reason: format!("no answer within {} ms", timeout.as_millis()),
                },
            };
            let _ = events.send(event);
        }));
        Ok(())
    }

    fn start(&mut self) -> Result<(), MediaError> {
        if self.released {
            return Err(MediaError::Released);
        }
        self.stop_clock();
        let events = self.events.clone();
        let generation = self.generation;
        let position = self.position_ms.clone();
        let duration = self.duration_ms.clone();
        let looping = self.looping.clone();
        let fallback = self.fallback_length_ms;
        self.clock = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(TICK).await;
                let total = match duration.load(Ordering::Relaxed) {
                    0 => fallback,
                    known => known,
                };
                let mut now = position.load(Ordering::Relaxed) + TICK.as_millis() as u64;
                if now >= total {
                    if !looping.load(Ordering::Relaxed) {
                        position.store(total, Ordering::Relaxed);
                        let _ = events.send(AudioEvent::Completed { generation });
                        break;
                    }
                    now = 0;
                }
                position.store(now, Ordering::Relaxed);
                if events
                    .send(AudioEvent::Position {
                        generation,
                        position_ms: now,
                    })
                    .is_err()
                {
                    break;
                }
            }
        }));
        Ok(())
    }

    fn pause(&mut self) -> Result<(), MediaError> {
        if self.released {
            return Err(MediaError::Released);
        }
        self.stop_clock();
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(probe) = self.probe.take() {
            probe.abort();
        }
        self.stop_clock();
        self.position_ms.store(0, Ordering::Relaxed);
        self.duration_ms.store(0, Ordering::Relaxed);
    }

    fn seek(&mut self, position_ms: u64) -> Result<(), MediaError> {
        if self.released {
            return Err(MediaError::Released);
        }
        self.position_ms.store(position_ms, Ordering::Relaxed);
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.stop();
        self.released = true;
        debug!("probe audio sink released");
    }
}

fn estimate_duration_ms(content_length: u64) -> u64 {
    content_length.saturating_mul(8) / NOMINAL_KBPS
}

#[cfg(test)]
mod tests {
    use super::{build_audio_backend, estimate_duration_ms, Backend, ProbeSink};
    use echoplay_core::PlaybackConfig;
    use echoplay_engine::{audio_event_channel, AudioEvent, AudioSink, MediaError};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn duration_estimate_uses_nominal_bitrate() {
        // 128 kbit/s is 16 000 bytes per second.
        assert_eq!(estimate_duration_ms(16_000), 1_000);
        assert_eq!(estimate_duration_ms(0), 0);
    }

    #[tokio::test]
    async fn backend_selection_follows_config() {
        let (tx, _rx) = audio_event_channel();
        let mut cfg = PlaybackConfig::default();
        assert!(matches!(
            build_audio_backend(&cfg, tx.clone()).unwrap(),
            Backend::Probe(_)
        ));

        cfg.audio_backend = "NULL".to_string();
        assert!(matches!(
            build_audio_backend(&cfg, tx.clone()).unwrap(),
            Backend::Null(_)
        ));

        cfg.audio_backend = "alsa".to_string();
        assert!(build_audio_backend(&cfg, tx).is_err());
    }

    #[tokio::test]
    async fn empty_url_is_rejected_synchronously() {
        let (tx, _rx) = audio_event_channel();
        let mut sink = ProbeSink::new(tx, Duration::from_secs(1)).unwrap();
        assert!(matches!(sink.load("  ", 1), Err(MediaError::Load { .. })));
    }

    #[tokio::test]
    async fn unreachable_source_reports_failure_for_its_generation() {
        let (tx, mut rx) = audio_event_channel();
        let mut sink = ProbeSink::new(tx, Duration::from_secs(2)).unwrap();
        sink.load("http://127.0.0.1:1/song.mp3", 7).unwrap();

        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("probe never answered")
            .unwrap();
        assert!(matches!(event, AudioEvent::Failed { generation: 7, .. }));
    }

    #[tokio::test]
    async fn clock_completes_at_known_duration() {
        let (tx, mut rx) = audio_event_channel();
        let mut sink = ProbeSink::new(tx, Duration::from_secs(1)).unwrap();
        sink.generation = 3;
        sink.duration_ms.store(800, Ordering::Relaxed);
        sink.start().unwrap();

        let mut saw_position = false;
        loop {
            let event = timeout(Duration::from_secs(3), rx.recv())
                .await
                .expect("clock stalled")
                .unwrap();
            match event {
                AudioEvent::Position { generation, .. } => {
                    assert_eq!(generation, 3);
                    saw_position = true;
                }
                AudioEvent::Completed { generation } => {
                    assert_eq!(generation, 3);
                    break;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(saw_position);
    }

    #[tokio::test]
    async fn clock_ends_unknown_length_sources() {
        let (tx, mut rx) = audio_event_channel();
        let mut sink = ProbeSink::new(tx, Duration::from_secs(1)).unwrap();
        sink.generation = 5;
        sink.fallback_length_ms = 900;
        sink.start().unwrap();

        let completed = timeout(Duration::from_secs(3), async {
            loop {
                match rx.recv().await {
                    Some(AudioEvent::Completed { generation }) => break generation,
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("unknown length never completed");
        assert_eq!(completed, 5);
    }

    #[tokio::test]
    async fn released_sink_refuses_work() {
        let (tx, _rx) = audio_event_channel();
        let mut sink = ProbeSink::new(tx, Duration::from_secs(1)).unwrap();
        sink.release();
        assert_eq!(
            sink.load("https://cdn.example/a.mp3", 1),
            Err(MediaError::Released)
        );
        assert_eq!(sink.start(), Err(MediaError::Released));
    }
}
