//! Application entry point: hands-free voice relay.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] (defaults on first run), apply `VOICE_RELAY_*`
//!    overrides and validate it into a [`SessionSnapshot`].  Any error here
//!    is fatal.
//! 3. Take the single-instance lock.
//! 4. Probe the speech-to-text and text-to-speech services.
//! 5. Open the output device and start the [`Session`].
//! 6. Start the capture thread: microphone → 16 kHz mono frames → session.
//! 7. Read assistant replies from stdin, one per line, and speak them.
//! 8. On Ctrl+C or end of stdin, shut the session down and wait for
//!    in-flight work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use voice_relay::{
    audio::{downmix, AudioCapture, AudioChunk, CpalOutput, FrameChunker, StreamResampler},
    config::{AppConfig, AppPaths, InstanceLock, SessionSnapshot},
    inject::{DesktopInjector, InjectionSink},
    session::{Journal, Session, SessionHandle, SessionServices},
    stt::HttpTranscriber,
    tts::HttpSynthesizer,
};

// ---------------------------------------------------------------------------
// Capture thread
// ---------------------------------------------------------------------------

/// How often the capture loop checks the stop flag while the microphone is
/// quiet.
const CAPTURE_POLL: Duration = Duration::from_millis(200);

/// Open the microphone on its own thread and feed frames to the session
/// until `stop` is set or the session goes away.
fn spawn_capture(
    snapshot: &SessionSnapshot,
    handle: SessionHandle,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let device = snapshot.audio.input_device.clone();
    let target_rate = snapshot.audio.sample_rate;
    let frame_len = snapshot.samples_per_frame();
    let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), String>>();

    let thread = std::thread::Builder::new()
        .name("audio-capture".into())
        .spawn(move || {
            let (chunk_tx, chunk_rx) = std_mpsc::channel::<AudioChunk>();
            let started = AudioCapture::open(device.as_deref())
                .and_then(|capture| capture.start(chunk_tx).map(|stream| (capture, stream)));
            let (capture, stream) = match started {
                Ok(ok) => ok,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            let channels = capture.channels();
            let mut resampler = StreamResampler::new(capture.sample_rate(), target_rate);
            let mut chunker = FrameChunker::new(target_rate, frame_len);

            'capture: while !stop.load(Ordering::Acquire) {
                let chunk = match chunk_rx.recv_timeout(CAPTURE_POLL) {
                    Ok(chunk) => chunk,
                    Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                };
                let mono = downmix(&chunk.samples, channels);
                for frame in chunker.push(&resampler.process(&mono)) {
                    if handle.blocking_send_frame(frame).is_err() {
                        break 'capture;
                    }
                }
            }

            drop(stream);
            // The session may already be gone when shutdown came first.
            let _ = handle.blocking_capture_closed();
            log::info!("capture: stopped");
        })
        .context("failed to spawn audio-capture thread")?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(thread),
        Ok(Err(e)) => anyhow::bail!("cannot open microphone: {e}"),
        Err(_) => anyhow::bail!("capture thread exited during setup"),
    }
}

// ---------------------------------------------------------------------------
// Async main
// ---------------------------------------------------------------------------

async fn run(snapshot: Arc<SessionSnapshot>, paths: AppPaths) -> Result<()> {
    let stt = HttpTranscriber::from_snapshot(&snapshot);
    stt.health_check().await?;
    let synth = HttpSynthesizer::from_snapshot(&snapshot);
    synth.health_check().await?;

    let output = CpalOutput::open(snapshot.audio.output_device.clone()).context("cannot open speaker")?;
    let injector = Arc::new(DesktopInjector::from_snapshot(&snapshot));

    let session = Session::start(
        Arc::clone(&snapshot),
        SessionServices {
            stt: Arc::new(stt),
            synth: Arc::new(synth),
            output: Arc::new(output),
            text_sink: Arc::new(InjectionSink::new(&snapshot, injector)),
        },
        Journal::new(paths.conversation_log.clone()),
    );
    let handle = session.handle();

    let stop = Arc::new(AtomicBool::new(false));
    let capture = spawn_capture(&snapshot, handle.clone(), Arc::clone(&stop))?;
    log::info!(
        "voice-relay: listening; say {:?} to start",
        snapshot.keywords.wake().first().map(|p| p.text()).unwrap_or_default()
    );

    // Assistant replies arrive on stdin, one per line.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("voice-relay: interrupted");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(text)) if text.trim().is_empty() => {}
                Ok(Some(text)) => {
                    if handle.speak(text).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    log::info!("voice-relay: stdin closed");
                    break;
                }
                Err(e) => {
                    log::warn!("voice-relay: stdin: {e}");
                    break;
                }
            },
        }
    }

    stop.store(true, Ordering::Release);
    let _ = handle.shutdown().await;
    drop(handle);
    session.join().await?;

    tokio::task::spawn_blocking(move || capture.join())
        .await?
        .map_err(|_| anyhow::anyhow!("capture thread panicked"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-relay starting up");

    // 2. Configuration
    let paths = AppPaths::new();
    let mut config = AppConfig::load_from(&paths.settings_file)
        .with_context(|| format!("cannot read {}", paths.settings_file.display()))?;
    config.apply_env_overrides();
    let snapshot = Arc::new(config.validate()?);

    // 3. Single instance
    let _lock = InstanceLock::acquire(&paths.lock_file)?;

    // 4-8. Runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;
    rt.block_on(run(snapshot, paths))
}
