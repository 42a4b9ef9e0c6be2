//! FormCoach replay: run a recorded keypoint stream through a coach session.
//!
//! Input is newline-delimited JSON, one frame per line: a pose object
//! (`{"keypoints":[{"name":"left_knee","x":0.4,"y":0.7,"score":0.92}, ...]}`) or
//! `null` for a frame with nobody in view.
//!
//! Usage:
//!   cargo run -p formcoach-replay -- --exercise squat [--input frames.ndjson] [--fps 30] [--audio]
//!
//! Reads stdin when `--input` is omitted. Prints one line per frame and a JSON
//! summary at the end.

use formcoach_core::{create_advisor, AdvisorySettings, CoachConfig, CoachSession, ExerciseTable, FrameOutcome, PoseFrame};
use formcoach_voice::{create_narrator, run_coach_loop};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FPS: u64 = 30;

struct Args {
    exercise: String,
    input: Option<String>,
    fps: u64,
    audio: bool,
}

fn usage() {
    eprintln!("Usage: formcoach-replay --exercise <squat|pushup|lunge> [options]");
    eprintln!("  --input PATH   NDJSON keypoint recording (default: stdin)");
    eprintln!("  --fps N        Replay rate in frames per second (default 30, 0 = as fast as possible)");
    eprintln!("  --audio        Speak through TTS + speakers (needs TTS_API_KEY)");
}

fn parse_args() -> Option<Args> {
    let mut args = std::env::args().skip(1);
    let mut exercise = None;
    let mut input = None;
    let mut fps = DEFAULT_FPS;
    let mut audio = false;
    while let Some(a) = args.next() {
        match a.as_str() {
            "--exercise" => exercise = args.next(),
            "--input" => input = args.next(),
            "--fps" => fps = args.next()?.parse().ok()?,
            "--audio" => audio = true,
            "-h" | "--help" => return None,
            other => {
                eprintln!("unknown argument: {}", other);
                return None;
            }
        }
    }
    Some(Args {
        exercise: exercise?,
        input,
        fps,
        audio,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[formcoach-replay] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(args) = parse_args() else {
        usage();
        std::process::exit(2);
    };

    let config = CoachConfig::load()?;
    let advisor = create_advisor(&AdvisorySettings::from_env());
    let session = CoachSession::start(&ExerciseTable::builtin(), &args.exercise, config, advisor)?;
    let narrator = create_narrator(args.audio);

    let (tx, rx) = mpsc::channel(64);
    let pace = (args.fps > 0).then(|| Duration::from_micros((1_000_000 / args.fps).max(1)));
    let reader = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            tokio::spawn(feed_frames(BufReader::new(file), tx, pace))
        }
        None => tokio::spawn(feed_frames(BufReader::new(tokio::io::stdin()), tx, pace)),
    };

    let on_outcome: formcoach_voice::OnOutcome = Some(Arc::new(|out: &FrameOutcome| {
        let message = out.event.as_ref().map(|e| e.message.as_str()).unwrap_or("-");
        println!("{:>10} reps={:<3} {}", out.phase.as_str(), out.rep_count, message);
    }));

    let summary = run_coach_loop(session, rx, narrator, on_outcome, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("CTRL-C received; stopping replay");
    })
    .await?;
    reader.abort();

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Parse NDJSON frames and forward them, optionally at a fixed rate.
async fn feed_frames<R>(reader: R, tx: mpsc::Sender<Option<PoseFrame>>, pace: Option<Duration>)
where
    R: AsyncBufRead + Unpin,
{
    let mut interval = pace.map(tokio::time::interval);
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "input read failed");
                break;
            }
        };
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let frame: Option<PoseFrame> = match serde_json::from_str(line) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "skipping malformed frame");
                continue;
            }
        };
        if let Some(interval) = interval.as_mut() {
            interval.tick().await;
        }
        if tx.send(frame).await.is_err() {
            break;
        }
    }
}
