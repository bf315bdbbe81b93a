use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info, warn, LevelFilter};
use serde::Deserialize;
use simplelog::{Config, WriteLogger};

use route_nav::{EventCallback, Path, Point, ProgressTracker, TrackerConfig};

/// One recorded input to replay
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Step {
    Location(Point),
    Gps { found: bool },
    Forward,
    Backward,
    /// Let deferred events come due
    Wait { ms: u64 },
}

#[derive(Debug, Deserialize)]
struct Session {
    path: Path,
    #[serde(default)]
    config: Option<TrackerConfig>,
    steps: Vec<Step>,
}

const INDEX_TIMEOUT: Duration = Duration::from_secs(30);

fn usage(program: &str) -> String {
    format!("Usage: {} [-v] [--config <config.json>] <session.json>", program)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map_or("route-nav", |s| s.as_str());

    let mut verbose = false;
    let mut config_path: Option<&str> = None;
    let mut session_path: Option<&str> = None;
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "-v" | "--verbose" => verbose = true,
            "--config" => config_path = rest.next().map(String::as_str),
            other if session_path.is_none() => session_path = Some(other),
            _ => {
                eprintln!("{}", usage(program));
                return Err("Invalid arguments".into());
            }
        }
    }
    let Some(session_path) = session_path else {
        eprintln!("{}", usage(program));
        return Err("Invalid arguments".into());
    };

    // Events go to stdout as JSON lines, logs to stderr
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    WriteLogger::init(level, Config::default(), std::io::stderr())?;

    let session: Session = serde_json::from_str(&std::fs::read_to_string(session_path)?)?;
    let config = match config_path {
        Some(path) => TrackerConfig::from_file(path)?,
        None => session.config.unwrap_or_default(),
    };
    info!(
        "Replaying {} steps over a {}-point path",
        session.steps.len(),
        session.path.len()
    );

    let tracker = ProgressTracker::new(session.path, config)?;
    tracker.add_listener(Arc::new(EventCallback::new(|event| match serde_json::to_string(&event) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Could not serialize {} event: {}", event.kind(), e),
    })));

    if let Err(e) = tracker.wait_until_ready(INDEX_TIMEOUT) {
        error!("Navigation unavailable: {}", e);
        return Err(e.into());
    }

    for step in session.steps {
        match step {
            Step::Location(point) => tracker.set_location(point),
            Step::Gps { found } => tracker.set_gps_status(found),
            Step::Forward => {
                tracker.move_objective_forward();
            }
            Step::Backward => {
                tracker.move_objective_backward();
            }
            Step::Wait { ms } => thread::sleep(Duration::from_millis(ms)),
        }
    }

    info!(
        "Replay finished: objective {:?}, departed {:?}, route complete: {}",
        tracker.objective().map(|o| o.index),
        tracker.departed(),
        tracker.is_route_complete()
    );
    tracker.dispose();
    Ok(())
}
