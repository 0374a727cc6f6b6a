//! Run log: one timestamped file per batch of conversions

use crate::utils::date_time_filename;
use crate::{Error, Result};
use chrono::{Local, Utc};
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

const RULE: &str = "----------------------------------------";

/// Record of one batch run.
///
/// Every line is prefixed with the seconds since the log was opened and the
/// seconds since the previous line. Outcomes recorded through
/// [`RunLog::converted`] and [`RunLog::failed`] are tallied in the footer
/// written when the last clone is dropped.
#[derive(Clone)]
pub struct RunLog {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    path: PathBuf,
    opened: Instant,
    /// Mirror every line on stderr
    echo: bool,
}

struct State {
    out: BufWriter<File>,
    previous: f32,
    converted: usize,
    failed: usize,
}

impl RunLog {
    /// Create `path`, or `stl2scad_<timestamp>.log` inside it when `path` is a
    /// directory. With `echo`, lines are also written to stderr.
    pub fn new(path: &Path, echo: bool) -> Result<Self> {
        let path = if path.is_dir() {
            path.join(date_time_filename("stl2scad_", ".log"))
        } else {
            path.to_path_buf()
        };

        let file = File::create(&path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("cannot create run log {}: {}", path.display(), e),
            ))
        })?;

        let log = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    out: BufWriter::new(file),
                    previous: 0.0,
                    converted: 0,
                    failed: 0,
                }),
                path,
                opened: Instant::now(),
                echo,
            }),
        };

        log.log(format!(
            "stl2scad {} ({} {}), {} threads available",
            env!("CARGO_PKG_VERSION"),
            env::consts::OS,
            env::consts::ARCH,
            std::thread::available_parallelism()
                .map(|c| c.get())
                .unwrap_or(1)
        ))?;
        log.log(format!(
            "started {} / {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            Local::now().format("%Y-%m-%d %H:%M:%S %z")
        ))?;
        log.log(format!("args: {}", env::args().collect::<Vec<_>>().join(" ")))?;
        log.log(RULE)?;

        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Write every line of `message` with the time prefix
    pub fn log(&self, message: impl AsRef<str>) -> Result<()> {
        let mut state = self.shared.lock();
        self.shared.write(&mut state, message.as_ref())
    }

    /// Record a finished conversion. `output` is `None` when the source went
    /// to stdout.
    pub fn converted(&self, input: &Path, output: Option<&Path>, partial: bool) -> Result<()> {
        let destination = output.map_or_else(|| "stdout".to_string(), |p| p.display().to_string());
        let note = if partial { " (partial)" } else { "" };
        let mut state = self.shared.lock();
        state.converted += 1;
        self.shared.write(
            &mut state,
            &format!("ok     {} -> {}{}", input.display(), destination, note),
        )
    }

    /// Record a conversion that produced nothing
    pub fn failed(&self, input: &Path, message: &str) -> Result<()> {
        let mut state = self.shared.lock();
        state.failed += 1;
        self.shared
            .write(&mut state, &format!("FAILED {}: {}", input.display(), message))
    }
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, state: &mut State, message: &str) -> Result<()> {
        let now = self.opened.elapsed().as_secs_f32();
        let prefix = format!("{:7.0}s {:6.1}+ ", now, now - state.previous);

        for line in message.split('\n') {
            if self.echo {
                eprintln!("{}{}", prefix, line);
            }
            writeln!(state.out, "{}{}", prefix, line)?;
        }
        state.out.flush()?;
        state.previous = now;
        Ok(())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let mut state = self.lock();
        let summary = format!(
            "{}\n{} converted, {} failed\nclosed {}",
            RULE,
            state.converted,
            state.failed,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = self.write(&mut state, &summary);
    }
}
