//! Live import progress reporting.
//!
//! Reports observable progress during `arv import` so users see which
//! phase a job is in and how much of it is done. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.
//!
//! The reporter is a decoupled observer: the same phase/progress values
//! are persisted on the job row first, so a disconnected observer loses
//! nothing.

use std::io::Write;

/// A single progress event for an import job.
#[derive(Clone, Debug)]
pub enum ImportEvent {
    /// A phase began; item counts unknown yet.
    PhaseStarted { job_id: String, phase: String },
    /// Per-item progress inside a phase. `progress` is the overall job
    /// fraction in [0, 1], non-decreasing.
    Progress {
        job_id: String,
        phase: String,
        progress: f64,
        n: u64,
        total: u64,
    },
}

/// Reports import progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ImportEvent);
}

/// Human-friendly progress on stderr:
/// `import 9f3c…  media  42%  1,204 / 2,880 items`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ImportEvent) {
        let line = match &event {
            ImportEvent::PhaseStarted { job_id, phase } => {
                format!("import {}  {}...\n", short_id(job_id), phase)
            }
            ImportEvent::Progress {
                job_id,
                phase,
                progress,
                n,
                total,
            } => format!(
                "import {}  {}  {:>3.0}%  {} / {} items\n",
                short_id(job_id),
                phase,
                progress * 100.0,
                format_number(*n),
                format_number(*total)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ImportEvent) {
        let obj = match &event {
            ImportEvent::PhaseStarted { job_id, phase } => serde_json::json!({
                "event": "progress",
                "job_id": job_id,
                "phase": phase,
                "started": true
            }),
            ImportEvent::Progress {
                job_id,
                phase,
                progress,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "job_id": job_id,
                "phase": phase,
                "progress": progress,
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ImportEvent) {}
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode. Caller passes it to `run_import`.
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
