//! Import progress on stderr, so stdout stays parseable for `--json`.

use serde_json::{json, Value};

#[derive(Clone, Debug)]
pub enum ImportProgressEvent {
    /// Listing the import root; no total yet.
    Discovering { collection: String },
    /// `n` of `total` files handled, `file` being the last one.
    Importing {
        collection: String,
        file: String,
        n: u64,
        total: u64,
    },
}

impl ImportProgressEvent {
    fn human(&self) -> String {
        match self {
            ImportProgressEvent::Discovering { collection } => {
                format!("import {}  discovering...", collection)
            }
            ImportProgressEvent::Importing {
                collection,
                file,
                n,
                total,
            } => format!("import {}  [{}/{}] {}", collection, n, total, file),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ImportProgressEvent::Discovering { collection } => json!({
                "event": "progress",
                "collection": collection,
                "phase": "discovering",
            }),
            ImportProgressEvent::Importing {
                collection,
                file,
                n,
                total,
            } => json!({
                "event": "progress",
                "collection": collection,
                "phase": "importing",
                "file": file,
                "n": n,
                "total": total,
            }),
        }
    }
}

pub trait ImportProgressReporter: Send + Sync {
    fn report(&self, event: ImportProgressEvent);
}

pub struct StderrProgress;

impl ImportProgressReporter for StderrProgress {
    fn report(&self, event: ImportProgressEvent) {
        eprintln!("{}", event.human());
    }
}

/// One JSON object per line.
pub struct JsonProgress;

impl ImportProgressReporter for JsonProgress {
    fn report(&self, event: ImportProgressEvent) {
        eprintln!("{}", event.to_json());
    }
}

pub struct NoProgress;

impl ImportProgressReporter for NoProgress {
    fn report(&self, _event: ImportProgressEvent) {}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human output when stderr is a terminal, otherwise silent.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn ImportProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
