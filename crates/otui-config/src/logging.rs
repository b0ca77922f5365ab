//! Debug log sink: a lazily-initialized file sink that can be pointed at a
//! new location once the data directory is known. Early logs target the
//! cache directory; later logs rotate to the data directory.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock, RwLock},
};

use tracing_subscriber::EnvFilter;

static SINK: OnceLock<RwLock<Option<Mutex<std::fs::File>>>> = OnceLock::new();

fn sink() -> &'static RwLock<Option<Mutex<std::fs::File>>> {
    SINK.get_or_init(|| RwLock::new(None))
}

#[derive(Clone)]
struct SinkWriter;

impl std::io::Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(file) = sink().read().expect("sink lock poisoned").as_ref()
            && let Ok(mut f) = file.lock()
        {
            let _ = f.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SinkWriter {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter
    }
}

/// Initialize the global `tracing` subscriber. `debug` comes from
/// `OTUI_DEBUG`; when set, the default filter level is `debug` instead of
/// `info`. Logs go to stderr AND, once a sink file has been attached via
/// [`point_at`], to that file as well.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug { "debug" } else { "info" })
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(SinkWriter)
        .try_init();
}

/// Point the debug-log sink at a file under `dir` (the cache directory at
/// startup, the data directory once it is known). Replaces any previous
/// sink.
pub fn point_at(dir: &Path, filename: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    *sink().write().expect("sink lock poisoned") = Some(Mutex::new(file));
    Ok(path)
}
