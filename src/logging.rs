//! env_logger setup: log lines go to stderr and, optionally, to a file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use env_logger::{Env, Target};

pub const DEFAULT_LOG_FILE: &str = "food_products.log";

/// Writes every buffer to both sinks.
pub struct Tee<A, B> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> Tee<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}

/// Append-only, created on first use.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global logger. `RUST_LOG` overrides the verbosity flag.
pub fn init(verbose: bool, log_file: Option<&Path>) {
    let default_filter = if verbose { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default_filter));

    let file_error = match log_file.map(open_log_file) {
        Some(Ok(file)) => {
            builder.target(Target::Pipe(Box::new(Tee::new(io::stderr(), file))));
            None
        }
        Some(Err(e)) => Some(e),
        None => None,
    };
    builder.init();

    if let (Some(path), Some(e)) = (log_file, file_error) {
        log::warn!("Logging to stderr only, cannot open {}: {}", path.display(), e);
    }
}
