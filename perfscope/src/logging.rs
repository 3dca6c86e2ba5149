//! Per-session logging capability
//!
//! Every component that reports progress receives a [`SessionLog`] when it is
//! constructed instead of writing to a process-wide logger. A host embedding
//! the library can route messages anywhere by supplying a closure; the default
//! sink forwards to the `log` facade, so the `perfscope` binary's
//! `env_logger` setup picks everything up.

use log::Level;
use std::fmt;
use std::sync::Arc;

/// Target used when forwarding to the `log` facade
pub const LOG_TARGET: &str = "perfscope";

type Sink = dyn Fn(Level, &str) + Send + Sync;

/// Cloneable handle to a session's log sink
#[derive(Clone)]
pub struct SessionLog {
    sink: Arc<Sink>,
}

impl SessionLog {
    /// Route messages to a custom sink
    pub fn new(sink: impl Fn(Level, &str) + Send + Sync + 'static) -> Self {
        Self { sink: Arc::new(sink) }
    }

    /// Forward messages to the `log` facade under [`LOG_TARGET`]
    #[must_use]
    pub fn forwarding() -> Self {
        Self::new(|level, message| log::log!(target: LOG_TARGET, level, "{message}"))
    }

    /// Drop every message
    #[must_use]
    pub fn silent() -> Self {
        Self::new(|_, _| {})
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        match args.as_str() {
            Some(message) => (self.sink)(level, message),
            None => (self.sink)(level, &args.to_string()),
        }
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::forwarding()
    }
}

impl fmt::Debug for SessionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLog").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_custom_sink_receives_messages() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let log = SessionLog::new(move |level, message| {
            sink.lock().unwrap().push((level, message.to_string()));
        });

        log.error(format_args!("failed to open {}", "/proc/kallsyms"));

        let messages = captured.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, Level::Error);
        assert_eq!(messages[0].1, "failed to open /proc/kallsyms");
    }

    #[test]
    fn test_silent_sink_is_cloneable() {
        let log = SessionLog::silent();
        let copy = log.clone();
        copy.info(format_args!("ignored"));
    }
}
