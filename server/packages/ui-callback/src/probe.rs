use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Reports whether the transport behind a blocked poll still accepts writes.
///
/// Called once per check interval while a poll is blocked. Implementations
/// must not panic on a broken connection; they report it as not alive.
pub trait ConnectionProbe: Send + Sync {
    fn is_alive(&self) -> bool;
}

impl<F> ConnectionProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_alive(&self) -> bool {
        self()
    }
}

/// Shared flag the transport flips once the client connection is gone.
#[derive(Debug, Clone, Default)]
pub struct ConnectionFlag {
    closed: Arc<AtomicBool>,
}

impl ConnectionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ConnectionProbe for ConnectionFlag {
    fn is_alive(&self) -> bool {
        !self.is_closed()
    }
}

/// Probes a response writer by pushing a single space through it.
///
/// Whitespace is ignored by the client-side parser, so the write is
/// harmless when the connection is healthy.
#[derive(Debug)]
pub struct WriteProbe<W> {
    writer: Mutex<W>,
}

impl<W> WriteProbe<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W> ConnectionProbe for WriteProbe<W>
where
    W: Write + Send,
{
    fn is_alive(&self) -> bool {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        match writer.write_all(b" ").and_then(|()| writer.flush()) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(error = %err, "connection probe: write rejected");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn closures_are_probes() {
        let alive = || true;
        let dead = || false;
        assert!(alive.is_alive());
        assert!(!dead.is_alive());
    }

    #[test]
    fn flag_reports_dead_after_close() {
        let flag = ConnectionFlag::new();
        let transport_side = flag.clone();
        assert!(flag.is_alive());

        transport_side.close();
        assert!(!flag.is_alive());
    }

    #[test]
    fn write_probe_writes_whitespace() {
        let probe = WriteProbe::new(Vec::new());
        assert!(probe.is_alive());
        assert!(probe.is_alive());
        assert_eq!(probe.into_inner(), b"  ".to_vec());
    }

    #[test]
    fn write_probe_reports_broken_pipe_as_dead() {
        let probe = WriteProbe::new(BrokenPipe);
        assert!(!probe.is_alive());
    }
}
