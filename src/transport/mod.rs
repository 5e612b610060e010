//! Transport module - Owns the serial link to the display
//!
//! - `queue`: Outbound frame queue shared with the bridge
//! - `serial`: Serial-port backed connector
//!
//! The transport runs on its own thread. It reconnects forever, drops
//! frames queued before a (re)connect, paces writes for the display's
//! receive buffer, and logs whatever text lines the display sends back.

mod queue;
mod serial;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub use queue::{outbound_queue, OutboundQueue, OutboundReceiver};
pub use serial::{list_ports, PortListing, SerialPortConnector};

/// Longest diagnostic line kept before it is flushed unterminated
const MAX_LINE_LEN: usize = 1024;

/// An open, bidirectional link to the display
pub trait SerialLink: Send {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Append whatever is available without waiting. Returns bytes read.
    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;
}

/// Opens links on demand
pub trait Connector: Send {
    fn describe(&self) -> String;

    fn open(&mut self) -> io::Result<Box<dyn SerialLink>>;
}

/// Delay after each write, by frame size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Frames shorter than this get `small_delay`
    pub small_frame_threshold: usize,
    pub small_delay: Duration,
    pub large_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            small_frame_threshold: 50,
            small_delay: Duration::from_millis(50),
            large_delay: Duration::from_millis(1),
        }
    }
}

impl Pacing {
    pub fn delay_for(&self, frame_len: usize) -> Duration {
        if frame_len < self.small_frame_threshold {
            self.small_delay
        } else {
            self.large_delay
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransportSettings {
    pub pacing: Pacing,
    pub reconnect_backoff: Duration,
    /// Sleep between polls when there is nothing to send
    pub idle_poll: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            pacing: Pacing::default(),
            reconnect_backoff: Duration::from_secs(2),
            idle_poll: Duration::from_millis(1),
        }
    }
}

/// Splits inbound bytes into newline-terminated text lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Feed raw bytes, get back every completed non-empty line.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in bytes {
            if b == b'\n' || self.pending.len() >= MAX_LINE_LEN {
                self.flush_into(&mut lines);
                if b == b'\n' {
                    continue;
                }
            }
            self.pending.push(b);
        }
        lines
    }

    fn flush_into(&mut self, lines: &mut Vec<String>) {
        let line = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        if !line.is_empty() {
            lines.push(line);
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

pub struct SerialTransport<C: Connector> {
    connector: C,
    queue: OutboundReceiver,
    settings: TransportSettings,
    shutdown: Arc<AtomicBool>,
    lines: LineBuffer,
    /// Connection attempts so far, successful or not
    attempts: u64,
}

impl<C: Connector> SerialTransport<C> {
    pub fn new(
        connector: C,
        queue: OutboundReceiver,
        settings: TransportSettings,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            connector,
            queue,
            settings,
            shutdown,
            lines: LineBuffer::default(),
            attempts: 0,
        }
    }

    fn should_stop(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst) || self.queue.is_closed()
    }

    /// Sleep in small steps so shutdown is noticed during backoff
    fn pause(&self, total: Duration) {
        let deadline = Instant::now() + total;
        let step = Duration::from_millis(50);
        while !self.shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(step.min(deadline - now));
        }
    }

    /// Reconnect loop. Returns only on shutdown or when every producer is gone.
    pub fn run(mut self) -> u64 {
        let target = self.connector.describe();
        tracing::info!(port = %target, "Serial transport started");

        while !self.should_stop() {
            self.attempts += 1;
            match self.connector.open() {
                Ok(link) => {
                    let dropped = self.queue.clear();
                    self.lines.clear();
                    tracing::info!(port = %target, attempt = self.attempts, dropped, "Connected");
                    match self.serve(link) {
                        Ok(()) => break,
                        Err(e) => {
                            tracing::warn!(port = %target, error = %e, "Serial link failed");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(port = %target, attempt = self.attempts, error = %e, "Could not open serial port");
                }
            }
            if self.should_stop() {
                break;
            }
            self.pause(self.settings.reconnect_backoff);
        }

        tracing::info!(port = %target, "Serial transport stopped");
        self.attempts
    }

    /// Pump frames out and lines in until shutdown or an I/O error.
    /// The link is closed when it goes out of scope.
    fn serve(&mut self, mut link: Box<dyn SerialLink>) -> io::Result<()> {
        let mut inbound = Vec::new();
        loop {
            while let Some(frame) = self.queue.try_pop() {
                link.write_frame(&frame)?;
                tracing::trace!(len = frame.len(), "Frame written");
                std::thread::sleep(self.settings.pacing.delay_for(frame.len()));
            }

            inbound.clear();
            if link.read_available(&mut inbound)? > 0 {
                for line in self.lines.push(&inbound) {
                    tracing::info!(target: "nowplaying_bridge::device", "{}", line);
                }
            }

            if self.should_stop() {
                return Ok(());
            }
            std::thread::sleep(self.settings.idle_poll);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// What the fake link saw, shared with the test
    #[derive(Default)]
    struct Wire {
        written: Vec<Vec<u8>>,
        inbound: VecDeque<Vec<u8>>,
        fail_writes_after: Option<usize>,
    }

    struct FakeLink {
        wire: Arc<Mutex<Wire>>,
    }

    impl SerialLink for FakeLink {
        fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
            let mut wire = self.wire.lock().unwrap();
            if let Some(limit) = wire.fail_writes_after {
                if wire.written.len() >= limit {
                    wire.fail_writes_after = None;
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
                }
            }
            wire.written.push(bytes.to_vec());
            Ok(())
        }

        fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
            let mut wire = self.wire.lock().unwrap();
            match wire.inbound.pop_front() {
                Some(bytes) => {
                    buf.extend_from_slice(&bytes);
                    Ok(bytes.len())
                }
                None => Ok(0),
            }
        }
    }

    /// Fails the first `failures` opens, then hands out links to `wire`.
    /// Once `stop_after_opens` links were handed out, requests shutdown.
    struct FakeConnector {
        failures: usize,
        opens: Arc<Mutex<usize>>,
        wire: Arc<Mutex<Wire>>,
        shutdown: Arc<AtomicBool>,
        stop_after_opens: usize,
    }

    impl Connector for FakeConnector {
        fn describe(&self) -> String {
            "fake".into()
        }

        fn open(&mut self) -> io::Result<Box<dyn SerialLink>> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such port"));
            }
            let mut opens = self.opens.lock().unwrap();
            *opens += 1;
            if *opens >= self.stop_after_opens {
                self.shutdown.store(true, Ordering::SeqCst);
            }
            Ok(Box::new(FakeLink {
                wire: self.wire.clone(),
            }))
        }
    }

    fn fast_settings() -> TransportSettings {
        TransportSettings {
            pacing: Pacing {
                small_frame_threshold: 50,
                small_delay: Duration::ZERO,
                large_delay: Duration::ZERO,
            },
            reconnect_backoff: Duration::from_millis(1),
            idle_poll: Duration::from_millis(1),
        }
    }

    fn connector(failures: usize, stop_after_opens: usize) -> (FakeConnector, Arc<Mutex<Wire>>, Arc<AtomicBool>) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let c = FakeConnector {
            failures,
            opens: Arc::new(Mutex::new(0)),
            wire: wire.clone(),
            shutdown: shutdown.clone(),
            stop_after_opens,
        };
        (c, wire, shutdown)
    }

    #[test]
    fn test_pacing_by_size() {
        let pacing = Pacing::default();
        assert_eq!(pacing.delay_for(10), Duration::from_millis(50));
        assert_eq!(pacing.delay_for(49), Duration::from_millis(50));
        assert_eq!(pacing.delay_for(50), Duration::from_millis(1));
        assert_eq!(pacing.delay_for(3081), Duration::from_millis(1));
    }

    #[test]
    fn test_line_buffer_splits_and_trims() {
        let mut lines = LineBuffer::default();
        assert!(lines.push(b"hel").is_empty());
        assert_eq!(lines.push(b"lo\r\nwor"), vec!["hello".to_string()]);
        assert_eq!(lines.push(b"ld\n\n"), vec!["world".to_string()]);
    }

    #[test]
    fn test_line_buffer_tolerates_bad_utf8() {
        let mut lines = LineBuffer::default();
        let out = lines.push(b"ok \xFF\xFE done\n");
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("ok"));
        assert!(out[0].ends_with("done"));
    }

    #[test]
    fn test_line_buffer_caps_unterminated_lines() {
        let mut lines = LineBuffer::default();
        let out = lines.push(&vec![b'a'; MAX_LINE_LEN + 5]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), MAX_LINE_LEN);
    }

    #[test]
    fn test_reconnects_after_open_failures() {
        let (connector, _wire, shutdown) = connector(3, 1);
        let (_queue, rx) = outbound_queue();

        let attempts = SerialTransport::new(connector, rx, fast_settings(), shutdown).run();

        assert_eq!(attempts, 4);
    }

    #[test]
    fn test_stale_frames_dropped_on_connect() {
        let (connector, wire, shutdown) = connector(2, usize::MAX);
        let (queue, rx) = outbound_queue();
        // Queued while the port is still failing to open
        queue.push(messages::playback_state(1));
        let transport = SerialTransport::new(connector, rx, fast_settings(), shutdown.clone());
        let handle = std::thread::spawn(move || transport.run());

        while wire.lock().unwrap().written.is_empty() {
            queue.push(messages::playback_state(7));
            std::thread::sleep(Duration::from_millis(5));
        }
        shutdown.store(true, Ordering::SeqCst);

        assert_eq!(handle.join().unwrap(), 3);
        let written = &wire.lock().unwrap().written;
        assert!(written.iter().all(|f| f[4] == 7));
    }

    #[test]
    fn test_drains_queue_then_stops_when_producers_gone() {
        let (connector, wire, shutdown) = connector(0, usize::MAX);
        let (queue, rx) = outbound_queue();
        let transport = SerialTransport::new(connector, rx, fast_settings(), shutdown);
        let handle = std::thread::spawn(move || transport.run());

        // Wait for the connect so the frames aren't cleared as stale
        while wire.lock().unwrap().written.is_empty() {
            queue.push(messages::playback_state(7));
            std::thread::sleep(Duration::from_millis(5));
        }
        queue.push_all([messages::art_end(), messages::playback_state(8)]);
        drop(queue);

        assert_eq!(handle.join().unwrap(), 1);
        let written = &wire.lock().unwrap().written;
        let last = written.last().unwrap();
        assert_eq!(last[4], 8);
        assert_eq!(written[written.len() - 2], messages::art_end().encode());
    }

    #[test]
    fn test_write_failure_triggers_reconnect() {
        let (connector, wire, shutdown) = connector(0, 2);
        wire.lock().unwrap().fail_writes_after = Some(0);
        let (queue, rx) = outbound_queue();
        let transport = SerialTransport::new(connector, rx, fast_settings(), shutdown);
        let handle = std::thread::spawn(move || transport.run());

        // Keep feeding until the first write fails and a second open happens
        while !handle.is_finished() {
            queue.push(messages::art_end());
            std::thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(handle.join().unwrap(), 2);
    }

    #[test]
    fn test_inbound_lines_are_consumed() {
        let (connector, wire, shutdown) = connector(0, 1);
        wire.lock()
            .unwrap()
            .inbound
            .extend([b"READY\n".to_vec(), b"ART OK\n".to_vec()]);
        let (_queue, rx) = outbound_queue();

        SerialTransport::new(connector, rx, fast_settings(), shutdown).run();

        // One read per serve pass; shutdown was already requested, so only the first is taken
        assert_eq!(wire.lock().unwrap().inbound.len(), 1);
    }
}
