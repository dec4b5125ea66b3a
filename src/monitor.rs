//! Supervision of the shell host process.
//!
//! The desktop service lives inside the shell host (`explorer.exe`).  When
//! the host dies and comes back, every handle to the service is stale; when
//! it is not running at all, there is no service to talk to.
//! [`ProcessMonitor`] turns the shell's broadcast signals into:
//!
//! * a blocking [`ensure_host_is_alive`](ProcessMonitor::ensure_host_is_alive),
//! * host-restarted notifications, for restarts deskjump did not ask for,
//! * color-scheme notifications with replay of the current value on subscribe.
//!
//! Signals arrive as [`ShellSignal`]s over an [`mpsc`] channel and are
//! handled on a dedicated listener thread.

use crate::traits::ShellHost;
use log::{debug, info, warn};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

/// Broadcasts from the shell that the monitor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellSignal {
    /// The taskbar was (re)created, i.e. the host finished starting.
    HostReady,
    /// A system setting changed; the theme may be different now.
    SettingsChanged,
}

type ColorSchemeHandler = Arc<dyn Fn(bool) + Send + Sync>;
type HostRestartedHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct MonitorState {
    /// An `ensure_host_is_alive` call launched the host and is waiting.
    awaiting_host: bool,
    /// `HostReady` arrived while `awaiting_host` was set.
    host_ready: bool,
    /// The signal channel is gone; nothing will wake a waiter.
    closed: bool,
    light: bool,
    scheme_subscribers: Vec<ColorSchemeHandler>,
    restart_subscribers: Vec<HostRestartedHandler>,
}

struct Shared {
    state: Mutex<MonitorState>,
    ready: Condvar,
    /// Held while color-scheme handlers run, so a replay and a change
    /// notification never interleave.
    scheme_delivery: Mutex<()>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_scheme_delivery(&self) -> MutexGuard<'_, ()> {
        self.scheme_delivery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Watches the shell host and relays its signals.
pub struct ProcessMonitor<H: ShellHost + 'static> {
    host: Arc<H>,
    shared: Arc<Shared>,
}

impl<H: ShellHost + 'static> ProcessMonitor<H> {
    /// Start listening for `signals`.
    ///
    /// The current theme is read once here so the first subscriber gets a
    /// value right away.
    pub fn spawn(host: H, signals: mpsc::Receiver<ShellSignal>) -> std::io::Result<Self> {
        let host = Arc::new(host);
        let shared = Arc::new(Shared {
            state: Mutex::new(MonitorState {
                light: host.is_light_theme(),
                ..MonitorState::default()
            }),
            ready: Condvar::new(),
            scheme_delivery: Mutex::new(()),
        });

        {
            let host = Arc::clone(&host);
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("shell-monitor".into())
                .spawn(move || listen(host.as_ref(), &shared, signals))?;
        }

        Ok(Self { host, shared })
    }

    /// Make sure the shell host is running.
    ///
    /// If it is not, start it and block until it reports ready.  There is
    /// no timeout: without a host there is nothing useful to do.
    pub fn ensure_host_is_alive(&self) -> std::io::Result<()> {
        if self.host.is_running() {
            return Ok(());
        }

        {
            let mut st = self.shared.lock();
            st.awaiting_host = true;
            st.host_ready = false;
        }

        info!("shell host is not running, starting it");
        if let Err(e) = self.host.launch() {
            self.shared.lock().awaiting_host = false;
            return Err(e);
        }

        let mut st = self.shared.lock();
        while !st.host_ready && !st.closed {
            st = self
                .shared
                .ready
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
        st.awaiting_host = false;
        if st.host_ready {
            info!("shell host is ready");
            Ok(())
        } else {
            Err(std::io::Error::other("shell signal source closed"))
        }
    }

    /// Force-terminate the shell host and wait for it to exit.
    pub fn kill_host(&self) -> std::io::Result<()> {
        warn!("terminating the shell host");
        self.host.kill()
    }

    /// Whether the system uses the light theme, as last seen.
    pub fn is_light_mode(&self) -> bool {
        self.shared.lock().light
    }

    /// Call `handler` with the current theme now and again on every change.
    ///
    /// The first call always carries the value current at subscription;
    /// later changes are delivered after it, in order.  `handler` must not
    /// subscribe to color-scheme changes itself.
    pub fn subscribe_color_scheme(&self, handler: impl Fn(bool) + Send + Sync + 'static) {
        let handler: ColorSchemeHandler = Arc::new(handler);
        let _delivery = self.shared.lock_scheme_delivery();
        let current = {
            let mut st = self.shared.lock();
            st.scheme_subscribers.push(Arc::clone(&handler));
            st.light
        };
        handler(current);
    }

    /// Call `handler` whenever the host restarts on its own.
    pub fn subscribe_host_restarted(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.shared.lock().restart_subscribers.push(Arc::new(handler));
    }
}

fn listen<H: ShellHost>(host: &H, shared: &Shared, signals: mpsc::Receiver<ShellSignal>) {
    for signal in signals {
        debug!("shell signal: {:?}", signal);
        match signal {
            ShellSignal::HostReady => {
                let mut st = shared.lock();
                if st.awaiting_host {
                    st.host_ready = true;
                    shared.ready.notify_all();
                    continue;
                }
                let subscribers = st.restart_subscribers.clone();
                drop(st);
                info!("shell host restarted");
                for s in subscribers {
                    s();
                }
            }
            ShellSignal::SettingsChanged => {
                let _delivery = shared.lock_scheme_delivery();
                let light = host.is_light_theme();
                let mut st = shared.lock();
                if st.light == light {
                    continue;
                }
                st.light = light;
                let subscribers = st.scheme_subscribers.clone();
                drop(st);
                info!("color scheme changed (light: {})", light);
                for s in subscribers {
                    s(light);
                }
            }
        }
    }

    debug!("shell signal source closed");
    shared.lock().closed = true;
    shared.ready.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{wait_until, MockHost};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn start(host: &MockHost) -> (ProcessMonitor<MockHost>, mpsc::Sender<ShellSignal>) {
        let (tx, rx) = mpsc::channel();
        host.attach(tx.clone());
        let monitor = ProcessMonitor::spawn(host.clone(), rx).unwrap();
        (monitor, tx)
    }

    #[test]
    fn running_host_is_left_alone() {
        let host = MockHost::new(true);
        let (monitor, _tx) = start(&host);
        monitor.ensure_host_is_alive().unwrap();
        assert_eq!(host.launches(), 0);
    }

    #[test]
    fn missing_host_is_started_and_awaited() {
        let host = MockHost::new(false);
        let (monitor, _tx) = start(&host);

        let (restarted_tx, restarted_rx) = mpsc::channel();
        monitor.subscribe_host_restarted(move || {
            let _ = restarted_tx.send(());
        });

        monitor.ensure_host_is_alive().unwrap();
        assert_eq!(host.launches(), 1);
        assert!(host.running());
        // Our own launch is not an unexpected restart.
        assert!(restarted_rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn unexpected_host_ready_fires_restart() {
        let host = MockHost::new(true);
        let (monitor, tx) = start(&host);

        let (restarted_tx, restarted_rx) = mpsc::channel();
        monitor.subscribe_host_restarted(move || {
            let _ = restarted_tx.send(());
        });

        tx.send(ShellSignal::HostReady).unwrap();
        restarted_rx.recv_timeout(WAIT).unwrap();
    }

    #[test]
    fn color_scheme_is_replayed_on_subscribe() {
        let host = MockHost::new(true);
        host.set_light(true);
        let (monitor, _tx) = start(&host);

        let (seen_tx, seen_rx) = mpsc::channel();
        monitor.subscribe_color_scheme(move |light| {
            let _ = seen_tx.send(light);
        });
        assert_eq!(seen_rx.try_recv(), Ok(true));
        assert!(monitor.is_light_mode());
    }

    #[test]
    fn color_scheme_notifies_only_on_change() {
        let host = MockHost::new(true);
        let (monitor, tx) = start(&host);

        let (seen_tx, seen_rx) = mpsc::channel();
        monitor.subscribe_color_scheme(move |light| {
            let _ = seen_tx.send(light);
        });
        assert_eq!(seen_rx.try_recv(), Ok(false));

        tx.send(ShellSignal::SettingsChanged).unwrap();
        host.set_light(true);
        tx.send(ShellSignal::SettingsChanged).unwrap();
        tx.send(ShellSignal::SettingsChanged).unwrap();

        assert_eq!(seen_rx.recv_timeout(WAIT), Ok(true));
        assert!(seen_rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn replay_is_delivered_before_a_concurrent_change() {
        let host = MockHost::new(true);
        let (monitor, tx) = start(&host);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let overlapped = Arc::new(AtomicBool::new(false));
        let busy = Arc::new(AtomicBool::new(false));
        {
            let seen = Arc::clone(&seen);
            let overlapped = Arc::clone(&overlapped);
            let host = host.clone();
            let tx = tx.clone();
            monitor.subscribe_color_scheme(move |light| {
                if busy.swap(true, Ordering::SeqCst) {
                    overlapped.store(true, Ordering::SeqCst);
                }
                let first = {
                    let mut seen = seen.lock().unwrap();
                    seen.push(light);
                    seen.len() == 1
                };
                if first {
                    // Change the theme while the replay is still running.
                    host.set_light(true);
                    tx.send(ShellSignal::SettingsChanged).unwrap();
                    std::thread::sleep(Duration::from_millis(100));
                }
                busy.store(false, Ordering::SeqCst);
            });
        }

        assert!(wait_until(|| seen.lock().unwrap().len() == 2));
        assert_eq!(*seen.lock().unwrap(), vec![false, true]);
        assert!(!overlapped.load(Ordering::SeqCst));
        assert!(monitor.is_light_mode());
    }

    #[test]
    fn kill_host_terminates() {
        let host = MockHost::new(true);
        let (monitor, _tx) = start(&host);
        monitor.kill_host().unwrap();
        assert_eq!(host.kills(), 1);
        assert!(!host.running());
    }

    #[test]
    fn closed_signal_source_unblocks_waiter() {
        let host = MockHost::new(false);
        let (tx, rx) = mpsc::channel();
        let monitor = ProcessMonitor::spawn(host.clone(), rx).unwrap();
        drop(tx);
        assert!(monitor.ensure_host_is_alive().is_err());
    }
}
