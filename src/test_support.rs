//! Recording test doubles for the capability traits.
//!
//! Mocks that cross threads keep their state behind an `Arc<Mutex<_>>` and
//! hand out a cloneable probe so tests can inspect and steer them after the
//! mock itself has moved onto a worker thread.

use crate::monitor::ShellSignal;
use crate::shortcut::Shortcut;
use crate::traits::{
    DesktopChangedHandler, DesktopService, FocusShim, HotkeyRegistrar, ServiceError, ShellHost,
};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

//  Desktop service

#[derive(Debug, Default)]
struct ServiceState {
    count: usize,
    current: usize,
    jumps: Vec<usize>,
    moves: Vec<usize>,
    created: usize,
    fail: bool,
    panic: bool,
    delay: Option<Duration>,
    pending_external: Option<usize>,
    dropped: bool,
}

/// Shared log of calls, in order, across the service and the focus shim.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// An in-memory desktop service.
///
/// Jumps to an existing desktop change `current` and fire the handler when
/// the desktop actually changes, the way the OS notification does.
pub struct MockService {
    state: Arc<Mutex<ServiceState>>,
    log: CallLog,
    handler: Option<DesktopChangedHandler>,
}

/// Test-side handle onto a [`MockService`].
#[derive(Clone)]
pub struct ServiceProbe {
    state: Arc<Mutex<ServiceState>>,
    pub log: CallLog,
}

impl MockService {
    pub fn new(count: usize, current: usize) -> (MockService, ServiceProbe) {
        let state = Arc::new(Mutex::new(ServiceState {
            count,
            current,
            ..ServiceState::default()
        }));
        let log: CallLog = Arc::default();
        let svc = MockService {
            state: Arc::clone(&state),
            log: Arc::clone(&log),
            handler: None,
        };
        (svc, ServiceProbe { state, log })
    }

    /// Honour the configured delay, panic, and failure switches.
    fn enter(&self, call: String) -> Result<(), ServiceError> {
        let (delay, panic, fail) = {
            let st = self.state.lock().unwrap();
            (st.delay, st.panic, st.fail)
        };
        if let Some(d) = delay {
            std::thread::sleep(d);
        }
        if panic {
            panic!("mock service panic in {}", call);
        }
        if fail {
            return Err(ServiceError::new(format!("mock failure in {}", call)));
        }
        self.log.lock().unwrap().push(call);
        Ok(())
    }

    fn switch(&mut self, index: usize) {
        let changed = {
            let mut st = self.state.lock().unwrap();
            let changed = st.current != index;
            st.current = index;
            changed
        };
        if changed {
            if let Some(h) = &self.handler {
                h(index);
            }
        }
    }
}

impl DesktopService for MockService {
    fn current_desktop(&mut self) -> Result<usize, ServiceError> {
        self.enter("current".into())?;
        Ok(self.state.lock().unwrap().current)
    }

    fn desktop_count(&mut self) -> Result<usize, ServiceError> {
        self.enter("count".into())?;
        Ok(self.state.lock().unwrap().count)
    }

    fn jump_to(&mut self, index: usize) -> Result<(), ServiceError> {
        self.enter(format!("jump {}", index))?;
        {
            let mut st = self.state.lock().unwrap();
            if index >= st.count {
                return Ok(());
            }
            st.jumps.push(index);
        }
        self.switch(index);
        Ok(())
    }

    fn move_focused_window_to(&mut self, index: usize) -> Result<(), ServiceError> {
        self.enter(format!("move {}", index))?;
        self.state.lock().unwrap().moves.push(index);
        Ok(())
    }

    fn create_desktop(&mut self) -> Result<(), ServiceError> {
        self.enter("create".into())?;
        let mut st = self.state.lock().unwrap();
        st.count += 1;
        st.created += 1;
        Ok(())
    }

    fn subscribe(&mut self, handler: DesktopChangedHandler) -> Result<(), ServiceError> {
        self.handler = Some(handler);
        Ok(())
    }

    fn pump(&mut self) {
        let pending = self.state.lock().unwrap().pending_external.take();
        if let Some(index) = pending {
            self.switch(index);
        }
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.state.lock().unwrap().dropped = true;
    }
}

impl ServiceProbe {
    pub fn jumps(&self) -> Vec<usize> {
        self.state.lock().unwrap().jumps.clone()
    }

    pub fn moves(&self) -> Vec<usize> {
        self.state.lock().unwrap().moves.clone()
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    pub fn current(&self) -> usize {
        self.state.lock().unwrap().current
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn dropped(&self) -> bool {
        self.state.lock().unwrap().dropped
    }

    pub fn set_fail(&self, fail: bool) {
        self.state.lock().unwrap().fail = fail;
    }

    pub fn set_panic(&self, panic: bool) {
        self.state.lock().unwrap().panic = panic;
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().delay = delay;
    }

    /// Simulate a desktop switch made by the user outside deskjump.  It is
    /// delivered on the next pump.
    pub fn external_switch(&self, index: usize) {
        self.state.lock().unwrap().pending_external = Some(index);
    }
}

/// Poll `cond` every few milliseconds for up to a second.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

//  Focus shim

/// Writes `claim` and `settle` into a shared [`CallLog`].
pub struct RecordingFocus(pub CallLog);

impl FocusShim for RecordingFocus {
    fn claim_foreground(&self) {
        self.0.lock().unwrap().push("claim".into());
    }

    fn settle_foreground(&self) {
        self.0.lock().unwrap().push("settle".into());
    }
}

//  Hotkey registrar

/// Records registrations; shortcuts in `conflicts` fail to register while
/// fewer than `conflict_rounds` unregister calls have been made.
#[derive(Debug, Default)]
pub struct MockRegistrar {
    pub conflicts: Vec<Shortcut>,
    pub conflict_rounds: usize,
    pub registered: Vec<Shortcut>,
    pub attempts: Vec<Shortcut>,
    pub unregister_calls: usize,
}

impl MockRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conflicts that never go away.
    pub fn with_conflicts(conflicts: Vec<Shortcut>) -> Self {
        Self {
            conflicts,
            conflict_rounds: usize::MAX,
            ..Self::default()
        }
    }

    /// Conflicts that disappear after the first unregister (i.e. once the
    /// shell host has been killed).
    pub fn with_transient_conflicts(conflicts: Vec<Shortcut>) -> Self {
        Self {
            conflicts,
            conflict_rounds: 1,
            ..Self::default()
        }
    }
}

impl HotkeyRegistrar for MockRegistrar {
    fn register(&mut self, shortcut: &Shortcut) -> bool {
        self.attempts.push(*shortcut);
        if self.unregister_calls < self.conflict_rounds && self.conflicts.contains(shortcut) {
            return false;
        }
        self.registered.push(*shortcut);
        true
    }

    fn unregister_all(&mut self) {
        self.unregister_calls += 1;
        self.registered.clear();
    }
}

//  Shell host

#[derive(Debug, Default)]
pub struct HostState {
    pub running: bool,
    pub light: bool,
    pub launches: usize,
    pub kills: usize,
}

/// A fake shell host.  Launching it sends [`ShellSignal::HostReady`] on the
/// attached signal channel, like the real taskbar broadcast.
#[derive(Clone)]
pub struct MockHost {
    pub state: Arc<Mutex<HostState>>,
    signals: Arc<Mutex<Option<mpsc::Sender<ShellSignal>>>>,
}

impl MockHost {
    pub fn new(running: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                running,
                ..HostState::default()
            })),
            signals: Arc::default(),
        }
    }

    /// Send `HostReady` on `tx` whenever the host is launched.
    pub fn attach(&self, tx: mpsc::Sender<ShellSignal>) {
        *self.signals.lock().unwrap() = Some(tx);
    }

    pub fn set_light(&self, light: bool) {
        self.state.lock().unwrap().light = light;
    }

    pub fn launches(&self) -> usize {
        self.state.lock().unwrap().launches
    }

    pub fn kills(&self) -> usize {
        self.state.lock().unwrap().kills
    }

    pub fn running(&self) -> bool {
        self.state.lock().unwrap().running
    }
}

impl ShellHost for MockHost {
    fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    fn launch(&self) -> std::io::Result<()> {
        {
            let mut st = self.state.lock().unwrap();
            st.running = true;
            st.launches += 1;
        }
        if let Some(tx) = self.signals.lock().unwrap().as_ref() {
            let _ = tx.send(ShellSignal::HostReady);
        }
        Ok(())
    }

    fn kill(&self) -> std::io::Result<()> {
        let mut st = self.state.lock().unwrap();
        st.running = false;
        st.kills += 1;
        Ok(())
    }

    fn is_light_theme(&self) -> bool {
        self.state.lock().unwrap().light
    }
}
