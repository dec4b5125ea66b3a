//! The main orchestrator that ties configuration, hotkeys, the shell
//! monitor, and the desktop service together.
//!
//! [`Orchestrator::start`] runs the startup protocol:
//!
//! 1. register every configured shortcut; if any is taken, unregister,
//!    kill the shell host (which owns many `win+…` hotkeys), and try once
//!    more; if that fails too, put the host back and give up;
//! 2. make sure the shell host is running;
//! 3. start the [`SerializedExecutor`] with a desktop-changed callback that
//!    feeds the [`DesktopHistory`];
//! 4. seed the history with the active desktop;
//! 5. create missing sticky desktops;
//! 6. subscribe to theme changes and host restarts.
//!
//! After that, [`Orchestrator::handle`] routes each [`InputEvent`].

use crate::command::{Flow, InputEvent, StatusUpdate};
use crate::config::{Config, MAX_STICKY_DESKTOPS};
use crate::executor::{ExecutorError, SerializedExecutor};
use crate::history::DesktopHistory;
use crate::monitor::ProcessMonitor;
use crate::shortcut::Shortcut;
use crate::traits::{DesktopService, FocusShim, HotkeyRegistrar, ServiceError, ShellHost};
use crate::wheel::WheelEvent;
use log::{debug, info, warn};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Possible errors from [`Orchestrator::start`].
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Some shortcuts stayed taken even with the shell host out of the way.
    #[error("could not register hotkeys: {}", join_shortcuts(.0))]
    HotkeysUnavailable(Vec<Shortcut>),
    /// The shell host could not be started or stopped.
    #[error("shell host error: {0}")]
    Host(#[from] std::io::Error),
    /// The desktop service could not be reached.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

fn join_shortcuts(shortcuts: &[Shortcut]) -> String {
    shortcuts
        .iter()
        .map(Shortcut::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Number of desktops to create so that at least `sticky` exist, given
/// `existing` ones.  Never negative, never more than [`MAX_STICKY_DESKTOPS`].
pub fn desktops_to_create(sticky: u32, existing: usize) -> usize {
    (sticky as usize)
        .saturating_sub(existing)
        .min(MAX_STICKY_DESKTOPS as usize)
}

/// 1-based desktop number from the config to a 0-based index.
fn to_index(desktop: i32) -> usize {
    desktop.saturating_sub(1).max(0) as usize
}

/// State written by the callbacks and read by the dispatcher.
struct Shared {
    history: DesktopHistory,
    status: Option<mpsc::Sender<StatusUpdate>>,
}

impl Shared {
    fn publish(&self) {
        if let Some(tx) = &self.status {
            let _ = tx.send(StatusUpdate {
                desktop: self.history.current(),
                light_mode: self.history.light_mode(),
            });
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Routes input events to desktop service calls.
///
/// Generic over the service, the shell host, and the hotkey registrar so
/// it can be driven entirely by test doubles.
pub struct Orchestrator<S, H, R>
where
    S: DesktopService + 'static,
    H: ShellHost + 'static,
    R: HotkeyRegistrar,
{
    config: Config,
    executor: SerializedExecutor<S>,
    monitor: Arc<ProcessMonitor<H>>,
    registrar: R,
    shared: Arc<Mutex<Shared>>,
    killed_host: bool,
    stopped: bool,
}

impl<S, H, R> Orchestrator<S, H, R>
where
    S: DesktopService + 'static,
    H: ShellHost + 'static,
    R: HotkeyRegistrar,
{
    /// Run the startup protocol described in the module docs.
    ///
    /// `factory` builds the desktop service on the executor thread.
    /// `events` receives [`InputEvent::HostRestarted`]; `status`, if set,
    /// receives a [`StatusUpdate`] whenever the desktop or theme changes.
    pub fn start<F>(
        config: Config,
        mut registrar: R,
        monitor: Arc<ProcessMonitor<H>>,
        factory: F,
        focus: impl FocusShim + 'static,
        events: mpsc::Sender<InputEvent>,
        status: Option<mpsc::Sender<StatusUpdate>>,
    ) -> Result<Self, StartupError>
    where
        F: FnOnce() -> Result<S, ServiceError> + Send + 'static,
    {
        let killed_host = register_with_retry(&config, &mut registrar, &monitor)?;

        let shared = Arc::new(Mutex::new(Shared {
            history: DesktopHistory::new(),
            status,
        }));

        let executor = match monitor
            .ensure_host_is_alive()
            .map_err(StartupError::from)
            .and_then(|()| {
                let sink = Arc::clone(&shared);
                let on_change = Box::new(move |desktop: usize| {
                    debug!("desktop changed to {}", desktop + 1);
                    let mut st = lock(&sink);
                    st.history.record_change(desktop);
                    st.publish();
                });
                SerializedExecutor::spawn(factory, focus, on_change).map_err(StartupError::from)
            }) {
            Ok(executor) => executor,
            Err(e) => {
                registrar.unregister_all();
                return Err(e);
            }
        };

        if let Some(current) = executor.current_desktop() {
            let mut st = lock(&shared);
            st.history.seed(current);
            st.publish();
        }

        let orchestrator = Self {
            config,
            executor,
            monitor,
            registrar,
            shared,
            killed_host,
            stopped: false,
        };
        orchestrator.ensure_sticky_desktops();
        orchestrator.subscribe(events);

        info!(
            "started on desktop {}",
            lock(&orchestrator.shared).history.current() + 1
        );
        Ok(orchestrator)
    }

    fn ensure_sticky_desktops(&self) {
        let sticky = self.config.sticky_desktops;
        if sticky == 0 {
            return;
        }
        let Some(existing) = self.executor.desktop_count() else {
            warn!("could not count desktops, skipping sticky desktops");
            return;
        };
        let missing = desktops_to_create(sticky, existing);
        if missing > 0 {
            info!("creating {} desktop(s) to reach {}", missing, sticky);
        }
        for _ in 0..missing {
            if !self.executor.create_desktop() {
                warn!("failed to create a desktop");
                break;
            }
        }
    }

    fn subscribe(&self, events: mpsc::Sender<InputEvent>) {
        let sink = Arc::clone(&self.shared);
        self.monitor.subscribe_color_scheme(move |light| {
            let mut st = lock(&sink);
            if st.history.set_light_mode(light) {
                st.publish();
            }
        });

        self.monitor.subscribe_host_restarted(move || {
            let _ = events.send(InputEvent::HostRestarted);
        });
    }

    /// A copy of the current desktop history.
    pub fn history(&self) -> DesktopHistory {
        lock(&self.shared).history.clone()
    }

    /// Whether the shell host had to be killed to free the hotkeys.
    pub fn killed_host(&self) -> bool {
        self.killed_host
    }

    pub fn registrar(&self) -> &R {
        &self.registrar
    }

    /// Process a single [`InputEvent`].
    pub fn handle(&mut self, event: InputEvent) -> Flow {
        match event {
            InputEvent::Hotkey(shortcut) => {
                self.on_hotkey(&shortcut);
                Flow::Continue
            }
            InputEvent::Wheel(wheel) => {
                self.on_wheel(&wheel);
                Flow::Continue
            }
            InputEvent::HostRestarted => {
                info!("shell host restarted, relaunching");
                Flow::Relaunch
            }
        }
    }

    /// Jump targets first, then move-window targets, then toggle groups.
    fn on_hotkey(&self, shortcut: &Shortcut) {
        if let Some(target) = self.config.jump_to.iter().find(|t| t.shortcut == *shortcut) {
            let fallback = if self.config.jump_current_goes_to_last {
                lock(&self.shared).history.last()
            } else {
                None
            };
            debug!("{}: jump to desktop {}", shortcut, target.desktop);
            if !self
                .executor
                .jump_with_focus_recovery(to_index(target.desktop), fallback)
            {
                warn!("jump to desktop {} failed", target.desktop);
            }
            return;
        }

        if let Some(target) = self
            .config
            .move_window_to
            .iter()
            .find(|t| t.shortcut == *shortcut)
        {
            debug!("{}: move window to desktop {}", shortcut, target.desktop);
            let index = to_index(target.desktop);
            if !self.executor.move_focused_window_to(index) {
                warn!("moving window to desktop {} failed", target.desktop);
                return;
            }
            if target.follow && !self.executor.jump_without_focus_recovery(index) {
                warn!("following window to desktop {} failed", target.desktop);
            }
            return;
        }

        let group = self
            .config
            .toggle_groups
            .iter()
            .find(|g| g.matches(shortcut));
        if let Some(group) = group {
            debug!("{}: next desktop in group {:?}", shortcut, group.desktops);
            let members = group.desktops.iter().map(|d| to_index(*d)).collect();
            if !self.executor.jump_to_next(members) {
                warn!("toggle group {} failed", group.shortcut);
            }
            return;
        }

        debug!("{}: not bound", shortcut);
    }

    fn on_wheel(&self, wheel: &WheelEvent) {
        if !self.config.change_desktops_with_scroll || !wheel.in_taskbar_band() {
            return;
        }
        let current = lock(&self.shared).history.current();
        if let Some(target) = wheel.target_from(current) {
            debug!("wheel {:?}: desktop {}", wheel.direction, target + 1);
            self.executor.jump_without_focus_recovery(target);
        }
    }

    /// Stop the desktop service and release the hotkeys.
    ///
    /// If the shell host was killed at startup, it is restarted once more
    /// so it can take its own hotkeys back.
    pub fn shutdown(&mut self) {
        self.stop(true);
    }

    /// Like [`shutdown`](Self::shutdown), but leaves the shell host alone.
    ///
    /// Used when the host restarted on its own and a fresh instance is about
    /// to take over: the running host is the one the new instance will work
    /// with.
    pub fn shutdown_for_relaunch(&mut self) {
        self.stop(false);
    }

    fn stop(&mut self, restore_host: bool) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.executor.dispose();
        self.registrar.unregister_all();

        if restore_host && self.killed_host {
            info!("restarting the shell host to hand back its hotkeys");
            if let Err(e) = self
                .monitor
                .kill_host()
                .and_then(|()| self.monitor.ensure_host_is_alive())
            {
                warn!("failed to restart the shell host: {}", e);
            }
        }
    }
}

/// Register every shortcut, killing the shell host once if needed.
///
/// Returns whether the host was killed.
fn register_with_retry<H: ShellHost, R: HotkeyRegistrar>(
    config: &Config,
    registrar: &mut R,
    monitor: &ProcessMonitor<H>,
) -> Result<bool, StartupError> {
    let shortcuts = config.shortcuts();

    let Err(taken) = register_all(registrar, &shortcuts) else {
        info!("registered {} shortcut(s)", shortcuts.len());
        return Ok(false);
    };

    warn!(
        "shortcut(s) already taken: {}; retrying without the shell host",
        join_shortcuts(&taken)
    );
    registrar.unregister_all();
    if let Err(e) = monitor.kill_host() {
        warn!("failed to kill the shell host: {}", e);
    }

    if let Err(taken) = register_all(registrar, &shortcuts) {
        registrar.unregister_all();
        monitor.ensure_host_is_alive()?;
        return Err(StartupError::HotkeysUnavailable(taken));
    }
    info!("registered {} shortcut(s) after killing the shell host", shortcuts.len());
    Ok(true)
}

/// Try every shortcut; on failure return the ones that were taken.
fn register_all<R: HotkeyRegistrar>(
    registrar: &mut R,
    shortcuts: &[Shortcut],
) -> Result<(), Vec<Shortcut>> {
    let taken: Vec<Shortcut> = shortcuts
        .iter()
        .filter(|s| !registrar.register(s))
        .copied()
        .collect();
    if taken.is_empty() {
        Ok(())
    } else {
        Err(taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MoveWindowTarget, ToggleGroup};
    use crate::monitor::ShellSignal;
    use crate::shortcut::Modifiers;
    use crate::test_support::{wait_until, MockHost, MockRegistrar, MockService, ServiceProbe};
    use crate::traits::NoFocusShim;
    use crate::wheel::WheelDirection;
    use std::time::Duration;

    type TestOrchestrator = Orchestrator<MockService, MockHost, MockRegistrar>;

    struct Harness {
        host: MockHost,
        signals: mpsc::Sender<ShellSignal>,
        events: mpsc::Receiver<InputEvent>,
        status: mpsc::Receiver<StatusUpdate>,
        probe: ServiceProbe,
    }

    fn boot(
        config: Config,
        registrar: MockRegistrar,
        count: usize,
        current: usize,
    ) -> (Result<TestOrchestrator, StartupError>, Harness) {
        let host = MockHost::new(true);
        let (signals, signal_rx) = mpsc::channel();
        host.attach(signals.clone());
        let monitor = Arc::new(ProcessMonitor::spawn(host.clone(), signal_rx).unwrap());

        let (svc, probe) = MockService::new(count, current);
        let (events_tx, events) = mpsc::channel();
        let (status_tx, status) = mpsc::channel();

        let result = Orchestrator::start(
            config,
            registrar,
            monitor,
            move || Ok(svc),
            NoFocusShim,
            events_tx,
            Some(status_tx),
        );
        let harness = Harness {
            host,
            signals,
            events,
            status,
            probe,
        };
        (result, harness)
    }

    fn boot_ok(config: Config, count: usize, current: usize) -> (TestOrchestrator, Harness) {
        let (result, harness) = boot(config, MockRegistrar::new(), count, current);
        (result.unwrap(), harness)
    }

    fn sc(s: &str) -> Shortcut {
        Shortcut::parse(s).unwrap()
    }

    fn press(o: &mut TestOrchestrator, s: &str) -> Flow {
        o.handle(InputEvent::Hotkey(sc(s)))
    }

    fn wheel(o: &mut TestOrchestrator, y: i32, direction: WheelDirection) {
        o.handle(InputEvent::Wheel(WheelEvent {
            x: 100,
            y,
            direction,
            screen_height: 1080,
        }));
    }

    fn last_status(h: &Harness) -> Option<StatusUpdate> {
        h.status.try_iter().last()
    }

    //  Startup

    #[test]
    fn registers_every_shortcut() {
        let (o, h) = boot_ok(Config::default(), 10, 0);
        assert_eq!(o.registrar().registered.len(), 20);
        assert!(!o.killed_host());
        assert_eq!(h.host.kills(), 0);
    }

    #[test]
    fn transient_conflict_kills_host_and_retries() {
        let registrar = MockRegistrar::with_transient_conflicts(vec![sc("win+d1")]);
        let (result, h) = boot(Config::default(), registrar, 10, 0);
        let o = result.unwrap();
        assert!(o.killed_host());
        assert_eq!(h.host.kills(), 1);
        assert_eq!(h.host.launches(), 1);
        assert!(h.host.running());
        assert_eq!(o.registrar().registered.len(), 20);
        assert_eq!(o.registrar().unregister_calls, 1);
        // The conflicting shortcut was tried before and after the kill.
        let tries = o
            .registrar()
            .attempts
            .iter()
            .filter(|s| **s == sc("win+d1"))
            .count();
        assert_eq!(tries, 2);
    }

    #[test]
    fn persistent_conflict_fails_startup() {
        let registrar = MockRegistrar::with_conflicts(vec![sc("win+d1"), sc("win+shift+d2")]);
        let (result, h) = boot(Config::default(), registrar, 10, 0);
        match result {
            Err(StartupError::HotkeysUnavailable(taken)) => {
                assert_eq!(taken, vec![sc("win+d1"), sc("win+shift+d2")]);
            }
            _ => panic!("expected HotkeysUnavailable"),
        }
        assert_eq!(h.host.kills(), 1);
        // The host is put back before giving up.
        assert!(h.host.running());
        assert_eq!(h.host.launches(), 1);
    }

    #[test]
    fn startup_error_lists_taken_shortcuts() {
        let e = StartupError::HotkeysUnavailable(vec![sc("win+d1"), sc("alt+w")]);
        assert_eq!(e.to_string(), "could not register hotkeys: win+d1, alt+w");
    }

    #[test]
    fn service_failure_releases_hotkeys() {
        let host = MockHost::new(true);
        let (_signals, signal_rx) = mpsc::channel();
        let monitor = Arc::new(ProcessMonitor::spawn(host, signal_rx).unwrap());
        let (events_tx, _events) = mpsc::channel();
        let result = TestOrchestrator::start(
            Config::default(),
            MockRegistrar::new(),
            monitor,
            || Err(ServiceError::new("no service")),
            NoFocusShim,
            events_tx,
            None,
        );
        assert!(matches!(result, Err(StartupError::Executor(_))));
    }

    #[test]
    fn history_is_seeded_with_active_desktop() {
        let (o, h) = boot_ok(Config::default(), 6, 4);
        let history = o.history();
        assert_eq!(history.current(), 4);
        assert_eq!(history.last(), None);
        assert_eq!(
            last_status(&h),
            Some(StatusUpdate {
                desktop: 4,
                light_mode: false
            })
        );
    }

    #[test]
    fn missing_sticky_desktops_are_created() {
        let config = Config {
            sticky_desktops: 5,
            ..Config::default()
        };
        let (_o, h) = boot_ok(config, 2, 0);
        assert_eq!(h.probe.created(), 3);
    }

    #[test]
    fn surplus_desktops_are_kept() {
        let config = Config {
            sticky_desktops: 2,
            ..Config::default()
        };
        let (_o, h) = boot_ok(config, 5, 0);
        assert_eq!(h.probe.created(), 0);
    }

    #[test]
    fn sticky_reconciliation_formula() {
        assert_eq!(desktops_to_create(5, 2), 3);
        assert_eq!(desktops_to_create(2, 5), 0);
        assert_eq!(desktops_to_create(0, 0), 0);
        assert_eq!(desktops_to_create(100, 1), MAX_STICKY_DESKTOPS as usize);
    }

    //  Hotkey routing

    #[test]
    fn jump_hotkey_switches_desktop() {
        let (mut o, h) = boot_ok(Config::default(), 10, 0);
        assert_eq!(press(&mut o, "win+d3"), Flow::Continue);
        assert_eq!(h.probe.jumps(), vec![2]);
        assert_eq!(o.history().current(), 2);
        assert_eq!(o.history().last(), Some(0));
        assert_eq!(last_status(&h).map(|s| s.desktop_number()), Some(3));
    }

    #[test]
    fn jump_to_current_goes_to_last() {
        let (mut o, h) = boot_ok(Config::default(), 10, 0);
        press(&mut o, "win+d3");
        press(&mut o, "win+d3");
        assert_eq!(h.probe.jumps(), vec![2, 0]);
        assert_eq!(o.history().current(), 0);
        assert_eq!(o.history().last(), Some(2));
    }

    #[test]
    fn jump_to_current_without_revisit_stays() {
        let config = Config {
            jump_current_goes_to_last: false,
            ..Config::default()
        };
        let (mut o, h) = boot_ok(config, 10, 0);
        press(&mut o, "win+d3");
        press(&mut o, "win+d3");
        assert_eq!(h.probe.jumps(), vec![2, 2]);
        assert_eq!(o.history().current(), 2);
    }

    #[test]
    fn jump_to_current_before_any_change_stays() {
        let (mut o, h) = boot_ok(Config::default(), 10, 1);
        press(&mut o, "win+d2");
        assert_eq!(h.probe.jumps(), vec![1]);
    }

    #[test]
    fn win_zero_is_desktop_ten() {
        let (mut o, h) = boot_ok(Config::default(), 10, 0);
        press(&mut o, "win+d0");
        assert_eq!(h.probe.jumps(), vec![9]);
    }

    #[test]
    fn jump_past_last_desktop_is_ignored() {
        let (mut o, h) = boot_ok(Config::default(), 3, 0);
        press(&mut o, "win+d7");
        assert!(h.probe.jumps().is_empty());
        assert_eq!(o.history().current(), 0);
    }

    #[test]
    fn move_window_without_follow() {
        let (mut o, h) = boot_ok(Config::default(), 10, 0);
        press(&mut o, "win+shift+d4");
        assert_eq!(h.probe.moves(), vec![3]);
        assert!(h.probe.jumps().is_empty());
    }

    #[test]
    fn move_window_with_follow() {
        let config = Config {
            move_window_to: vec![MoveWindowTarget {
                shortcut: sc("win+shift+d2"),
                desktop: 2,
                follow: true,
            }],
            ..Config::default()
        };
        let (mut o, h) = boot_ok(config, 10, 0);
        press(&mut o, "win+shift+d2");
        assert_eq!(h.probe.moves(), vec![1]);
        assert_eq!(h.probe.jumps(), vec![1]);
    }

    #[test]
    fn failed_move_does_not_follow() {
        let config = Config {
            move_window_to: vec![MoveWindowTarget {
                shortcut: sc("win+shift+d2"),
                desktop: 2,
                follow: true,
            }],
            ..Config::default()
        };
        let (mut o, h) = boot_ok(config, 10, 0);
        h.probe.set_fail(true);
        press(&mut o, "win+shift+d2");
        h.probe.set_fail(false);
        assert!(h.probe.moves().is_empty());
        assert!(h.probe.jumps().is_empty());
    }

    fn with_group(shortcut: &str, desktops: Vec<i32>, modifiers_only: bool) -> Config {
        Config {
            toggle_groups: vec![ToggleGroup {
                shortcut: sc(shortcut),
                desktops,
                modifiers_only,
            }],
            ..Config::default()
        }
    }

    #[test]
    fn toggle_group_rotates() {
        // On desktop 4 of group [2, 4, 6].
        let (mut o, h) = boot_ok(with_group("alt+w", vec![2, 4, 6], false), 10, 3);
        press(&mut o, "alt+w");
        press(&mut o, "alt+w");
        press(&mut o, "alt+w");
        assert_eq!(h.probe.jumps(), vec![5, 1, 3]);
    }

    #[test]
    fn toggle_group_from_outside() {
        let (mut o, h) = boot_ok(with_group("alt+w", vec![2, 4, 6], false), 10, 0);
        press(&mut o, "alt+w");
        assert_eq!(h.probe.jumps(), vec![3]);
    }

    #[test]
    fn modifiers_only_group_registers_and_answers_digit_keys() {
        let (mut o, h) = boot_ok(with_group("alt+w", vec![1, 2], true), 10, 0);
        let alt: Vec<Shortcut> = o
            .registrar()
            .registered
            .iter()
            .filter(|s| s.modifiers == Modifiers::ALT)
            .copied()
            .collect();
        assert_eq!(alt.len(), 11);
        assert!(alt.contains(&sc("alt+w")));
        assert!(alt.contains(&sc("alt+d4")));

        press(&mut o, "alt+d4");
        assert_eq!(h.probe.jumps(), vec![1]);
        assert_eq!(h.probe.current(), 1);
        press(&mut o, "alt+w");
        assert_eq!(h.probe.jumps(), vec![1, 0]);
    }

    #[test]
    fn full_match_group_ignores_other_keys() {
        let (mut o, h) = boot_ok(with_group("alt+w", vec![1, 2], false), 10, 0);
        press(&mut o, "alt+q");
        assert!(h.probe.jumps().is_empty());
    }

    #[test]
    fn jump_wins_over_toggle_group() {
        let (mut o, h) = boot_ok(with_group("win+d5", vec![1, 2], false), 10, 0);
        press(&mut o, "win+d5");
        assert_eq!(h.probe.jumps(), vec![4]);
    }

    #[test]
    fn unbound_hotkey_is_ignored() {
        let (mut o, h) = boot_ok(Config::default(), 10, 0);
        assert_eq!(press(&mut o, "ctrl+alt+f9"), Flow::Continue);
        assert!(h.probe.jumps().is_empty());
        assert!(h.probe.moves().is_empty());
    }

    //  Wheel

    fn scrolling() -> Config {
        Config {
            change_desktops_with_scroll: true,
            ..Config::default()
        }
    }

    #[test]
    fn wheel_disabled_does_nothing() {
        let (mut o, h) = boot_ok(Config::default(), 5, 1);
        wheel(&mut o, 1070, WheelDirection::Up);
        assert!(h.probe.jumps().is_empty());
    }

    #[test]
    fn wheel_over_taskbar_switches() {
        let (mut o, h) = boot_ok(scrolling(), 5, 1);
        wheel(&mut o, 1070, WheelDirection::Up);
        wheel(&mut o, 1070, WheelDirection::Up);
        wheel(&mut o, 1070, WheelDirection::Down);
        assert_eq!(h.probe.jumps(), vec![2, 3, 2]);
    }

    #[test]
    fn wheel_above_taskbar_is_ignored() {
        let (mut o, h) = boot_ok(scrolling(), 5, 1);
        wheel(&mut o, 500, WheelDirection::Up);
        assert!(h.probe.jumps().is_empty());
    }

    #[test]
    fn wheel_down_on_first_desktop_is_ignored() {
        let (mut o, h) = boot_ok(scrolling(), 5, 0);
        wheel(&mut o, 1070, WheelDirection::Down);
        assert!(h.probe.calls().iter().all(|c| !c.starts_with("jump")));
    }

    #[test]
    fn wheel_up_on_last_desktop_is_a_no_op() {
        let (mut o, h) = boot_ok(scrolling(), 3, 2);
        wheel(&mut o, 1070, WheelDirection::Up);
        assert!(h.probe.jumps().is_empty());
        assert_eq!(o.history().current(), 2);
    }

    //  Callbacks

    #[test]
    fn external_desktop_change_updates_history() {
        let (o, h) = boot_ok(Config::default(), 5, 0);
        h.probe.external_switch(3);
        assert!(wait_until(|| o.history().current() == 3));
        assert_eq!(o.history().last(), Some(0));
    }

    #[test]
    fn theme_change_is_published() {
        let (o, h) = boot_ok(Config::default(), 5, 0);
        h.host.set_light(true);
        h.signals.send(ShellSignal::SettingsChanged).unwrap();
        assert!(wait_until(|| o.history().light_mode()));
        assert_eq!(
            last_status(&h),
            Some(StatusUpdate {
                desktop: 0,
                light_mode: true
            })
        );
    }

    #[test]
    fn host_restart_requests_relaunch() {
        let (mut o, h) = boot_ok(Config::default(), 5, 0);
        h.signals.send(ShellSignal::HostReady).unwrap();
        let event = h.events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event, InputEvent::HostRestarted);
        assert_eq!(o.handle(event), Flow::Relaunch);
    }

    //  Shutdown

    #[test]
    fn shutdown_releases_hotkeys() {
        let (mut o, h) = boot_ok(Config::default(), 5, 0);
        o.shutdown();
        o.shutdown();
        assert_eq!(o.registrar().unregister_calls, 1);
        assert!(o.registrar().registered.is_empty());
        assert_eq!(h.host.kills(), 0);
        assert!(h.probe.dropped());
        // Calls after shutdown fail fast.
        press(&mut o, "win+d2");
        assert!(h.probe.jumps().is_empty());
    }

    #[test]
    fn shutdown_restores_killed_host() {
        let registrar = MockRegistrar::with_transient_conflicts(vec![sc("win+d1")]);
        let (result, h) = boot(Config::default(), registrar, 10, 0);
        let mut o = result.unwrap();
        o.shutdown();
        assert_eq!(h.host.kills(), 2);
        assert_eq!(h.host.launches(), 2);
        assert!(h.host.running());
    }

    #[test]
    fn relaunch_leaves_restarted_host_alone() {
        let registrar = MockRegistrar::with_transient_conflicts(vec![sc("win+d1")]);
        let (result, h) = boot(Config::default(), registrar, 10, 0);
        let mut o = result.unwrap();
        assert_eq!(h.host.kills(), 1);

        h.signals.send(ShellSignal::HostReady).unwrap();
        let event = h.events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(o.handle(event), Flow::Relaunch);

        o.shutdown_for_relaunch();
        o.shutdown();
        assert_eq!(h.host.kills(), 1);
        assert_eq!(h.host.launches(), 1);
        assert!(h.host.running());
        assert_eq!(o.registrar().unregister_calls, 2);
        assert!(o.registrar().registered.is_empty());
        assert!(h.probe.dropped());
    }
}
