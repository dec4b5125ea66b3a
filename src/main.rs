//! Entry point for the **deskjump** daemon.
//!
//! Wires the Windows implementations of the capability traits into an
//! [`Orchestrator`](deskjump::orchestrator::Orchestrator) and feeds it input
//! events on the main thread.  When the shell host restarts underneath us,
//! the process starts a fresh copy of itself and exits.

fn main() {
    env_logger::init();

    #[cfg(windows)]
    app::run();

    #[cfg(not(windows))]
    {
        log::error!("deskjump drives the Windows virtual desktop service and only runs on Windows");
        std::process::exit(1);
    }
}

#[cfg(windows)]
mod app {
    use deskjump::command::{Flow, InputEvent, StatusUpdate};
    use deskjump::config::Config;
    use deskjump::monitor::ProcessMonitor;
    use deskjump::orchestrator::Orchestrator;
    use deskjump::platform::windows::desktop::ShellDesktops;
    use deskjump::platform::windows::focus::ProgmanFocusShim;
    use deskjump::platform::windows::input::InputThread;
    use deskjump::platform::windows::instance::{show_already_running, SingleInstance};
    use deskjump::platform::windows::shell::{spawn_signal_window, ExplorerHost};
    use deskjump::version::{BackendVariant, OsVersion};
    use log::{error, info, warn};
    use std::sync::{mpsc, Arc};

    fn fail(what: &str, e: impl std::fmt::Display) -> ! {
        error!("{}: {}", what, e);
        std::process::exit(1);
    }

    fn load_config() -> Config {
        let path = Config::default_location();
        if let Err(e) = Config::ensure_file_exists(&path) {
            warn!("could not write default config to {}: {}", path.display(), e);
        }
        Config::load_or_default(&path)
    }

    fn backend_variant() -> BackendVariant {
        match OsVersion::detect() {
            Ok(version) => {
                let variant = BackendVariant::for_version(version);
                info!("Windows build {}, using the {} backend", version, variant);
                variant
            }
            Err(e) => {
                warn!(
                    "could not detect the Windows version ({}), using the {} backend",
                    e,
                    BackendVariant::NEWEST
                );
                BackendVariant::NEWEST
            }
        }
    }

    fn spawn_status_log(updates: mpsc::Receiver<StatusUpdate>) {
        std::thread::spawn(move || {
            for update in updates {
                info!(
                    "desktop {} ({} theme)",
                    update.desktop_number(),
                    if update.light_mode { "light" } else { "dark" }
                );
            }
        });
    }

    fn relaunch() {
        match std::env::current_exe().and_then(|exe| std::process::Command::new(exe).spawn()) {
            Ok(_) => info!("started a fresh instance"),
            Err(e) => error!("failed to relaunch: {}", e),
        }
    }

    pub fn run() {
        let instance = match SingleInstance::acquire() {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                show_already_running();
                return;
            }
            Err(e) => fail("single-instance check failed", e),
        };

        let config = load_config();
        let variant = backend_variant();

        let (signal_tx, signal_rx) = mpsc::channel();
        if let Err(e) = spawn_signal_window(signal_tx) {
            fail("failed to listen for shell broadcasts", e);
        }
        let monitor = match ProcessMonitor::spawn(ExplorerHost, signal_rx) {
            Ok(m) => Arc::new(m),
            Err(e) => fail("failed to start the shell monitor", e),
        };

        let (event_tx, event_rx) = mpsc::channel::<InputEvent>();
        let input = match InputThread::spawn(event_tx.clone(), config.change_desktops_with_scroll) {
            Ok(input) => input,
            Err(e) => fail("failed to start the input thread", e),
        };

        let (status_tx, status_rx) = mpsc::channel();
        spawn_status_log(status_rx);

        let mut orchestrator = match Orchestrator::start(
            config,
            input,
            monitor,
            move || ShellDesktops::connect(variant),
            ProgmanFocusShim,
            event_tx,
            Some(status_tx),
        ) {
            Ok(o) => o,
            Err(e) => fail("startup failed", e),
        };

        info!("deskjump running");
        let mut flow = Flow::Continue;
        for event in event_rx {
            flow = orchestrator.handle(event);
            if flow == Flow::Relaunch {
                break;
            }
        }
        if flow == Flow::Relaunch {
            orchestrator.shutdown_for_relaunch();
            drop(instance);
            relaunch();
        } else {
            orchestrator.shutdown();
        }
        info!("exiting");
    }
}
