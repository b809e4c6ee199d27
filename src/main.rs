//! bseat - seat session host for Linux DRM/KMS
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              poll(2) loop                │
//! ├──────────────────────────────────────────┤
//! │  libseat fd  →  dispatch_pending         │
//! │  udev fd     →  dispatch_hotplug         │
//! │  libinput fd →  dispatch_input           │
//! │                      ↓                   │
//! │             SessionEvents                │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Opens the KMS cards of the seat, follows hotplug and prints what the
//! session publishes. Ctrl+Alt+F1..F12 switches VT.

use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use std::cell::RefCell;
use std::os::fd::BorrowedFd;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use bseat::config::Config;
use bseat::constants::{
    KEY_F1, KEY_F10, KEY_F11, KEY_F12, KEY_F2, KEY_F3, KEY_F4, KEY_F5, KEY_F6, KEY_F7, KEY_F8,
    KEY_F9, KEY_LEFTALT, KEY_LEFTCTRL, KEY_RIGHTALT, KEY_RIGHTCTRL,
};
use bseat::drm::CardFilter;
use bseat::input::KeyEvent;
use bseat::session::{SessionDevice, SessionManager, SystemBackends};

/// poll(2) timeout, so shutdown signals are noticed
const POLL_TIMEOUT_MS: libc::c_int = 1000;

/// DRM device node directory
const DRI_DIR: &str = "/dev/dri";

// ============================================================================
// Signals
// ============================================================================

/// Global flag for shutdown requested via signal (SIGTERM/SIGINT/SIGHUP)
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

/// Handles SIGTERM (systemd stop), SIGINT (Ctrl+C), and SIGHUP (terminal hangup).
fn setup_signal_handlers() {
    unsafe {
        libc::signal(
            libc::SIGTERM,
            shutdown_signal_handler as *const () as libc::sighandler_t,
        );
        libc::signal(
            libc::SIGINT,
            shutdown_signal_handler as *const () as libc::sighandler_t,
        );
        libc::signal(
            libc::SIGHUP,
            shutdown_signal_handler as *const () as libc::sighandler_t,
        );
    }
}

extern "C" fn shutdown_signal_handler(_signo: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

// ============================================================================
// VT switching
// ============================================================================

/// Physical modifier state, tracked from key events
#[derive(Debug, Default, Clone, Copy)]
struct Modifiers {
    ctrl: bool,
    alt: bool,
}

impl Modifiers {
    fn update(&mut self, event: &KeyEvent) {
        match event.key {
            KEY_LEFTCTRL | KEY_RIGHTCTRL => self.ctrl = event.pressed,
            KEY_LEFTALT | KEY_RIGHTALT => self.alt = event.pressed,
            _ => {}
        }
    }
}

/// VT number for Ctrl+Alt+F1..F12, on key press only
fn vt_switch_target(event: &KeyEvent, mods: Modifiers) -> Option<u32> {
    if !event.pressed || !mods.ctrl || !mods.alt {
        return None;
    }

    // Map F1-F12 to VT 1-12
    match event.key {
        KEY_F1 => Some(1),
        KEY_F2 => Some(2),
        KEY_F3 => Some(3),
        KEY_F4 => Some(4),
        KEY_F5 => Some(5),
        KEY_F6 => Some(6),
        KEY_F7 => Some(7),
        KEY_F8 => Some(8),
        KEY_F9 => Some(9),
        KEY_F10 => Some(10),
        KEY_F11 => Some(11),
        KEY_F12 => Some(12),
        _ => None,
    }
}

// ============================================================================
// Host state
// ============================================================================

/// Work queued by signal handlers, applied between dispatch calls
#[derive(Debug, Default)]
struct Pending {
    cards: Vec<PathBuf>,
    close: Vec<RawFd>,
    vt_switch: Option<u32>,
}

type Shared<T> = Rc<RefCell<T>>;

/// Log card changes and close the card once it is removed
fn watch_card(device: &Rc<SessionDevice>, pending: &Shared<Pending>) {
    let path = device.path().to_path_buf();
    device.events.change.subscribe(move |change| {
        info!("{}: {:?}", path.display(), change);
    });

    let Some(fd) = device.raw_fd() else {
        return;
    };
    let path = device.path().to_path_buf();
    let pending = pending.clone();
    let mut queued = false;
    // Closing emits remove once more
    device.events.remove.subscribe(move |_| {
        if queued {
            return;
        }
        queued = true;
        info!("{}: removed", path.display());
        pending.borrow_mut().close.push(fd);
    });
}

fn open_card(session: &mut SessionManager, path: &Path, pending: &Shared<Pending>) {
    if session.devices().iter().any(|d| d.is_open() && d.path() == path) {
        debug!("{} already in use", path.display());
        return;
    }
    match session.open_if_kms(path) {
        Some(device) => {
            info!("Using KMS card {}", path.display());
            watch_card(&device, pending);
        }
        None => debug!("Skipping {}", path.display()),
    }
}

/// Card nodes present before the hotplug monitor started
fn existing_cards(filter: &CardFilter) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(DRI_DIR) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot scan {}: {}", DRI_DIR, e);
            return Vec::new();
        }
    };

    let mut cards: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| filter.is_card(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .collect();
    cards.sort();
    cards
}

fn subscribe_host_events(session: &SessionManager, pending: &Shared<Pending>, vt_switch: bool) {
    let events = &session.events;

    events.change_active.subscribe(|active| {
        info!("Session {}", if *active { "active" } else { "inactive" });
    });

    let p = pending.clone();
    events.add_drm_card.subscribe(move |event| {
        info!("New card {}", event.path.display());
        p.borrow_mut().cards.push(event.path.clone());
    });

    let p = pending.clone();
    let mods = Rc::new(RefCell::new(Modifiers::default()));
    events.new_keyboard.subscribe(move |keyboard| {
        info!("Keyboard: {}", keyboard.name());
        let p = p.clone();
        let mods = mods.clone();
        keyboard.events.key.subscribe(move |event| {
            trace!("key {} {}", event.key, if event.pressed { "down" } else { "up" });
            let mut mods = mods.borrow_mut();
            mods.update(event);
            if vt_switch {
                if let Some(target) = vt_switch_target(event, *mods) {
                    p.borrow_mut().vt_switch = Some(target);
                }
            }
        });
    });

    events.new_pointer.subscribe(|mouse| {
        info!("Pointer: {}", mouse.name());
        mouse.events.button.subscribe(|event| {
            debug!(
                "button {:#x} {}",
                event.button,
                if event.pressed { "pressed" } else { "released" }
            );
        });
        mouse.events.axis.subscribe(|event| {
            debug!(
                "axis {:?} {:.2} ({:?}, {:?}, discrete={:?})",
                event.axis, event.delta, event.source, event.direction, event.discrete
            );
        });
    });
}

fn apply_pending(session: &mut SessionManager, pending: &Shared<Pending>) {
    let work = std::mem::take(&mut *pending.borrow_mut());

    for fd in work.close {
        session.close_device_fd(fd);
    }
    for path in work.cards {
        open_card(session, &path, pending);
    }
    if let Some(target) = work.vt_switch {
        if let Err(e) = session.switch_session(target) {
            warn!("Failed to switch to VT{}: {}", target, e);
        }
    }
}

/// Wait for readiness and dispatch the matching channel
fn poll_once(session: &mut SessionManager) -> Result<()> {
    let descriptors = session.pollable_descriptors();
    // Descriptors stay open for the whole call: the session is not torn down here
    let borrowed: Vec<BorrowedFd<'_>> = descriptors
        .iter()
        .map(|&fd| unsafe { BorrowedFd::borrow_raw(fd) })
        .collect();
    let mut fds: Vec<nix::poll::PollFd> = borrowed
        .iter()
        .map(|fd| nix::poll::PollFd::new(fd, nix::poll::PollFlags::POLLIN))
        .collect();

    match nix::poll::poll(&mut fds, POLL_TIMEOUT_MS) {
        Ok(0) => return Ok(()),
        Ok(_) => {}
        Err(nix::errno::Errno::EINTR) => return Ok(()),
        Err(e) => return Err(e).context("poll failed"),
    }

    let ready: Vec<bool> = fds
        .iter()
        .map(|fd| {
            fd.revents()
                .map(|r| r.intersects(nix::poll::PollFlags::POLLIN))
                .unwrap_or(false)
        })
        .collect();
    drop(fds);

    // [seat, hotplug, input]
    if ready.first() == Some(&true) {
        session.dispatch_pending();
    } else {
        if ready.get(1) == Some(&true) {
            session.dispatch_hotplug();
        }
        if ready.get(2) == Some(&true) {
            session.dispatch_input();
        }
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"bseat {} - seat session host for Linux DRM/KMS

USAGE:
    bseat [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    --init-config           Generate the default config file
    -f, --force             Overwrite an existing config file

ENVIRONMENT:
    BSEAT_CONFIG            Config file path
    RUST_LOG                Log filter (overrides [logging] filter)

CONFIG FILE:
    ~/.config/bseat/config.toml
    /etc/bseat/config.toml
"#,
        env!("CARGO_PKG_VERSION")
    );
}

fn main() -> Result<()> {
    // Check command line arguments
    let args: Vec<String> = std::env::args().collect();

    // --help
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    // --version
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("bseat {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let (config, outcome) = Config::load();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.filter.as_str()),
    )
    .init();
    outcome.log();

    // --init-config
    if args.iter().any(|a| a == "--init-config") {
        let force = args.iter().any(|a| a == "--force" || a == "-f");
        let path = Config::write_default(force)?;
        println!("Config file written: {}", path.display());
        return Ok(());
    }

    config.validate();
    info!("bseat starting...");

    // Set up signal handlers for graceful shutdown (systemd stop)
    setup_signal_handlers();

    let mut session = SessionManager::new(&config.session);
    session
        .bootstrap(&mut SystemBackends)
        .context("Failed to bootstrap session")?;

    let pending: Shared<Pending> = Rc::default();
    subscribe_host_events(&session, &pending, config.host.vt_switch);

    let filter = CardFilter {
        subsystem: config.session.hotplug_subsystem.clone(),
        card_prefix: config.session.card_prefix.clone(),
    };
    for path in existing_cards(&filter) {
        open_card(&mut session, &path, &pending);
    }
    // Input devices queued while the engine was created, plus anything
    // that arrived during the card scan
    session.dispatch_pending();
    apply_pending(&mut session, &pending);
    if session.devices().is_empty() {
        warn!("No KMS card found on seat {}", session.seat_name());
    }

    session.announce_ready();
    if config.host.notify_systemd {
        let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);
    }
    info!("Seat {} ready", session.seat_name());

    while !shutdown_requested() {
        poll_once(&mut session)?;
        apply_pending(&mut session, &pending);
    }

    info!("Received shutdown signal, shutting down gracefully...");
    if config.host.notify_systemd {
        let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Stopping]);
    }
    session.teardown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: u32, pressed: bool) -> KeyEvent {
        KeyEvent {
            time_ms: 0,
            key,
            pressed,
        }
    }

    #[test]
    fn test_vt_switch_needs_ctrl_alt() {
        let mut mods = Modifiers::default();
        assert_eq!(vt_switch_target(&key(KEY_F2, true), mods), None);

        mods.update(&key(KEY_LEFTCTRL, true));
        assert_eq!(vt_switch_target(&key(KEY_F2, true), mods), None);

        mods.update(&key(KEY_RIGHTALT, true));
        assert_eq!(vt_switch_target(&key(KEY_F2, true), mods), Some(2));
        assert_eq!(vt_switch_target(&key(KEY_F12, true), mods), Some(12));
        assert_eq!(vt_switch_target(&key(KEY_F2, false), mods), None);
        assert_eq!(vt_switch_target(&key(30, true), mods), None);

        mods.update(&key(KEY_LEFTCTRL, false));
        assert_eq!(vt_switch_target(&key(KEY_F2, true), mods), None);
    }
}
