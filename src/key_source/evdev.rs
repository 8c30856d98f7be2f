use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, RwLock},
};

use anyhow::anyhow;
use evdev::{Device, InputEventKind};
use tracing::{debug, warn};

use super::{KeyDownCallback, KeyEventSource, KeySourceError};

const INPUT_DEVICE_DIR: &str = "/dev/input";

/// Taps keyboards at the kernel level through evdev character devices. Works independently of
/// the display server, which makes it usable under both X11 and Wayland.
///
/// Reading `/dev/input/event*` requires membership in the `input` group (or root); a refusal
/// maps to [KeySourceError::PermissionDenied].
pub struct EvdevKeyTap {
    /// Reader threads deliver through this gate. Clearing it is how [EvdevKeyTap::stop] cuts
    /// them off: delivery holds the read half, so the exclusive write waits out any in-flight
    /// callback.
    gate: Arc<RwLock<Option<KeyDownCallback>>>,
    running: bool,
}

impl EvdevKeyTap {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(RwLock::new(None)),
            running: false,
        }
    }
}

impl Default for EvdevKeyTap {
    fn default() -> Self {
        Self::new()
    }
}

fn is_keyboard(device: &Device) -> bool {
    device
        .supported_keys()
        .map_or(false, |keys| keys.contains(evdev::Key::KEY_ENTER))
}

fn open_keyboards() -> Result<Vec<(PathBuf, Device)>, KeySourceError> {
    let entries = std::fs::read_dir(INPUT_DEVICE_DIR)
        .map_err(|e| anyhow!("can't list {INPUT_DEVICE_DIR}: {e}"))?;

    let mut keyboards = vec![];
    let mut denied = false;
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        let is_event_node = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("event"));
        if !is_event_node {
            continue;
        }

        match Device::open(&path) {
            Ok(device) if is_keyboard(&device) => keyboards.push((path, device)),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => denied = true,
            Err(e) => warn!("Skipping unreadable input device {path:?}: {e}"),
        }
    }

    if keyboards.is_empty() {
        if denied {
            return Err(KeySourceError::PermissionDenied);
        }
        return Err(anyhow!("no keyboard device found under {INPUT_DEVICE_DIR}").into());
    }
    Ok(keyboards)
}

fn run_reader(mut device: Device, path: PathBuf, gate: Arc<RwLock<Option<KeyDownCallback>>>) {
    loop {
        let events = match device.fetch_events() {
            Ok(events) => events,
            Err(e) => {
                // Unplugged keyboards end up here. Other devices keep their own readers.
                warn!("Reading {path:?} failed, tap on this device ends {e:?}");
                return;
            }
        };

        for event in events {
            if let InputEventKind::Key(_) = event.kind() {
                // 1 is a press, 2 an autorepeat; both arrive as key-down on every platform.
                if event.value() == 1 || event.value() == 2 {
                    let guard = gate.read().unwrap();
                    let Some(callback) = guard.as_ref() else {
                        return;
                    };
                    callback();
                }
            }
        }

        if gate.read().unwrap().is_none() {
            return;
        }
    }
}

impl KeyEventSource for EvdevKeyTap {
    fn start(&mut self, on_key_down: KeyDownCallback) -> Result<(), KeySourceError> {
        if self.running {
            return Err(anyhow!("key tap is already running").into());
        }

        let keyboards = open_keyboards()?;
        *self.gate.write().unwrap() = Some(on_key_down);

        for (path, device) in keyboards {
            debug!("Tapping keyboard {path:?}");
            let gate = self.gate.clone();
            std::thread::spawn(move || run_reader(device, path, gate));
        }

        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        // Acquiring the write half waits for in-flight deliveries, so once the gate is cleared
        // the registered callback cannot run again. Reader threads stay parked in their kernel
        // read until the next input event, notice the closed gate and exit on their own.
        *self.gate.write().unwrap() = None;
        self.running = false;
    }
}
