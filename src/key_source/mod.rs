//! Contains logic for observing system-wide key-down events in different environments.
//! [GenericKeySource] is the main artifact of this module that abstracts the operations.

#[cfg(feature = "evdev")]
pub mod evdev;
#[cfg(feature = "win")]
pub mod win;

#[cfg(feature = "win")]
extern crate windows;

use std::sync::Arc;

use thiserror::Error;

/// Invoked once per observed key-down, from whatever thread the platform backend delivers events
/// on. Implementations keep it cheap and never block in it.
pub type KeyDownCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Error)]
pub enum KeySourceError {
    /// The OS-level grant required for observing global input is missing. Recoverable: the user
    /// can grant access and the tap can be started again later.
    #[error("the system denied access to global key events")]
    PermissionDenied,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Intended to serve as a contract platform key taps must implement.
#[cfg_attr(test, mockall::automock)]
pub trait KeyEventSource: Send {
    /// Registers `on_key_down` and begins delivering events, zero or more times, until the tap is
    /// stopped. Fails with [KeySourceError::PermissionDenied] when the OS permission has not been
    /// granted.
    fn start(&mut self, on_key_down: KeyDownCallback) -> Result<(), KeySourceError>;

    /// Releases the underlying OS resource. Once this returns no further callback invocation
    /// happens, including ones that were in flight when the call was made.
    fn stop(&mut self);
}

/// Serves as a cross-compatible KeyEventSource implementation.
pub struct GenericKeySource {
    inner: Box<dyn KeyEventSource>,
}

impl GenericKeySource {
    pub fn new() -> anyhow::Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsKeyTap;
                Ok(Self {
                    inner: Box::new(WindowsKeyTap::new()),
                })
            }
            else if #[cfg(feature = "evdev")] {
                use evdev::EvdevKeyTap;
                Ok(Self {
                    inner: Box::new(EvdevKeyTap::new()),
                })
            }
            else {
                // This runtime error is needed to allow the project to be compiled for during testing.
                unimplemented!("No key source was specified")
            }
        }
    }
}

impl KeyEventSource for GenericKeySource {
    fn start(&mut self, on_key_down: KeyDownCallback) -> Result<(), KeySourceError> {
        self.inner.start(on_key_down)
    }

    fn stop(&mut self) {
        self.inner.stop()
    }
}
