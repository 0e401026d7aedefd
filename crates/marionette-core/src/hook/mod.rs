//! Global input observation hook.
//!
//! The OS invokes hook callbacks synchronously on its own thread; a slow
//! or panicking handler can stall input for every process. The contract
//! here is therefore decode-and-enqueue only: backends translate raw
//! callbacks into [`InputEvent`]s and push them into a bounded channel
//! with `try_send`, never blocking and never letting a panic escape.

mod rdev_hook;

pub use rdev_hook::RdevHook;

use crate::{
    command::{ClickPhase, KeyPhase, MouseButton},
    error::Result as CoreResult,
    keys::KeyCode,
};

use tokio::sync::mpsc;

/// What the hook observes and whether injected events are filtered out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookOptions {
    /// Report pointer motion.
    pub observe_pointer_moves: bool,
    /// Report mouse button presses/releases.
    pub observe_clicks: bool,
    /// Report key presses/releases.
    pub observe_keys: bool,
    /// Pass software-injected events through without reporting them.
    pub filter_injected: bool,
}

impl Default for HookOptions {
    fn default() -> Self {
        Self {
            observe_pointer_moves: true,
            observe_clicks: true,
            observe_keys: true,
            filter_injected: true,
        }
    }
}

/// A decoded input observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// The pointer moved.
    PointerMoved {
        /// Screen x.
        x: i32,
        /// Screen y.
        y: i32,
    },
    /// A mouse button changed state.
    PointerButton {
        /// Screen x at the time of the event.
        x: i32,
        /// Screen y at the time of the event.
        y: i32,
        /// Which button.
        button: MouseButton,
        /// Press or release.
        phase: ClickPhase,
        /// Whether the event was software-injected.
        injected: bool,
    },
    /// A key changed state.
    Key {
        /// Virtual key code.
        key: KeyCode,
        /// Press or release.
        phase: KeyPhase,
        /// Whether the event was software-injected.
        injected: bool,
    },
}

/// What a hook backend delivers to its subscriber.
#[derive(Debug, Clone)]
pub enum HookMessage {
    /// A decoded input event.
    Event(InputEvent),
    /// The OS listener failed after installation; no further events will
    /// arrive until the hook is reinstalled.
    Fault {
        /// Human-readable failure description from the OS layer.
        reason: String,
    },
}

/// A process-wide input observation hook.
///
/// Exactly one subscriber may be active at a time. `install` while
/// already installed is a no-op returning success; `uninstall` is
/// idempotent and safe from any teardown path.
pub trait InputHook: Send + Sync {
    /// Install the hook and deliver events to `subscriber`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::HookInstallation`] if the OS refuses
    /// the hook.
    fn install(
        &self,
        options: HookOptions,
        subscriber: mpsc::Sender<HookMessage>,
    ) -> CoreResult<()>;

    /// Remove the subscriber. Idempotent.
    fn uninstall(&self);

    /// Whether a subscriber is currently active.
    fn is_installed(&self) -> bool;
}

/// Apply [`HookOptions`] to a decoded event.
///
/// Returns `false` when the event must not reach the subscriber. Shared
/// by backends so filtering behaves identically on every platform.
#[must_use]
pub(crate) fn passes_filter(options: &HookOptions, event: &InputEvent) -> bool {
    match event {
        InputEvent::PointerMoved { .. } => options.observe_pointer_moves,
        InputEvent::PointerButton { injected, .. } => {
            options.observe_clicks && !(options.filter_injected && *injected)
        }
        InputEvent::Key { injected, .. } => {
            options.observe_keys && !(options.filter_injected && *injected)
        }
    }
}
