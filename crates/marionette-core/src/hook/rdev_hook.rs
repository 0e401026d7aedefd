//! `rdev`-backed global input hook.
//!
//! A single listener thread runs `rdev::listen` for the lifetime of the
//! process; rdev has no teardown API, so `uninstall` silences forwarding
//! by clearing the subscriber rather than removing the OS hook. The
//! callback decodes, filters, and enqueues, nothing else.

use crate::{
    CoreError, CoreResult,
    command::{ClickPhase, KeyPhase, MouseButton},
    hook::{HookMessage, HookOptions, InputEvent, InputHook, passes_filter},
    keys,
};

use std::{
    panic::{AssertUnwindSafe, Location, catch_unwind},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use error_location::ErrorLocation;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

struct Subscriber {
    options: HookOptions,
    tx: mpsc::Sender<HookMessage>,
}

#[derive(Default)]
struct Shared {
    subscriber: Mutex<Option<Subscriber>>,
    listener_spawned: AtomicBool,
    /// Set when `rdev::listen` returns an error; the listener is dead and
    /// later installs must fail instead of silently never delivering.
    listener_fault: Mutex<Option<String>>,
}

/// Global input hook over [`rdev`].
///
/// The OS reports no injected-origin flag through rdev, so events carry
/// `injected = false` on this backend; the filter option is still honored
/// by the shared filtering logic.
#[derive(Default)]
pub struct RdevHook {
    shared: Arc<Shared>,
}

impl RdevHook {
    /// Create a hook. The listener thread starts on first `install`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputHook for RdevHook {
    #[instrument(skip(self, subscriber))]
    fn install(
        &self,
        options: HookOptions,
        subscriber: mpsc::Sender<HookMessage>,
    ) -> CoreResult<()> {
        if let Some(reason) = self
            .shared
            .listener_fault
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
        {
            return Err(CoreError::HookInstallation {
                reason,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        {
            let mut guard = self.shared.subscriber.lock().map_err(poisoned_lock)?;
            if guard.is_some() {
                debug!("Hook already installed, install is a no-op");
                return Ok(());
            }
            *guard = Some(Subscriber {
                options,
                tx: subscriber,
            });
        }

        if !self.shared.listener_spawned.swap(true, Ordering::AcqRel) {
            spawn_listener(Arc::clone(&self.shared));
        }

        info!(?options, "Input hook installed");
        Ok(())
    }

    fn uninstall(&self) {
        if let Ok(mut guard) = self.shared.subscriber.lock() {
            if guard.take().is_some() {
                info!("Input hook uninstalled");
            }
        }
    }

    fn is_installed(&self) -> bool {
        self.shared
            .subscriber
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

#[track_caller]
fn poisoned_lock<T>(_: std::sync::PoisonError<T>) -> CoreError {
    CoreError::HookInstallation {
        reason: "hook subscriber lock poisoned".to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}

fn spawn_listener(shared: Arc<Shared>) {
    std::thread::spawn(move || {
        let callback_shared = Arc::clone(&shared);
        // Button events in rdev carry no position; remember the last move.
        let mut last_pos: (i32, i32) = (0, 0);

        let result = rdev::listen(move |event| {
            // The OS calls this synchronously. A panic escaping here would
            // unwind into the OS hook machinery, so swallow and log.
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                forward(&callback_shared, &mut last_pos, &event);
            }));
            if outcome.is_err() {
                warn!("Input hook callback panicked; event dropped");
            }
        });

        if let Err(error) = result {
            let reason = format!("OS input listener failed: {error:?}");
            warn!(reason, "Input hook listener exited");
            if let Ok(mut fault) = shared.listener_fault.lock() {
                *fault = Some(reason.clone());
            }
            if let Ok(guard) = shared.subscriber.lock()
                && let Some(subscriber) = guard.as_ref()
            {
                let _ = subscriber.tx.try_send(HookMessage::Fault { reason });
            }
        }
    });
}

/// Decode one rdev event and enqueue it for the active subscriber.
fn forward(shared: &Shared, last_pos: &mut (i32, i32), event: &rdev::Event) {
    let Some(decoded) = decode(last_pos, &event.event_type) else {
        return;
    };

    let Ok(guard) = shared.subscriber.lock() else {
        return;
    };
    let Some(subscriber) = guard.as_ref() else {
        return;
    };
    if !passes_filter(&subscriber.options, &decoded) {
        return;
    }

    // try_send, never block: a full queue means the consumer is behind,
    // and stalling here would stall system-wide input delivery.
    if subscriber.tx.try_send(HookMessage::Event(decoded)).is_err() {
        debug!("Hook event queue full or closed; event dropped");
    }
}

fn decode(last_pos: &mut (i32, i32), event_type: &rdev::EventType) -> Option<InputEvent> {
    use rdev::EventType;

    match event_type {
        EventType::MouseMove { x, y } => {
            *last_pos = (*x as i32, *y as i32);
            Some(InputEvent::PointerMoved {
                x: last_pos.0,
                y: last_pos.1,
            })
        }
        EventType::ButtonPress(button) => decode_button(*button).map(|button| {
            InputEvent::PointerButton {
                x: last_pos.0,
                y: last_pos.1,
                button,
                phase: ClickPhase::Down,
                injected: false,
            }
        }),
        EventType::ButtonRelease(button) => decode_button(*button).map(|button| {
            InputEvent::PointerButton {
                x: last_pos.0,
                y: last_pos.1,
                button,
                phase: ClickPhase::Up,
                injected: false,
            }
        }),
        EventType::KeyPress(key) => keys::from_rdev(*key).map(|key| InputEvent::Key {
            key,
            phase: KeyPhase::Down,
            injected: false,
        }),
        EventType::KeyRelease(key) => keys::from_rdev(*key).map(|key| InputEvent::Key {
            key,
            phase: KeyPhase::Up,
            injected: false,
        }),
        EventType::Wheel { .. } => None,
    }
}

fn decode_button(button: rdev::Button) -> Option<MouseButton> {
    match button {
        rdev::Button::Left => Some(MouseButton::Left),
        rdev::Button::Right => Some(MouseButton::Right),
        rdev::Button::Middle => Some(MouseButton::Middle),
        // Extended buttons are platform-numbered; 4/5 is the common report.
        rdev::Button::Unknown(4) => Some(MouseButton::X1),
        rdev::Button::Unknown(5) => Some(MouseButton::X2),
        rdev::Button::Unknown(_) => None,
    }
}
