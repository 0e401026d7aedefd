//! Marionette Core Library
//!
//! Input macro recording and replay built on rdev, Enigo, and an
//! optional serial hardware bridge.
//!
//! # Example
//!
//! ```no_run
//! use marionette_core::{
//!     ActuatorMode, ActuatorSelector, BridgeActuator, BridgeConnection, CoreResult,
//!     DEFAULT_BAUD, DEFAULT_RESPONSE_TIMEOUT, DangerPolicy, DirectActuator,
//!     ExecutionEngine, ExecutionLimits, ExecutionOptions, SafetyInterlock, Script,
//!     SystemSerial,
//! };
//!
//! use std::sync::Arc;
//!
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> CoreResult<()> {
//!     let interlock = Arc::new(SafetyInterlock::new(
//!         ExecutionLimits::default(),
//!         DangerPolicy::default(),
//!     ));
//!     let bridge = Arc::new(BridgeConnection::new(
//!         Arc::new(SystemSerial),
//!         DEFAULT_BAUD,
//!         DEFAULT_RESPONSE_TIMEOUT,
//!     ));
//!     let selector = Arc::new(ActuatorSelector::new(
//!         Arc::new(DirectActuator),
//!         Arc::new(BridgeActuator::new(Arc::clone(&bridge))),
//!         ActuatorMode::Direct,
//!     ));
//!
//!     let (event_tx, mut event_rx) = mpsc::channel(64);
//!     let engine = ExecutionEngine::new(interlock, selector, event_tx);
//!
//!     let script = Script::new("demo")?;
//!     engine.start(&script, ExecutionOptions::default())?;
//!     while let Some(event) = event_rx.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

mod actuator;
mod bridge;
mod command;
mod engine;
mod error;
mod hook;
mod hotkey;
mod keys;
mod recorder;
mod safety;
mod script;

pub use {
    actuator::{Actuator, ActuatorMode, ActuatorSelector, DirectActuator, dispatch},
    bridge::{
        BridgeActuator, BridgeConnection, ConnectionState, DEFAULT_BAUD, DEFAULT_RESPONSE_TIMEOUT,
        FrameDecoder, InboundFrame, OutboundFrame, PROTOCOL_VERSION, READ_TIMEOUT, SerialIo,
        SerialTransport, SystemSerial, button_code, click_phase_code, key_phase_code,
    },
    command::{ClickPhase, Command, CommandKind, KeyPhase, MouseButton, TextInput},
    engine::{
        EngineEvent, ExecutionEngine, ExecutionOptions, ExecutionState, Progress,
    },
    error::{CoreError, Result as CoreResult},
    hook::{HookMessage, HookOptions, InputEvent, InputHook, RdevHook},
    hotkey::{HotkeyDefinition, Modifiers, TriggerMode},
    keys::KeyCode,
    recorder::{
        CoalescePolicy, RecorderEvent, RecorderOptions, RecorderState, RecordingSession,
    },
    safety::{
        AuthorizationDecision, AuthorizationRequest, DangerPolicy, ExecutionLimits,
        SafetyInterlock,
    },
    script::Script,
};

#[cfg(test)]
mod tests;
