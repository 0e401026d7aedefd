//! Marionette: input macro recording and playback with global hotkey control.

mod app;
mod app_command;
mod config;
mod error;
mod hotkey_handler;
mod storage;
#[cfg(test)]
mod tests;

pub(crate) use {
    app::App,
    app_command::AppCommand,
    error::{AppError, Result as AppResult},
    hotkey_handler::HotkeyHandler,
    storage::ScriptStore,
};

use crate::config::{Config, InputMode};

use std::sync::Arc;

use global_hotkey::GlobalHotKeyManager;
use marionette_core::{
    ActuatorSelector, BridgeActuator, BridgeConnection, DEFAULT_RESPONSE_TIMEOUT, DirectActuator,
    ExecutionEngine, RdevHook, SafetyInterlock, SystemSerial,
};
use tao::{
    event::Event,
    event_loop::{ControlFlow, EventLoopBuilder},
};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// Application entry point.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("marionette=debug,marionette_core=debug")
        .init();

    let event_loop = EventLoopBuilder::<()>::with_user_event().build();
    let exit_proxy = event_loop.create_proxy();

    // Persists across event loop iterations — dropping it unregisters the hotkeys.
    let mut hotkey_manager: Option<GlobalHotKeyManager> = None;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::UserEvent(()) => {
                *control_flow = ControlFlow::ExitWithCode(0);
                return;
            }
            Event::NewEvents(tao::event::StartCause::Init) => {
                let config = match Config::load() {
                    Ok(c) => c,
                    Err(e) => {
                        error!("Failed to load config: {:?}", e);
                        std::process::exit(1);
                    }
                };

                let store = match Config::scripts_dir().and_then(ScriptStore::new) {
                    Ok(s) => s,
                    Err(e) => {
                        error!("Failed to open script store: {:?}", e);
                        std::process::exit(1);
                    }
                };

                let scripts = match store.list() {
                    Ok(s) => s,
                    Err(e) => {
                        error!("Failed to list stored scripts: {:?}", e);
                        std::process::exit(1);
                    }
                };

                // Register hotkeys on the main thread — tao's event loop pumps
                // the Windows messages needed for WM_HOTKEY delivery.
                // hotkey_manager is stored in the closure's captured state so it
                // lives for the entire app lifetime.
                let (manager, bindings) = match hotkey_handler::register_hotkeys(
                    &config.recording.toggle_hotkey,
                    &config.safety.kill_switch_hotkey,
                    &scripts,
                ) {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("Failed to register hotkeys: {:?}", e);
                        std::process::exit(1);
                    }
                };
                hotkey_manager = Some(manager);

                let exit_proxy = exit_proxy.clone();

                // Spawn tokio runtime on separate thread.
                // The hotkey manager stays on the main thread.
                std::thread::spawn(move || {
                    let rt = match tokio::runtime::Runtime::new() {
                        Ok(rt) => rt,
                        Err(e) => {
                            error!("Failed to create tokio runtime: {:?}", e);
                            std::process::exit(1);
                        }
                    };

                    let interlock = Arc::new(SafetyInterlock::new(
                        config.safety.execution_limits(),
                        config.safety.danger_policy(),
                    ));
                    let (auth_tx, auth_rx) = mpsc::channel(8);
                    interlock.set_authorizer(auth_tx);

                    // Bridge connection happens off the runtime: the probe
                    // exchange blocks on serial round-trips.
                    let bridge = Arc::new(BridgeConnection::new(
                        Arc::new(SystemSerial),
                        config.input.baud,
                        DEFAULT_RESPONSE_TIMEOUT,
                    ));
                    if config.input.mode == InputMode::Hardware {
                        let connected = match &config.input.port {
                            Some(port) => bridge.connect(port).map(|()| port.clone()),
                            None => bridge.auto_connect(),
                        };
                        match connected {
                            Ok(port) => info!(%port, "Hardware bridge connected"),
                            Err(e) => warn!(
                                error = %e,
                                "Hardware bridge unavailable, playback will fail until it connects"
                            ),
                        }
                    }

                    let selector = Arc::new(ActuatorSelector::new(
                        Arc::new(DirectActuator::new()),
                        Arc::new(BridgeActuator::new(Arc::clone(&bridge))),
                        config.input.mode.into(),
                    ));

                    let (engine_tx, engine_rx) = mpsc::channel(256);
                    let engine =
                        ExecutionEngine::new(Arc::clone(&interlock), selector, engine_tx);

                    let (recorder_tx, recorder_rx) = mpsc::channel(256);
                    let (command_tx, command_rx) = mpsc::channel(32);
                    let (shutdown_tx, shutdown_rx) = watch::channel(false);

                    rt.block_on(async {
                        let hotkey_handler = HotkeyHandler::new(bindings, command_tx);

                        let app = App {
                            config,
                            store,
                            interlock,
                            engine,
                            hook: Arc::new(RdevHook::new()),
                            recording: None,
                            command_rx,
                            engine_rx,
                            recorder_tx,
                            recorder_rx,
                            auth_rx,
                            shutdown_tx,
                        };

                        tokio::join!(hotkey_handler.run(shutdown_rx), async {
                            if let Err(e) = app.run().await {
                                error!(error = ?e, "App error");
                            }
                        });
                    });

                    let _ = exit_proxy.send_event(());
                });
            }
            _ => {}
        }

        // Keep hotkey_manager alive in the closure for the app's lifetime.
        let _ = &hotkey_manager;
    });
}
