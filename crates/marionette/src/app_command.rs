use uuid::Uuid;

/// Commands that can be sent to the main application loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Toggle recording on/off (from record hotkey press).
    ToggleRecording,
    /// Run the stored script with the given id.
    RunScript(Uuid),
    /// Stop the active execution session gracefully.
    StopExecution,
    /// Engage the kill switch: halt recording and execution immediately.
    KillSwitch,
    /// Shutdown the application gracefully.
    Shutdown,
}
