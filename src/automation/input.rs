//! Platform keystroke injection
//!
//! The editor is driven through OS-level input tools, the only channel an
//! application without a scripting API leaves open: `xdotool` on Linux,
//! `osascript` (System Events) on macOS, `SendKeys` via PowerShell on
//! Windows. Each call shells out once and waits for the tool to finish.

use crate::core::error::AutomationError;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Pause between successive key chords, so menus have time to open
const CHORD_PAUSE_MS: u64 = 500;

/// Injects keystrokes into the focused application window
#[derive(Debug, Clone, Default)]
pub struct UiInput;

impl UiInput {
    pub fn new() -> Self {
        Self
    }

    /// Press a sequence of key chords (e.g. `["alt", "f", "i", "p"]` walks
    /// the File > Import > PSD menu), pausing between chords.
    pub async fn press_sequence(&self, chords: &[&str]) -> Result<(), AutomationError> {
        for chord in chords {
            self.press(chord).await?;
            tokio::time::sleep(Duration::from_millis(CHORD_PAUSE_MS)).await;
        }
        Ok(())
    }

    /// Press a single key chord like `"alt+F4"` or `"Return"`
    pub async fn press(&self, chord: &str) -> Result<(), AutomationError> {
        debug!("pressing {}", chord);
        match std::env::consts::OS {
            "linux" => {
                self.run("xdotool", &["key", "--clearmodifiers", chord])
                    .await
            }
            "macos" => {
                let script = osascript_for_chord(chord);
                self.run("osascript", &["-e", &script]).await
            }
            "windows" => {
                let keys = sendkeys_for_chord(chord);
                let script = format!(
                    "Add-Type -AssemblyName System.Windows.Forms; \
                     [System.Windows.Forms.SendKeys]::SendWait('{keys}')"
                );
                self.run("powershell", &["-NoProfile", "-Command", &script])
                    .await
            }
            other => Err(AutomationError::Unresponsive(format!(
                "no input injection backend for OS '{other}'"
            ))),
        }
    }

    /// Type literal text into the focused control (e.g. a file dialog path)
    pub async fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        debug!("typing {} characters", text.len());
        match std::env::consts::OS {
            "linux" => self.run("xdotool", &["type", "--delay", "20", text]).await,
            "macos" => {
                let script = format!(
                    "tell application \"System Events\" to keystroke \"{}\"",
                    text.replace('\\', "\\\\").replace('"', "\\\"")
                );
                self.run("osascript", &["-e", &script]).await
            }
            "windows" => {
                let script = format!(
                    "Add-Type -AssemblyName System.Windows.Forms; \
                     [System.Windows.Forms.SendKeys]::SendWait('{}')",
                    text.replace('\'', "''")
                );
                self.run("powershell", &["-NoProfile", "-Command", &script])
                    .await
            }
            other => Err(AutomationError::Unresponsive(format!(
                "no input injection backend for OS '{other}'"
            ))),
        }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<(), AutomationError> {
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AutomationError::Unresponsive(format!(
                "input tool '{}' exited with code {}: {}",
                program,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Translate an xdotool-style chord into a System Events script
fn osascript_for_chord(chord: &str) -> String {
    let mut modifiers = Vec::new();
    let mut key = chord;
    for part in chord.split('+') {
        match part {
            "alt" => modifiers.push("option down"),
            "ctrl" => modifiers.push("control down"),
            "shift" => modifiers.push("shift down"),
            "super" | "cmd" => modifiers.push("command down"),
            k => key = k,
        }
    }

    let action = match key {
        "Return" => "key code 36".to_string(),
        "Escape" => "key code 53".to_string(),
        "F4" => "key code 118".to_string(),
        k => format!("keystroke \"{k}\""),
    };

    if modifiers.is_empty() {
        format!("tell application \"System Events\" to {action}")
    } else {
        format!(
            "tell application \"System Events\" to {action} using {{{}}}",
            modifiers.join(", ")
        )
    }
}

/// Translate an xdotool-style chord into SendKeys notation
fn sendkeys_for_chord(chord: &str) -> String {
    let mut prefix = String::new();
    let mut key = chord;
    for part in chord.split('+') {
        match part {
            "alt" => prefix.push('%'),
            "ctrl" => prefix.push('^'),
            "shift" => prefix.push('+'),
            k => key = k,
        }
    }

    let key = match key {
        "Return" => "{ENTER}".to_string(),
        "Escape" => "{ESC}".to_string(),
        "F4" => "{F4}".to_string(),
        "alt" => "%".to_string(),
        k => k.to_string(),
    };

    format!("{prefix}{key}")
}
