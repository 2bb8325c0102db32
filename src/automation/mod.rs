//! UI automation of the external Cubism editor
//!
//! The editor exposes no scripting API, so everything goes through the
//! [`ModelingApp`] capability set. The production driver ([`CubismUi`])
//! injects keystrokes into the real application; tests swap in a scripted
//! fake without touching the orchestrator.

pub mod cubism;
pub mod input;
pub mod session;

use crate::core::error::AutomationError;
use crate::core::layer::Layer;
use async_trait::async_trait;
use std::path::Path;

pub use cubism::CubismUi;
pub use session::{
    drive_with_recovery, AutomationReport, AutomationSession, SessionState, SessionStep,
    StepAction,
};

/// Capability set of the external modeling application
#[async_trait]
pub trait ModelingApp: Send {
    /// Start the application and wait for its control surface
    async fn launch(&mut self) -> Result<(), AutomationError>;

    /// Import one layer image into the open document
    async fn import_layer(&mut self, layer: &Layer, file: &Path) -> Result<(), AutomationError>;

    /// Trigger the auto-rig/assembly action on the imported layers
    async fn rig(&mut self) -> Result<(), AutomationError>;

    /// Trigger export of the assembled model to `target`
    async fn export(&mut self, target: &Path) -> Result<(), AutomationError>;

    /// Terminate the application and release all handles
    async fn close(&mut self) -> Result<(), AutomationError>;

    /// Whether the application process is still answering
    fn is_responsive(&mut self) -> bool;
}
