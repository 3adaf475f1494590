#![forbid(unsafe_code)]

//! Anchor tracking and the cross-thread inbox.
//!
//! Layout passes may run off the owning context. They report through
//! [`FrameReporter`] and [`PopupTrigger`], which only enqueue a
//! [`RuntimeMessage`]; the runtime drains the queue on its own context
//! before anything touches the registry.
//!
//! Frame reports are multicast: every attached anchor sees every report and
//! keeps only the ones carrying its own id.

use std::sync::mpsc;

use anchored_popup_core::{Frame, IntRect, PopupId};
use tracing::trace;

use crate::registry::Registry;

/// One layout measurement of an anchor, in global coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub id: PopupId,
    pub frame: Frame,
}

impl FrameReport {
    pub fn new(id: impl Into<PopupId>, frame: Frame) -> Self {
        Self {
            id: id.into(),
            frame,
        }
    }
}

/// Work posted to the runtime from any thread.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeMessage {
    Frame(FrameReport),
    Open(PopupId),
    Close(PopupId),
}

/// `Send` handle for reporting anchor frames from a layout pass.
#[derive(Debug, Clone)]
pub struct FrameReporter {
    sender: mpsc::Sender<RuntimeMessage>,
}

impl FrameReporter {
    pub(crate) fn new(sender: mpsc::Sender<RuntimeMessage>) -> Self {
        Self { sender }
    }

    /// Queue a report. Returns `false` if the runtime is gone.
    pub fn report(&self, id: impl Into<PopupId>, frame: Frame) -> bool {
        self.sender
            .send(RuntimeMessage::Frame(FrameReport::new(id, frame)))
            .is_ok()
    }
}

/// `Send` handle for driving popups from outside the view tree.
#[derive(Debug, Clone)]
pub struct PopupTrigger {
    sender: mpsc::Sender<RuntimeMessage>,
}

impl PopupTrigger {
    pub(crate) fn new(sender: mpsc::Sender<RuntimeMessage>) -> Self {
        Self { sender }
    }

    /// Queue an open request. Returns `false` if the runtime is gone.
    pub fn open(&self, id: impl Into<PopupId>) -> bool {
        self.sender.send(RuntimeMessage::Open(id.into())).is_ok()
    }

    /// Queue a close request. Returns `false` if the runtime is gone.
    pub fn close(&self, id: impl Into<PopupId>) -> bool {
        self.sender.send(RuntimeMessage::Close(id.into())).is_ok()
    }
}

/// Writes one anchor's quantized frame into the registry.
#[derive(Debug, Clone)]
pub struct AnchorTracker {
    id: PopupId,
    registry: Registry,
}

impl AnchorTracker {
    pub fn new(id: PopupId, registry: Registry) -> Self {
        Self { id, registry }
    }

    pub fn id(&self) -> &PopupId {
        &self.id
    }

    /// Apply a multicast report. Reports for other ids are ignored.
    ///
    /// Returns `true` if the report belonged to this anchor.
    pub fn accept(&self, report: &FrameReport) -> bool {
        if report.id != self.id {
            trace!(own = %self.id, other = %report.id, "frame report for other anchor ignored");
            return false;
        }
        self.report(report.frame.quantize());
        true
    }

    /// Record an already-quantized frame for this anchor.
    pub fn report(&self, frame: IntRect) {
        self.registry.set_frame(self.id.clone(), frame);
    }
}
