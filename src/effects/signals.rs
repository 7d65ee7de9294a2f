use std::{cell::RefCell, rc::Rc};

use crate::{
    damage::region::Region,
    foundation::{
        core::WorkspaceId,
        handle::{HookList, RawHandle},
    },
    render::{device::RenderDevice, framebuffer::FramebufferDesc},
};

/// Payload of the `stream-pre` and `stream-post` notifications.
///
/// `stream-pre` listeners may grow `damage` (for example by an effect's sampling radius) and
/// read pixels through `device` before the damaged area is cleared.
pub struct StreamSignal<'a> {
    pub workspace: WorkspaceId,
    /// Damage of the update, in damage coordinates of `target`.
    pub damage: &'a mut Region,
    pub target: &'a FramebufferDesc,
    pub device: &'a mut dyn RenderDevice,
}

pub type StreamListener = dyn FnMut(&mut StreamSignal<'_>);
pub type StartRenderingListener = dyn FnMut();

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalKind {
    StreamPre,
    StreamPost,
    StartRendering,
}

/// Registration token returned by the `connect_*` methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SignalHandle {
    kind: SignalKind,
    raw: RawHandle,
}

impl SignalHandle {
    pub fn kind(&self) -> SignalKind {
        self.kind
    }
}

/// Notifications emitted by the pipeline.
#[derive(Default)]
pub struct Signals {
    stream_pre: HookList<StreamListener>,
    stream_post: HookList<StreamListener>,
    start_rendering: HookList<StartRenderingListener>,
}

impl Signals {
    pub fn connect_stream_pre(
        &mut self,
        f: impl FnMut(&mut StreamSignal<'_>) + 'static,
    ) -> SignalHandle {
        let raw = self.stream_pre.push(Rc::new(RefCell::new(f)));
        SignalHandle {
            kind: SignalKind::StreamPre,
            raw,
        }
    }

    pub fn connect_stream_post(
        &mut self,
        f: impl FnMut(&mut StreamSignal<'_>) + 'static,
    ) -> SignalHandle {
        let raw = self.stream_post.push(Rc::new(RefCell::new(f)));
        SignalHandle {
            kind: SignalKind::StreamPost,
            raw,
        }
    }

    pub fn connect_start_rendering(&mut self, f: impl FnMut() + 'static) -> SignalHandle {
        let raw = self.start_rendering.push(Rc::new(RefCell::new(f)));
        SignalHandle {
            kind: SignalKind::StartRendering,
            raw,
        }
    }

    /// Returns `false` for stale or foreign handles.
    pub fn disconnect(&mut self, handle: SignalHandle) -> bool {
        match handle.kind {
            SignalKind::StreamPre => self.stream_pre.remove(handle.raw),
            SignalKind::StreamPost => self.stream_post.remove(handle.raw),
            SignalKind::StartRendering => self.start_rendering.remove(handle.raw),
        }
    }

    pub fn listener_count(&self, kind: SignalKind) -> usize {
        match kind {
            SignalKind::StreamPre => self.stream_pre.len(),
            SignalKind::StreamPost => self.stream_post.len(),
            SignalKind::StartRendering => self.start_rendering.len(),
        }
    }

    pub(crate) fn emit_stream_pre(&self, signal: &mut StreamSignal<'_>) {
        emit_stream(&self.stream_pre, signal, "stream-pre");
    }

    pub(crate) fn emit_stream_post(&self, signal: &mut StreamSignal<'_>) {
        emit_stream(&self.stream_post, signal, "stream-post");
    }

    pub(crate) fn emit_start_rendering(&self) {
        for listener in self.start_rendering.snapshot() {
            match listener.try_borrow_mut() {
                Ok(mut f) => (&mut *f)(),
                Err(_) => tracing::warn!("start-rendering listener re-entered, skipped"),
            }
        }
    }
}

fn emit_stream(list: &HookList<StreamListener>, signal: &mut StreamSignal<'_>, name: &str) {
    if list.is_empty() {
        return;
    }
    for listener in list.snapshot() {
        match listener.try_borrow_mut() {
            Ok(mut f) => (&mut *f)(&mut *signal),
            Err(_) => tracing::warn!(signal = name, "listener re-entered, skipped"),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/signals.rs"]
mod tests;
