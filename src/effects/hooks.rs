use std::{cell::RefCell, rc::Rc};

use crate::foundation::handle::{HookList, RawHandle};

/// Point in the frame at which an effect hook runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectStage {
    /// Before the workspace stream is updated; hooks may add damage to the current frame.
    Pre,
    /// After the scene is drawn into the target, before cursors.
    Overlay,
    /// After the frame has been presented.
    Post,
}

impl EffectStage {
    pub const ALL: [EffectStage; 3] = [EffectStage::Pre, EffectStage::Overlay, EffectStage::Post];

    pub fn as_str(self) -> &'static str {
        match self {
            EffectStage::Pre => "pre",
            EffectStage::Overlay => "overlay",
            EffectStage::Post => "post",
        }
    }
}

/// Registration token returned by `add_effect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EffectHandle {
    stage: EffectStage,
    raw: RawHandle,
}

impl EffectHandle {
    pub fn stage(&self) -> EffectStage {
        self.stage
    }
}

/// Per-stage ordered hook lists.
///
/// `Ctx` is what a hook receives when it fires, normally the render manager itself.
pub(crate) struct EffectHooks<Ctx: ?Sized> {
    pre: HookList<dyn FnMut(&mut Ctx)>,
    overlay: HookList<dyn FnMut(&mut Ctx)>,
    post: HookList<dyn FnMut(&mut Ctx)>,
}

impl<Ctx: ?Sized> Default for EffectHooks<Ctx> {
    fn default() -> Self {
        Self {
            pre: HookList::default(),
            overlay: HookList::default(),
            post: HookList::default(),
        }
    }
}

impl<Ctx: ?Sized> EffectHooks<Ctx> {
    fn list(&self, stage: EffectStage) -> &HookList<dyn FnMut(&mut Ctx)> {
        match stage {
            EffectStage::Pre => &self.pre,
            EffectStage::Overlay => &self.overlay,
            EffectStage::Post => &self.post,
        }
    }

    fn list_mut(&mut self, stage: EffectStage) -> &mut HookList<dyn FnMut(&mut Ctx)> {
        match stage {
            EffectStage::Pre => &mut self.pre,
            EffectStage::Overlay => &mut self.overlay,
            EffectStage::Post => &mut self.post,
        }
    }

    pub(crate) fn add(
        &mut self,
        stage: EffectStage,
        hook: Rc<RefCell<dyn FnMut(&mut Ctx)>>,
    ) -> EffectHandle {
        let raw = self.list_mut(stage).push(hook);
        EffectHandle { stage, raw }
    }

    /// Returns `false` for stale or foreign handles.
    pub(crate) fn remove(&mut self, handle: EffectHandle) -> bool {
        self.list_mut(handle.stage).remove(handle.raw)
    }

    pub(crate) fn contains(&self, handle: EffectHandle) -> bool {
        self.list(handle.stage).contains(handle.raw)
    }

    /// Registration-ordered hooks of `stage`, detached from later registry changes.
    pub(crate) fn snapshot(&self, stage: EffectStage) -> Vec<Rc<RefCell<dyn FnMut(&mut Ctx)>>> {
        self.list(stage).snapshot()
    }

    pub(crate) fn len(&self, stage: EffectStage) -> usize {
        self.list(stage).len()
    }
}

/// Call each hook of a snapshot in order; a hook that is already running is skipped.
pub(crate) fn fire<Ctx: ?Sized>(
    hooks: Vec<Rc<RefCell<dyn FnMut(&mut Ctx)>>>,
    ctx: &mut Ctx,
    stage: EffectStage,
) -> usize {
    let mut fired = 0;
    for hook in hooks {
        match hook.try_borrow_mut() {
            Ok(mut f) => {
                (&mut *f)(&mut *ctx);
                fired += 1;
            }
            Err(_) => tracing::warn!(stage = stage.as_str(), "effect hook re-entered, skipped"),
        }
    }
    fired
}

#[cfg(test)]
#[path = "../../tests/unit/effects/hooks.rs"]
mod tests;
