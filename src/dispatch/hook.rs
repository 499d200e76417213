//! Before/after delivery bracketing around each handler call.

use crate::dispatch::descriptor::HandlerDescriptor;

/// Scoped resource acquired around every handler invocation.
///
/// `after_delivery` runs once for every `before_delivery`, whether the
/// hook itself, parameter binding or the handler fails.
pub trait DeliveryHook: Send + Sync {
    /// Called before parameters are bound. An error skips the handler.
    fn before_delivery(&self, descriptor: &HandlerDescriptor) -> anyhow::Result<()>;

    /// Called after the handler returns or fails.
    fn after_delivery(&self, descriptor: &HandlerDescriptor);
}

/// Hook that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl DeliveryHook for NoopHook {
    fn before_delivery(&self, _descriptor: &HandlerDescriptor) -> anyhow::Result<()> {
        Ok(())
    }

    fn after_delivery(&self, _descriptor: &HandlerDescriptor) {}
}

/// Calls `after_delivery` when dropped.
pub(crate) struct DeliveryGuard<'a> {
    hook: &'a dyn DeliveryHook,
    descriptor: &'a HandlerDescriptor,
}

impl<'a> DeliveryGuard<'a> {
    /// Run `before_delivery` and arm the guard regardless of its outcome.
    pub fn enter(
        hook: &'a dyn DeliveryHook,
        descriptor: &'a HandlerDescriptor,
    ) -> (Self, anyhow::Result<()>) {
        let guard = Self { hook, descriptor };
        let before = hook.before_delivery(descriptor);
        (guard, before)
    }
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.hook.after_delivery(self.descriptor);
    }
}
