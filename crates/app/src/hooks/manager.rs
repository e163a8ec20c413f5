//! Ordered registration and dispatch of hook handlers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::{HookArgs, HookEvent};

/// Future returned by a hook handler, borrowing the handler and the map.
pub type HookFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Something that can react to a hook event.
///
/// Handlers cannot fail: problems are logged and the map is left untouched.
pub trait HookHandler: Send + Sync {
    fn call<'a>(&'a self, args: &'a mut HookArgs) -> HookFuture<'a>;
}

/// A handler bound to one method of a shared object.
pub struct Method<H> {
    target: Arc<H>,
    method: for<'a> fn(&'a H, &'a mut HookArgs) -> HookFuture<'a>,
}

impl<H> Method<H> {
    pub fn new(target: Arc<H>, method: for<'a> fn(&'a H, &'a mut HookArgs) -> HookFuture<'a>) -> Self {
        Self { target, method }
    }
}

impl<H: Send + Sync> HookHandler for Method<H> {
    fn call<'a>(&'a self, args: &'a mut HookArgs) -> HookFuture<'a> {
        (self.method)(&self.target, args)
    }
}

struct Registration {
    event: HookEvent,
    name: String,
    handler: Arc<dyn HookHandler>,
}

/// Holds every registered handler, in registration order.
#[derive(Default)]
pub struct HookManager {
    registrations: Vec<Registration>,
}

impl HookManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `event`. Handlers run in the order they were added.
    pub fn register(
        &mut self,
        event: HookEvent,
        name: impl Into<String>,
        handler: impl HookHandler + 'static,
    ) {
        let name = name.into();
        tracing::debug!(%event, hook = %name, "hook registered");
        self.registrations.push(Registration {
            event,
            name,
            handler: Arc::new(handler),
        });
    }

    /// Names of the handlers registered for `event`, in call order.
    #[must_use]
    pub fn handlers(&self, event: HookEvent) -> Vec<&str> {
        self.registrations
            .iter()
            .filter(|reg| reg.event == event)
            .map(|reg| reg.name.as_str())
            .collect()
    }

    /// Run every handler registered for `event` against `args`.
    pub async fn process_event(&self, event: HookEvent, args: &mut HookArgs) {
        for reg in self.registrations.iter().filter(|reg| reg.event == event) {
            tracing::trace!(%event, hook = %reg.name, "running hook");
            reg.handler.call(args).await;
        }
    }
}

impl std::fmt::Debug for HookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.registrations.iter().map(|reg| (reg.event, &reg.name)))
            .finish()
    }
}
