//! Mouse listener: button, move and wheel events.

use std::sync::Arc;
use std::time::Duration;

use crate::device::{Device, Registry};
use crate::error::InputError;
use crate::event::{Coordinates, DeviceKind, MouseEvent, MouseInput, RawEvent};
use crate::interceptor::{Interceptor, InterceptorKind, InterceptorResponse};
use crate::listener::Attachment;
use crate::subscription::{Subscription, SubscriptionId, SubscriptionSet};

pub type MouseCallback = dyn Fn() + Send + Sync;

pub type MouseSubscription = Subscription<MouseEvent, MouseCallback>;

struct MouseCore {
    subscriptions: SubscriptionSet<MouseEvent, MouseCallback>,
}

impl MouseCore {
    fn dispatch(&self, input: MouseInput) {
        for subscription in self.subscriptions.matching(|event| *event == input.event) {
            if !subscription.try_claim(input.timestamp) {
                continue;
            }
            if subscription.is_single_use() {
                self.subscriptions.remove_id(subscription.id());
            }
            (subscription.callback())();
        }
    }
}

impl Interceptor for MouseCore {
    fn name(&self) -> &'static str {
        "mouse listener"
    }

    fn on_input(self: Arc<Self>, event: &RawEvent) -> InterceptorResponse {
        let RawEvent::Mouse(input) = *event else {
            return InterceptorResponse::ignore(InterceptorKind::Listener);
        };
        InterceptorResponse::handle(InterceptorKind::Listener, move || self.dispatch(input))
    }

    fn unhook_requested(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

/// Registers callbacks for mouse events on the shared mouse hook.
pub struct MouseListener {
    core: Arc<MouseCore>,
    attachment: Attachment,
}

impl MouseListener {
    /// Listener on the process-wide mouse hook.
    pub fn new() -> Self {
        Self::with_device(Registry::global().mouse().clone())
    }

    pub fn with_device(device: Arc<Device>) -> Self {
        let core = Arc::new(MouseCore {
            subscriptions: SubscriptionSet::new(),
        });
        let attachment = Attachment::new(device, DeviceKind::Mouse, core.clone());
        Self { core, attachment }
    }

    /// Pointer position as reported by the mouse backend.
    pub fn position(&self) -> Result<Coordinates, InputError> {
        self.attachment.device().position()
    }

    pub fn subscribe(
        &self,
        event: MouseEvent,
        callback: impl Fn() + Send + Sync + 'static,
        interval: Option<Duration>,
    ) -> Result<Arc<MouseSubscription>, InputError> {
        self.add(event, Arc::new(callback), interval.unwrap_or_default(), false)
    }

    pub fn subscribe_once(
        &self,
        event: MouseEvent,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Result<Arc<MouseSubscription>, InputError> {
        self.add(event, Arc::new(callback), Duration::ZERO, true)
    }

    /// Removes every subscription for `event`.
    pub fn unsubscribe(&self, event: MouseEvent) {
        if self.core.subscriptions.remove_where(|e| *e == event) > 0 {
            self.attachment.release();
        }
    }

    pub fn unsubscribe_id(&self, id: SubscriptionId) {
        if self.core.subscriptions.remove_id(id) {
            self.attachment.release();
        }
    }

    pub fn unsubscribe_all(&self) {
        if self.core.subscriptions.clear() > 0 {
            self.attachment.release();
        }
    }

    pub fn unsubscribe_all_of(&self, events: impl IntoIterator<Item = MouseEvent>) {
        let events: Vec<MouseEvent> = events.into_iter().collect();
        if events.is_empty() {
            return;
        }
        if self.core.subscriptions.remove_where(|e| events.contains(e)) > 0 {
            self.attachment.release();
        }
    }

    pub fn is_listening(&self) -> bool {
        !self.core.subscriptions.is_empty()
    }

    pub fn subscriptions(&self) -> Vec<Arc<MouseSubscription>> {
        self.core.subscriptions.snapshot()
    }

    /// Tears the listener down now instead of at the end of its scope.
    pub fn dispose(self) {}

    fn add(
        &self,
        event: MouseEvent,
        callback: Arc<MouseCallback>,
        interval: Duration,
        single_use: bool,
    ) -> Result<Arc<MouseSubscription>, InputError> {
        let subscription = self.attachment.register(
            &self.core.subscriptions,
            Subscription::new(event, callback, interval, single_use),
        )?;
        log::debug!("mouse: subscribed {} to {:?}", subscription.id(), event);
        Ok(subscription)
    }
}

impl Default for MouseListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MouseListener {
    fn drop(&mut self) {
        self.core.subscriptions.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
