//! Glue shared by every listener: attachment to a device and registration.

use std::sync::Arc;

use crate::device::{Device, InterceptorId};
use crate::error::InputError;
use crate::event::DeviceKind;
use crate::interceptor::Interceptor;
use crate::subscription::{Subscription, SubscriptionSet};

/// A listener's seat on a device. Dropping it detaches the interceptor and
/// gives up its hook interest.
pub(crate) struct Attachment {
    device: Arc<Device>,
    id: InterceptorId,
}

impl Attachment {
    pub fn new(device: Arc<Device>, expected: DeviceKind, interceptor: Arc<dyn Interceptor>) -> Self {
        if device.kind() != expected {
            log::warn!(
                "listener: {} attached to a {} device; it will never see its events",
                interceptor.name(),
                device.kind()
            );
        }
        let id = device.attach(interceptor);
        Self { device, id }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Adds `subscription` to `set`, then makes sure the hook is installed.
    ///
    /// The subscription goes in first so that a teardown racing with this
    /// call either sees it or is followed by the install below. If the
    /// install fails the subscription is taken back out.
    pub fn register<T, C: ?Sized>(
        &self,
        set: &SubscriptionSet<T, C>,
        subscription: Subscription<T, C>,
    ) -> Result<Arc<Subscription<T, C>>, InputError> {
        let subscription = Arc::new(subscription);
        set.push(subscription.clone());
        if let Err(e) = self.device.hook() {
            set.remove_id(subscription.id());
            return Err(e);
        }
        Ok(subscription)
    }

    /// Lets the device drop the hook if nobody needs it any more.
    pub fn release(&self) {
        self.device.release();
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.device.detach(self.id);
    }
}
