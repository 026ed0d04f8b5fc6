//! Host side composition of notification providers.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use log::info;

use crate::{DriverNotification, NotificationProvider, ProgressSource};

/// Attaches a set of providers to one progress source and merges their output.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use driver_notification::{NotificationHub, ProgressFeed, SlowTrafficProvider};
///
/// let hub = NotificationHub::new().with_provider(Arc::new(SlowTrafficProvider::default()));
/// let feed: Arc<ProgressFeed> = Arc::new(ProgressFeed::new());
///
/// hub.attach(feed.clone());
/// let _notifications = hub.observe();
/// hub.detach(&*feed);
/// assert_eq!(hub.provider_count(), 1);
/// ```
#[derive(Default)]
pub struct NotificationHub {
    providers: Vec<Arc<dyn NotificationProvider>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn NotificationProvider>) -> Self {
        self.add_provider(provider);
        self
    }

    pub fn add_provider(&mut self, provider: Arc<dyn NotificationProvider>) {
        self.providers.push(provider);
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Attach every provider to `source`.
    pub fn attach(&self, source: Arc<dyn ProgressSource>) {
        info!("[NotificationHub] Attaching {} providers", self.providers.len());
        for provider in &self.providers {
            provider.on_attached(Arc::clone(&source));
        }
    }

    /// Detach every provider from `source`.
    pub fn detach(&self, source: &dyn ProgressSource) {
        info!("[NotificationHub] Detaching {} providers", self.providers.len());
        for provider in &self.providers {
            provider.on_detached(source);
        }
    }

    /// Merged notifications of all providers.
    ///
    /// Each provider's notifications keep their order; notifications of
    /// different providers interleave as they arrive. The stream ends once
    /// every provider's stream has ended.
    pub fn observe(&self) -> BoxStream<'static, DriverNotification> {
        stream::select_all(
            self.providers
                .iter()
                .map(|provider| provider.track_notifications()),
        )
        .boxed()
    }
}
