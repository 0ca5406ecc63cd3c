//! In-process ICN channel.
//!
//! Interests are injected by the owner and everything the gateway sends is
//! recorded, which makes the channel a stand-in for the daemon when running
//! the bridge without one.

use async_trait::async_trait;
use bytes::Bytes;
use icn_gateway_common::{Error, Result};
use log::debug;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use crate::channel::{IcnChannel, IcnInterest, PublishOptions};

/// A content object accepted by [`LoopbackIcnChannel::publish`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedObject {
    pub name: String,
    pub payload: Bytes,
    pub options: PublishOptions,
}

/// ICN channel that stays inside the process
pub struct LoopbackIcnChannel {
    injector: mpsc::UnboundedSender<IcnInterest>,
    inbox: Mutex<mpsc::UnboundedReceiver<IcnInterest>>,
    published: Mutex<Vec<PublishedObject>>,
    expressed: Mutex<Vec<String>>,
    registered: Mutex<BTreeSet<String>>,
    fail_publish: AtomicBool,
    closed: AtomicBool,
}

impl Default for LoopbackIcnChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackIcnChannel {
    pub fn new() -> Self {
        let (injector, inbox) = mpsc::unbounded_channel();
        Self {
            injector,
            inbox: Mutex::new(inbox),
            published: Mutex::new(Vec::new()),
            expressed: Mutex::new(Vec::new()),
            registered: Mutex::new(BTreeSet::new()),
            fail_publish: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue an Interest for the next `receive_interest` call
    pub fn inject_interest(&self, interest: IcnInterest) {
        // The receiver lives as long as self
        let _ = self.injector.send(interest);
    }

    /// Make subsequent publishes fail (or succeed again)
    pub fn set_publish_failure(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::Release);
    }

    /// Objects published so far, oldest first
    pub async fn published(&self) -> Vec<PublishedObject> {
        self.published.lock().await.clone()
    }

    /// Names of Interests expressed so far
    pub async fn expressed_interests(&self) -> Vec<String> {
        self.expressed.lock().await.clone()
    }

    /// Names currently registered
    pub async fn registered_names(&self) -> Vec<String> {
        self.registered.lock().await.iter().cloned().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Channel("loopback channel is closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl IcnChannel for LoopbackIcnChannel {
    async fn publish(&self, name: &str, payload: &[u8], options: &PublishOptions) -> Result<()> {
        self.ensure_open()?;
        if self.fail_publish.load(Ordering::Acquire) {
            return Err(Error::Channel(format!("publish of {} rejected", name)));
        }

        self.published.lock().await.push(PublishedObject {
            name: name.to_string(),
            payload: Bytes::copy_from_slice(payload),
            options: options.clone(),
        });
        Ok(())
    }

    async fn send_interest(&self, name: &str, _lifetime: Duration) -> Result<()> {
        self.ensure_open()?;
        self.expressed.lock().await.push(name.to_string());
        Ok(())
    }

    async fn receive_interest(&self, timeout: Duration) -> Result<Option<IcnInterest>> {
        self.ensure_open()?;

        let mut inbox = self.inbox.lock().await;
        match tokio::time::timeout(timeout, inbox.recv()).await {
            Ok(Some(interest)) => Ok(Some(interest)),
            Ok(None) => Err(Error::Channel("loopback injector dropped".into())),
            Err(_) => Ok(None),
        }
    }

    async fn register_name(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.registered.lock().await.insert(name.to_string());
        Ok(())
    }

    async fn deregister_name(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.registered.lock().await.remove(name);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        debug!("Loopback ICN channel closed");
        Ok(())
    }
}
