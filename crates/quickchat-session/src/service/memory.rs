//! In-memory chat service.
//!
//! A self-contained [`ChatService`] backend driven from the outside: tests
//! and demos connect a coordinator to it, then use the driver methods
//! ([`MemoryChatService::deliver`], [`MemoryChatService::raise_token_expiring`],
//! the `fail_*` switches) to play the role of the remote chat infrastructure.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use quickchat_core::{
    ChannelDescriptor, ChannelHandle, ChatClient, ChatEvent, ChatService, JoinStatus, ServiceError,
};
use tokio::sync::mpsc;

/// Failure switches for exercising error paths.
#[derive(Default)]
struct FailureModes {
    reject_tokens: bool,
    fail_lookup: bool,
    fail_create: bool,
    fail_join: bool,
}

struct Inner {
    channels: RwLock<HashMap<String, Arc<MemoryChannel>>>,
    failures: Mutex<FailureModes>,
    /// Event sender of the most recent live connection.
    events: Mutex<Option<mpsc::Sender<ChatEvent>>>,
    /// Tokens seen at connect and via `update_token`, in order.
    tokens: Mutex<Vec<String>>,
    /// Bodies sent through any channel, in order.
    sent: Mutex<Vec<String>>,
    join_calls: AtomicUsize,
    auto_synchronize: bool,
}

/// In-memory chat backend for tests and demos.
///
/// By default a connection synchronizes immediately; construct with
/// [`MemoryChatService::with_manual_sync`] to drive the synchronization
/// event explicitly.
#[derive(Clone)]
pub struct MemoryChatService {
    inner: Arc<Inner>,
}

impl Default for MemoryChatService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChatService {
    /// Service that synchronizes as soon as a client connects.
    #[must_use]
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Service that waits for [`MemoryChatService::complete_synchronization`].
    #[must_use]
    pub fn with_manual_sync() -> Self {
        Self::build(false)
    }

    fn build(auto_synchronize: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                channels: RwLock::new(HashMap::new()),
                failures: Mutex::new(FailureModes::default()),
                events: Mutex::new(None),
                tokens: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
                join_calls: AtomicUsize::new(0),
                auto_synchronize,
            }),
        }
    }

    /// Pre-create a channel with the given membership status.
    pub fn seed_channel(&self, descriptor: &ChannelDescriptor, status: JoinStatus) {
        let channel = Arc::new(MemoryChannel {
            descriptor: descriptor.clone(),
            joined: AtomicBool::new(status == JoinStatus::Joined),
            inner: Arc::clone(&self.inner),
        });
        self.inner
            .channels
            .write()
            .unwrap()
            .insert(descriptor.unique_name.clone(), channel);
    }

    /// Reject every token offered at connect or refresh.
    pub fn reject_tokens(&self) {
        self.inner.failures.lock().unwrap().reject_tokens = true;
    }

    /// Fail channel lookups.
    pub fn fail_lookup(&self) {
        self.inner.failures.lock().unwrap().fail_lookup = true;
    }

    /// Fail channel creation.
    pub fn fail_create(&self) {
        self.inner.failures.lock().unwrap().fail_create = true;
    }

    /// Fail channel joins.
    pub fn fail_join(&self) {
        self.inner.failures.lock().unwrap().fail_join = true;
    }

    /// Report synchronization completed to the live connection.
    pub async fn complete_synchronization(&self) {
        self.inner.push(ChatEvent::SynchronizationCompleted).await;
    }

    /// Deliver an inbound message to the live connection.
    pub async fn deliver(&self, author: impl Into<String>, body: impl Into<String>) {
        self.inner
            .push(ChatEvent::MessageAdded {
                author: author.into(),
                body: body.into(),
            })
            .await;
    }

    /// Warn the live connection that its token is about to expire.
    pub async fn raise_token_expiring(&self) {
        self.inner.push(ChatEvent::TokenExpiring).await;
    }

    /// Tokens seen so far (connect + refresh), in order.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.inner.tokens.lock().unwrap().clone()
    }

    /// Bodies sent through any channel, in order.
    #[must_use]
    pub fn sent_bodies(&self) -> Vec<String> {
        self.inner.sent.lock().unwrap().clone()
    }

    /// Number of join calls actually issued.
    #[must_use]
    pub fn join_calls(&self) -> usize {
        self.inner.join_calls.load(Ordering::SeqCst)
    }

    /// Whether a connection is currently live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.events.lock().unwrap().is_some()
    }
}

impl Inner {
    async fn push(&self, event: ChatEvent) {
        let sender = self.events.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }
}

#[async_trait]
impl ChatService for MemoryChatService {
    async fn connect(
        &self,
        token: &str,
        events: mpsc::Sender<ChatEvent>,
    ) -> Result<Arc<dyn ChatClient>, ServiceError> {
        if self.inner.failures.lock().unwrap().reject_tokens {
            return Err(ServiceError::AuthFailure);
        }

        self.inner.tokens.lock().unwrap().push(token.to_owned());
        *self.inner.events.lock().unwrap() = Some(events);

        if self.inner.auto_synchronize {
            self.inner.push(ChatEvent::SynchronizationCompleted).await;
        }

        Ok(Arc::new(MemoryClient {
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct MemoryClient {
    inner: Arc<Inner>,
}

#[async_trait]
impl ChatClient for MemoryClient {
    async fn channel_by_unique_name(
        &self,
        name: &str,
    ) -> Result<Option<Arc<dyn ChannelHandle>>, ServiceError> {
        if self.inner.failures.lock().unwrap().fail_lookup {
            return Err(ServiceError::ChannelLookup(name.to_owned()));
        }
        let channel = self.inner.channels.read().unwrap().get(name).cloned();
        Ok(channel.map(|c| c as Arc<dyn ChannelHandle>))
    }

    async fn create_channel(
        &self,
        descriptor: &ChannelDescriptor,
    ) -> Result<Arc<dyn ChannelHandle>, ServiceError> {
        if self.inner.failures.lock().unwrap().fail_create {
            return Err(ServiceError::ChannelCreate(descriptor.unique_name.clone()));
        }
        let channel = Arc::new(MemoryChannel {
            descriptor: descriptor.clone(),
            joined: AtomicBool::new(false),
            inner: Arc::clone(&self.inner),
        });
        self.inner
            .channels
            .write()
            .unwrap()
            .insert(descriptor.unique_name.clone(), Arc::clone(&channel));
        Ok(channel)
    }

    async fn update_token(&self, token: &str) -> Result<(), ServiceError> {
        if self.inner.failures.lock().unwrap().reject_tokens {
            return Err(ServiceError::AuthFailure);
        }
        self.inner.tokens.lock().unwrap().push(token.to_owned());
        Ok(())
    }

    async fn shutdown(&self) {
        // Dropping the sender stops event delivery.
        self.inner.events.lock().unwrap().take();
    }
}

struct MemoryChannel {
    descriptor: ChannelDescriptor,
    joined: AtomicBool,
    inner: Arc<Inner>,
}

#[async_trait]
impl ChannelHandle for MemoryChannel {
    fn unique_name(&self) -> String {
        self.descriptor.unique_name.clone()
    }

    fn friendly_name(&self) -> String {
        self.descriptor.friendly_name.clone()
    }

    fn join_status(&self) -> JoinStatus {
        if self.joined.load(Ordering::SeqCst) {
            JoinStatus::Joined
        } else {
            JoinStatus::NotJoined
        }
    }

    async fn join(&self) -> Result<(), ServiceError> {
        self.inner.join_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.failures.lock().unwrap().fail_join {
            return Err(ServiceError::Join(self.descriptor.unique_name.clone()));
        }
        self.joined.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, body: &str) -> Result<(), ServiceError> {
        if self.join_status() != JoinStatus::Joined {
            return Err(ServiceError::Send("not a channel member".to_owned()));
        }
        self.inner.sent.lock().unwrap().push(body.to_owned());
        Ok(())
    }
}
