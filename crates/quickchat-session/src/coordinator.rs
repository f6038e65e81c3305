//! Chat session coordinator.
//!
//! Owns the lifecycle of one chat session scoped to exactly one named
//! channel: fetch an access token, bring up the chat client, resolve and
//! join the channel, forward sends, and fan in pushed events. All mutable
//! state lives on a single event-loop task; public methods are messages to
//! that task, and listener callbacks fire only from it, strictly after the
//! message store reflects the change they describe.

use std::sync::Arc;

use quickchat_core::{
    ChannelHandle, ChatClient, ChatEvent, ChatService, Credentials, JoinStatus, MessageStore,
    ServiceError, SessionListener,
};
use quickchat_token::{TokenError, TokenFetcher};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use crate::SessionConfig;

/// Buffer for events pushed by the chat service.
const EVENT_BUFFER: usize = 256;

/// Coordinator error.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("token fetch failed: {0}")]
    TokenFetch(#[from] TokenError),
    #[error("chat service rejected the token")]
    AuthFailure,
    #[error("channel could not be resolved or joined")]
    ChannelUnavailable,
    #[error("session is not ready")]
    NotReady,
    #[error("a session is already active")]
    AlreadyLoggedIn,
    #[error("session was shut down")]
    ShutDown,
    #[error("chat service error: {0}")]
    Service(ServiceError),
}

/// Externally observable lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session; `login` is accepted.
    LoggedOut,
    /// Token fetch and client bring-up in flight.
    LoggingIn,
    /// Client connected, waiting for server-side synchronization.
    AwaitingSync,
    /// Looking up or creating the configured channel.
    EnsuringChannel,
    /// Establishing channel membership.
    Joining,
    /// Logged in and joined; sends are accepted.
    Ready,
    /// Channel lookup, creation, or join failed. Terminal until `shutdown`.
    ChannelUnavailable,
}

enum Command {
    Login {
        identity: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Send {
        body: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Completions fed back into the event loop by spawned tasks. Each carries
/// the login generation it belongs to; stale generations are discarded.
enum Internal {
    Connected {
        generation: u64,
        result: Result<(Credentials, Arc<dyn ChatClient>), SessionError>,
    },
    Event {
        generation: u64,
        event: ChatEvent,
    },
    TokenRefreshed {
        generation: u64,
        result: Result<Credentials, TokenError>,
    },
}

/// Coordinator for one chat session on one named channel.
///
/// Cheap to clone; all clones address the same session. The event-loop task
/// shuts the session down when the last clone is dropped.
#[derive(Clone)]
pub struct ChatSessionCoordinator {
    cmd_tx: mpsc::UnboundedSender<Command>,
    phase_rx: watch::Receiver<Phase>,
    store: Arc<MessageStore>,
}

impl ChatSessionCoordinator {
    /// Spawn a coordinator over the given chat service.
    ///
    /// The listener stays attached until `shutdown`; its callbacks are
    /// invoked from the coordinator's event-loop task only.
    #[must_use]
    pub fn new(
        config: SessionConfig,
        service: Arc<dyn ChatService>,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(Phase::LoggedOut);
        let store = Arc::new(MessageStore::new());

        let event_loop = EventLoop {
            fetcher: TokenFetcher::new(config.token_url.clone()),
            config,
            service,
            listener,
            store: Arc::clone(&store),
            phase_tx,
            internal_tx,
            generation: 0,
            credentials: None,
            client: None,
            channel: None,
            pending_login: None,
        };
        tokio::spawn(event_loop.run(cmd_rx, internal_rx));

        Self {
            cmd_tx,
            phase_rx,
            store,
        }
    }

    /// Log in with a caller-chosen identity.
    ///
    /// Resolves exactly once: `Ok(())` when the session reaches
    /// [`Phase::Ready`], or the first error on the way there.
    ///
    /// # Errors
    /// [`SessionError::AlreadyLoggedIn`] unless currently logged out;
    /// otherwise the token fetch, authentication, or channel failure.
    pub async fn login(&self, identity: &str) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Login {
                identity: identity.to_owned(),
                reply,
            })
            .map_err(|_| SessionError::ShutDown)?;
        rx.await.map_err(|_| SessionError::ShutDown)?
    }

    /// Send a message body to the session's channel.
    ///
    /// # Errors
    /// [`SessionError::NotReady`] unless the session is [`Phase::Ready`];
    /// otherwise the service-side send failure.
    pub async fn send_message(&self, body: &str) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Send {
                body: body.to_owned(),
                reply,
            })
            .map_err(|_| SessionError::ShutDown)?;
        rx.await.map_err(|_| SessionError::ShutDown)?
    }

    /// Tear the session down and return to [`Phase::LoggedOut`].
    ///
    /// Idempotent, and a no-op if never logged in. An in-flight `login`
    /// resolves with [`SessionError::ShutDown`]; its late bring-up result is
    /// discarded.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Shutdown { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase_rx.borrow()
    }

    /// Watch phase transitions.
    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase_rx.clone()
    }

    /// The session's message store.
    #[must_use]
    pub fn messages(&self) -> Arc<MessageStore> {
        Arc::clone(&self.store)
    }
}

struct EventLoop {
    config: SessionConfig,
    fetcher: TokenFetcher,
    service: Arc<dyn ChatService>,
    listener: Arc<dyn SessionListener>,
    store: Arc<MessageStore>,
    phase_tx: watch::Sender<Phase>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    /// Bumped on shutdown so late completions from spawned tasks are stale.
    generation: u64,
    credentials: Option<Credentials>,
    client: Option<Arc<dyn ChatClient>>,
    channel: Option<Arc<dyn ChannelHandle>>,
    pending_login: Option<oneshot::Sender<Result<(), SessionError>>>,
}

impl EventLoop {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    // Last handle dropped; tear down and stop.
                    None => break,
                },
                internal = internal_rx.recv() => {
                    if let Some(internal) = internal {
                        self.handle_internal(internal).await;
                    }
                },
            }
        }
        self.teardown();
    }

    fn phase(&self) -> Phase {
        *self.phase_tx.borrow()
    }

    fn set_phase(&self, phase: Phase) {
        tracing::debug!(?phase, "phase transition");
        let _ = self.phase_tx.send(phase);
    }

    fn complete_login(&mut self, result: Result<(), SessionError>) {
        if let Some(reply) = self.pending_login.take() {
            let _ = reply.send(result);
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Login { identity, reply } => self.on_login(identity, reply),
            Command::Send { body, reply } => self.on_send(body, reply),
            Command::Shutdown { reply } => {
                self.teardown();
                let _ = reply.send(());
            }
        }
    }

    fn on_login(&mut self, identity: String, reply: oneshot::Sender<Result<(), SessionError>>) {
        if self.phase() != Phase::LoggedOut {
            let _ = reply.send(Err(SessionError::AlreadyLoggedIn));
            return;
        }

        self.set_phase(Phase::LoggingIn);
        self.pending_login = Some(reply);

        let generation = self.generation;
        let fetcher = self.fetcher.clone();
        let service = Arc::clone(&self.service);
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            match bring_up(&fetcher, service.as_ref(), &identity).await {
                Ok((credentials, client, mut event_rx)) => {
                    let _ = internal_tx.send(Internal::Connected {
                        generation,
                        result: Ok((credentials, client)),
                    });
                    // Marshal pushed events onto the loop, after the
                    // connected notification. The forwarding stops with the
                    // event sender (client shutdown) or the loop itself.
                    while let Some(event) = event_rx.recv().await {
                        if internal_tx
                            .send(Internal::Event { generation, event })
                            .is_err()
                        {
                            break;
                        }
                    }
                }
                Err(err) => {
                    let _ = internal_tx.send(Internal::Connected {
                        generation,
                        result: Err(err),
                    });
                }
            }
        });
    }

    fn on_send(&self, body: String, reply: oneshot::Sender<Result<(), SessionError>>) {
        let channel = match (self.phase(), &self.channel) {
            (Phase::Ready, Some(channel)) => Arc::clone(channel),
            _ => {
                let _ = reply.send(Err(SessionError::NotReady));
                return;
            }
        };

        // Forward off the loop so a slow send never stalls event delivery.
        tokio::spawn(async move {
            let result = channel.send(&body).await.map_err(SessionError::Service);
            let _ = reply.send(result);
        });
    }

    async fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::Connected { generation, result } => {
                if generation != self.generation {
                    // A shutdown raced the bring-up; detach the stray client.
                    if let Ok((_, client)) = result {
                        tokio::spawn(async move { client.shutdown().await });
                    }
                    return;
                }
                match result {
                    Ok((credentials, client)) => {
                        self.credentials = Some(credentials);
                        self.client = Some(client);
                        self.set_phase(Phase::AwaitingSync);
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "login failed");
                        self.set_phase(Phase::LoggedOut);
                        self.complete_login(Err(err));
                    }
                }
            }
            Internal::Event { generation, event } => {
                if generation == self.generation {
                    self.handle_event(event).await;
                }
            }
            Internal::TokenRefreshed { generation, result } => {
                if generation == self.generation {
                    self.on_token_refreshed(result).await;
                }
            }
        }
    }

    async fn handle_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::SynchronizationCompleted => {
                if self.phase() == Phase::AwaitingSync {
                    self.ensure_channel().await;
                } else {
                    tracing::warn!(phase = ?self.phase(), "unexpected synchronization event");
                }
            }
            ChatEvent::MessageAdded { author, body } => self.on_message_added(author, body),
            ChatEvent::TokenExpiring => self.on_token_expiring(),
        }
    }

    /// Look up the configured channel, creating it if absent, then join.
    async fn ensure_channel(&mut self) {
        let Some(client) = self.client.clone() else {
            return;
        };
        self.set_phase(Phase::EnsuringChannel);

        let descriptor = self.config.channel.clone();
        let channel = match client.channel_by_unique_name(&descriptor.unique_name).await {
            Ok(Some(channel)) => channel,
            Ok(None) => {
                tracing::info!(channel = %descriptor.unique_name, "channel absent, creating");
                match client.create_channel(&descriptor).await {
                    Ok(channel) => channel,
                    Err(err) => return self.channel_unavailable(&err),
                }
            }
            Err(err) => return self.channel_unavailable(&err),
        };

        self.channel = Some(Arc::clone(&channel));
        self.set_phase(Phase::Joining);

        if channel.join_status() == JoinStatus::Joined {
            tracing::debug!(channel = %descriptor.unique_name, "already a member, skipping join");
        } else if let Err(err) = channel.join().await {
            return self.channel_unavailable(&err);
        }

        self.set_phase(Phase::Ready);
        self.complete_login(Ok(()));
    }

    fn channel_unavailable(&mut self, err: &ServiceError) {
        tracing::error!(error = %err, "channel unavailable");
        self.channel = None;
        self.set_phase(Phase::ChannelUnavailable);
        self.complete_login(Err(SessionError::ChannelUnavailable));
    }

    fn on_message_added(&self, author: String, body: String) {
        let message = self.store.append(author, body);
        self.listener.on_messages_changed();
        self.listener.on_new_message(&message);
    }

    fn on_token_expiring(&self) {
        let Some(credentials) = &self.credentials else {
            return;
        };
        tracing::info!("token expiring, refreshing");

        let identity = credentials.identity.clone();
        let generation = self.generation;
        let fetcher = self.fetcher.clone();
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch_for_identity(&identity).await;
            let _ = internal_tx.send(Internal::TokenRefreshed { generation, result });
        });
    }

    async fn on_token_refreshed(&mut self, result: Result<Credentials, TokenError>) {
        let refreshed = match result {
            Ok(credentials) => credentials,
            Err(err) => {
                // The session keeps running on the old token until the
                // service drops it; surface the failure in the logs only.
                tracing::warn!(error = %err, "token refresh failed");
                return;
            }
        };

        if let Some(client) = &self.client {
            if let Err(err) = client.update_token(&refreshed.token).await {
                tracing::warn!(error = %err, "token update rejected");
                return;
            }
        }
        self.credentials = Some(refreshed);
    }

    /// Drop the session and return to `LoggedOut`. Safe to call repeatedly
    /// or before any login.
    fn teardown(&mut self) {
        self.generation += 1;
        self.complete_login(Err(SessionError::ShutDown));
        if let Some(client) = self.client.take() {
            tokio::spawn(async move { client.shutdown().await });
        }
        self.channel = None;
        self.credentials = None;
        self.set_phase(Phase::LoggedOut);
    }
}

/// Fetch credentials and connect the chat client. The returned receiver
/// carries events pushed by the service for this connection.
async fn bring_up(
    fetcher: &TokenFetcher,
    service: &dyn ChatService,
    identity: &str,
) -> Result<(Credentials, Arc<dyn ChatClient>, mpsc::Receiver<ChatEvent>), SessionError> {
    let credentials = fetcher.fetch_for_identity(identity).await?;

    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
    let client = service
        .connect(&credentials.token, event_tx)
        .await
        .map_err(|err| match err {
            ServiceError::AuthFailure => SessionError::AuthFailure,
            other => SessionError::Service(other),
        })?;

    Ok((credentials, client, event_rx))
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use axum::{Json, Router, routing::get};
    use quickchat_core::{ChannelDescriptor, Message};
    use quickchat_token::TokenUrl;
    use serde_json::json;
    use tokio::time::{sleep, timeout};

    use crate::MemoryChatService;

    use super::*;

    #[derive(Default)]
    struct RecordingListener {
        changed: AtomicUsize,
        messages: Mutex<Vec<Message>>,
    }

    impl SessionListener for RecordingListener {
        fn on_messages_changed(&self) {
            self.changed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_new_message(&self, message: &Message) {
            self.messages.lock().unwrap().push(message.clone());
        }
    }

    async fn serve(app: Router) -> TokenUrl {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        TokenUrl::parse(&format!("http://{addr}/token")).unwrap()
    }

    /// Token endpoint issuing tok-1, tok-2, ... per request.
    fn counting_token_app() -> Router {
        let counter = Arc::new(AtomicUsize::new(0));
        Router::new().route(
            "/token",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Json(json!({ "token": format!("tok-{n}") }))
                }
            }),
        )
    }

    fn slow_token_app(delay: Duration) -> Router {
        Router::new().route(
            "/token",
            get(move || async move {
                sleep(delay).await;
                Json(json!({ "token": "tok-slow" }))
            }),
        )
    }

    async fn coordinator_with(
        service: &MemoryChatService,
        app: Router,
    ) -> (ChatSessionCoordinator, Arc<RecordingListener>) {
        let token_url = serve(app).await;
        let listener = Arc::new(RecordingListener::default());
        let coordinator = ChatSessionCoordinator::new(
            SessionConfig::new(token_url),
            Arc::new(service.clone()),
            listener.clone(),
        );
        (coordinator, listener)
    }

    async fn wait_for_phase(coordinator: &ChatSessionCoordinator, phase: Phase) {
        let mut rx = coordinator.watch_phase();
        timeout(Duration::from_secs(5), rx.wait_for(|p| *p == phase))
            .await
            .expect("timed out waiting for phase")
            .expect("event loop gone");
    }

    async fn eventually(mut condition: impl FnMut() -> bool) {
        timeout(Duration::from_secs(5), async {
            while !condition() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }

    #[tokio::test]
    async fn test_login_creates_and_joins_missing_channel() {
        let service = MemoryChatService::new();
        let (coordinator, _) = coordinator_with(&service, counting_token_app()).await;

        coordinator.login("alice").await.unwrap();

        assert_eq!(coordinator.phase(), Phase::Ready);
        assert_eq!(service.tokens(), vec!["tok-1"]);
        assert_eq!(service.join_calls(), 1);
    }

    #[tokio::test]
    async fn test_login_with_malformed_token_body() {
        let service = MemoryChatService::new();
        let app = Router::new().route("/token", get(|| async { Json(json!("not an object")) }));
        let (coordinator, _) = coordinator_with(&service, app).await;

        let err = coordinator.login("alice").await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::TokenFetch(TokenError::MalformedResponse)
        ));
        assert_eq!(coordinator.phase(), Phase::LoggedOut);
        assert!(service.tokens().is_empty());
    }

    #[tokio::test]
    async fn test_join_skipped_when_already_member() {
        let service = MemoryChatService::new();
        service.seed_channel(
            &ChannelDescriptor::public("general", "General Chat Channel"),
            JoinStatus::Joined,
        );
        let (coordinator, _) = coordinator_with(&service, counting_token_app()).await;

        coordinator.login("alice").await.unwrap();

        assert_eq!(coordinator.phase(), Phase::Ready);
        assert_eq!(service.join_calls(), 0);
    }

    #[tokio::test]
    async fn test_message_delivery_order_and_notifications() {
        let service = MemoryChatService::new();
        let (coordinator, listener) = coordinator_with(&service, counting_token_app()).await;
        coordinator.login("alice").await.unwrap();

        for i in 0..3 {
            service.deliver("bob", format!("msg {i}")).await;
        }
        eventually(|| listener.messages.lock().unwrap().len() == 3).await;

        let store = coordinator.messages();
        assert_eq!(store.count(), 3);
        for i in 0..3 {
            let message = store.at(i).unwrap();
            assert_eq!(message.body, format!("msg {i}"));
            assert_eq!(message.sequence_index, i as u64);
        }
        assert_eq!(listener.changed.load(Ordering::SeqCst), 3);

        // The store already counted each message when its callback ran.
        let observed = listener.messages.lock().unwrap();
        assert_eq!(observed.last().unwrap().body, "msg 2");
    }

    #[tokio::test]
    async fn test_send_forwards_to_channel() {
        let service = MemoryChatService::new();
        let (coordinator, _) = coordinator_with(&service, counting_token_app()).await;
        coordinator.login("alice").await.unwrap();

        coordinator.send_message("hello there").await.unwrap();

        assert_eq!(service.sent_bodies(), vec!["hello there"]);
    }

    #[tokio::test]
    async fn test_send_while_logging_in_is_not_ready() {
        let service = MemoryChatService::new();
        let (coordinator, _) =
            coordinator_with(&service, slow_token_app(Duration::from_millis(200))).await;

        let login = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.login("alice").await })
        };
        wait_for_phase(&coordinator, Phase::LoggingIn).await;

        let err = coordinator.send_message("too early").await.unwrap_err();
        assert!(matches!(err, SessionError::NotReady));

        login.await.unwrap().unwrap();
        assert_eq!(coordinator.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_safe_without_login() {
        let service = MemoryChatService::new();
        let (coordinator, _) = coordinator_with(&service, counting_token_app()).await;

        coordinator.shutdown().await;
        coordinator.shutdown().await;

        assert_eq!(coordinator.phase(), Phase::LoggedOut);
    }

    #[tokio::test]
    async fn test_create_failure_surfaces_channel_unavailable() {
        let service = MemoryChatService::new();
        service.fail_create();
        let (coordinator, _) = coordinator_with(&service, counting_token_app()).await;

        let err = coordinator.login("alice").await.unwrap_err();

        assert!(matches!(err, SessionError::ChannelUnavailable));
        assert_eq!(coordinator.phase(), Phase::ChannelUnavailable);
        assert!(matches!(
            coordinator.send_message("nope").await.unwrap_err(),
            SessionError::NotReady
        ));
    }

    #[tokio::test]
    async fn test_lookup_failure_surfaces_channel_unavailable() {
        let service = MemoryChatService::new();
        service.fail_lookup();
        let (coordinator, _) = coordinator_with(&service, counting_token_app()).await;

        let err = coordinator.login("alice").await.unwrap_err();

        assert!(matches!(err, SessionError::ChannelUnavailable));
        assert_eq!(coordinator.phase(), Phase::ChannelUnavailable);
    }

    #[tokio::test]
    async fn test_join_failure_surfaces_channel_unavailable() {
        let service = MemoryChatService::new();
        service.seed_channel(
            &ChannelDescriptor::public("general", "General Chat Channel"),
            JoinStatus::NotJoined,
        );
        service.fail_join();
        let (coordinator, _) = coordinator_with(&service, counting_token_app()).await;

        let err = coordinator.login("alice").await.unwrap_err();

        assert!(matches!(err, SessionError::ChannelUnavailable));
        assert_eq!(coordinator.phase(), Phase::ChannelUnavailable);
    }

    #[tokio::test]
    async fn test_rejected_token_fails_login() {
        let service = MemoryChatService::new();
        service.reject_tokens();
        let (coordinator, _) = coordinator_with(&service, counting_token_app()).await;

        let err = coordinator.login("alice").await.unwrap_err();

        assert!(matches!(err, SessionError::AuthFailure));
        assert_eq!(coordinator.phase(), Phase::LoggedOut);
    }

    #[tokio::test]
    async fn test_second_login_rejected_while_active() {
        let service = MemoryChatService::new();
        let (coordinator, _) = coordinator_with(&service, counting_token_app()).await;
        coordinator.login("alice").await.unwrap();

        let err = coordinator.login("alice").await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyLoggedIn));
    }

    #[tokio::test]
    async fn test_token_refresh_passes_new_token_to_client() {
        let service = MemoryChatService::new();
        let (coordinator, _) = coordinator_with(&service, counting_token_app()).await;
        coordinator.login("alice").await.unwrap();

        service.raise_token_expiring().await;

        eventually(|| service.tokens() == vec!["tok-1", "tok-2"]).await;
        assert_eq!(coordinator.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn test_shutdown_during_login_discards_late_connect() {
        let service = MemoryChatService::new();
        let (coordinator, _) =
            coordinator_with(&service, slow_token_app(Duration::from_millis(100))).await;

        let login = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.login("alice").await })
        };
        wait_for_phase(&coordinator, Phase::LoggingIn).await;

        coordinator.shutdown().await;
        let err = login.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::ShutDown));

        // Past the token delay: the stray client must be detached, not live.
        sleep(Duration::from_millis(200)).await;
        assert_eq!(coordinator.phase(), Phase::LoggedOut);
        eventually(|| !service.is_connected()).await;
    }

    #[tokio::test]
    async fn test_manual_synchronization_gates_readiness() {
        let service = MemoryChatService::with_manual_sync();
        let (coordinator, _) = coordinator_with(&service, counting_token_app()).await;

        let login = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.login("alice").await })
        };
        wait_for_phase(&coordinator, Phase::AwaitingSync).await;

        assert!(matches!(
            coordinator.send_message("early").await.unwrap_err(),
            SessionError::NotReady
        ));

        service.complete_synchronization().await;
        login.await.unwrap().unwrap();
        assert_eq!(coordinator.phase(), Phase::Ready);
    }
}
