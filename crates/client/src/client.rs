//! Client facade.
//!
//! A [`Client`] owns one network engine, one subscribe actor, one
//! heartbeat manager and one listener registry.  REST operations live in
//! [`crate::operations`] as further `impl Client` blocks.

use std::sync::Arc;

use pn_crypto::CryptoModule;
use pn_domain::config::{Config, ConfigSeverity, CryptoConfig};
use pn_domain::error::{Error, Result};
use pn_domain::{Cursor, OperationType};
use pn_transport::Transport;
use tokio::sync::{mpsc, oneshot, watch};

use crate::heartbeat::HeartbeatManager;
use crate::listener::{ChannelListener, ClientEvent, EventListener, ListenerId, ListenerRegistry};
use crate::network::NetworkEngine;
use crate::parser::ParsedData;
use crate::persistence::{
    resolve_cipher_key, sequence_key, KeyringStore, PublishSequence, SecureStore,
};
use crate::status::Status;
use crate::subscribe::{self, Ack, Command, SubscribeRequest, SubscribeState};
use crate::subscription::SharedSubscription;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Builder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Builder for [`Client`].
///
/// # Example
///
/// ```rust,no_run
/// # async fn run() -> pn_domain::Result<()> {
/// use pn_client::{ClientBuilder, SubscribeRequest};
/// use pn_domain::config::Config;
///
/// let client = ClientBuilder::new(Config::with_keys("sub-c-demo", "alice")).build()?;
/// client
///     .subscribe(SubscribeRequest {
///         channels: vec!["lobby".into()],
///         with_presence: true,
///         ..Default::default()
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    config: Config,
    transports: Option<(Arc<dyn Transport>, Arc<dyn Transport>)>,
    store: Option<Arc<dyn SecureStore>>,
    crypto: Option<Arc<CryptoModule>>,
}

impl ClientBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            transports: None,
            store: None,
            crypto: None,
        }
    }

    /// Use these sessions instead of reqwest: the first carries the
    /// long-poll, the second everything else.
    pub fn transports(
        mut self,
        subscribe: Arc<dyn Transport>,
        service: Arc<dyn Transport>,
    ) -> Self {
        self.transports = Some((subscribe, service));
        self
    }

    /// Store for the publish sequence.  Defaults to the OS keychain when
    /// `persistence.enabled` is set.
    pub fn store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Crypto module to use instead of the one derived from `[crypto]`.
    pub fn crypto_module(mut self, module: Arc<CryptoModule>) -> Self {
        self.crypto = Some(module);
        self
    }

    /// Validate the config and start the client.  Must run inside a
    /// tokio runtime: the subscribe actor is spawned here.
    pub fn build(self) -> Result<Client> {
        for issue in self.config.validate() {
            match issue.severity {
                ConfigSeverity::Error => return Err(Error::Config(issue.to_string())),
                ConfigSeverity::Warning => tracing::warn!(%issue, "config warning"),
            }
        }

        let crypto = match self.crypto {
            Some(module) => {
                module.announce("builder");
                Some(module)
            }
            None => crypto_from_config(&self.config.crypto)?,
        };

        let config = Arc::new(self.config);
        let engine = match self.transports {
            Some((subscribe, service)) => {
                NetworkEngine::new(config.clone(), subscribe, service, crypto)
            }
            None => NetworkEngine::with_reqwest(config.clone(), crypto)?,
        };

        let store = self.store.or_else(|| {
            config.persistence.enabled.then(|| {
                Arc::new(KeyringStore::new(config.persistence.keychain_service.clone()))
                    as Arc<dyn SecureStore>
            })
        });
        let sequence = PublishSequence::load(store, sequence_key(&config));

        let shared = SharedSubscription::default();
        let listeners = Arc::new(ListenerRegistry::new());
        let heartbeat = Arc::new(HeartbeatManager::new(
            engine.clone(),
            shared.clone(),
            listeners.clone(),
        ));
        let handle = subscribe::spawn(
            engine.clone(),
            shared.clone(),
            listeners.clone(),
            heartbeat.clone(),
        );

        tracing::info!(
            origin = %config.network.origin,
            user_id = %config.keys.user_id,
            crypto = engine.crypto().is_some(),
            "client ready"
        );

        Ok(Client {
            engine,
            shared,
            listeners,
            heartbeat,
            sequence,
            commands: handle.commands,
            state: handle.state,
        })
    }
}

fn crypto_from_config(cfg: &CryptoConfig) -> Result<Option<Arc<CryptoModule>>> {
    let Some(key) = resolve_cipher_key(cfg)? else {
        return Ok(None);
    };
    let module = if cfg.legacy_default {
        CryptoModule::legacy(&key, cfg.random_iv)?
    } else {
        CryptoModule::aes_cbc(&key, cfg.random_iv)?
    };
    module.announce("config");
    Ok(Some(Arc::new(module)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Client {
    pub(crate) engine: Arc<NetworkEngine>,
    pub(crate) shared: SharedSubscription,
    pub(crate) listeners: Arc<ListenerRegistry>,
    pub(crate) heartbeat: Arc<HeartbeatManager>,
    pub(crate) sequence: PublishSequence,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SubscribeState>,
}

impl Client {
    pub fn builder(config: Config) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        self.engine.config()
    }

    pub fn has_crypto(&self) -> bool {
        self.engine.crypto().is_some()
    }

    /// Send a command to the subscribe actor and wait for its ack.
    pub(crate) async fn command(
        &self,
        operation: OperationType,
        make: impl FnOnce(Ack) -> Command,
    ) -> std::result::Result<(), Status> {
        if self.engine.is_invalidated() {
            return Err(Status::invalidated(operation));
        }
        let (ack, done) = oneshot::channel();
        self.commands
            .send(make(ack))
            .map_err(|_| Status::invalidated(operation))?;
        done.await.map_err(|_| Status::invalidated(operation))
    }

    // ── subscribe ───────────────────────────────────────────────────

    /// Add channels and groups to the subscription.  Returns once the
    /// set is updated; the outcome of the long-poll arrives as statuses.
    pub async fn subscribe(&self, request: SubscribeRequest) -> std::result::Result<(), Status> {
        self.command(OperationType::Subscribe, |ack| Command::Subscribe(request, ack))
            .await
    }

    pub async fn unsubscribe(
        &self,
        channels: &[String],
        groups: &[String],
    ) -> std::result::Result<(), Status> {
        let (channels, groups) = (channels.to_vec(), groups.to_vec());
        self.command(OperationType::Unsubscribe, |ack| Command::Unsubscribe {
            channels,
            groups,
            ack,
        })
        .await
    }

    pub async fn unsubscribe_all(&self) -> std::result::Result<(), Status> {
        self.command(OperationType::Unsubscribe, Command::UnsubscribeAll)
            .await
    }

    /// Restart the long-poll, optionally from `timetoken`.
    pub async fn reconnect(&self, timetoken: Option<u64>) -> std::result::Result<(), Status> {
        self.command(OperationType::Subscribe, |ack| Command::Reconnect { timetoken, ack })
            .await
    }

    /// Stop the long-poll and heartbeat, keeping the set and cursor.
    pub async fn disconnect(&self) -> std::result::Result<(), Status> {
        self.command(OperationType::Subscribe, Command::Disconnect)
            .await
    }

    /// Subscribed channels, presence entries included.
    pub fn subscribed_channels(&self) -> Vec<String> {
        self.shared.read().set.channels()
    }

    pub fn subscribed_groups(&self) -> Vec<String> {
        self.shared.read().set.groups()
    }

    pub fn cursor(&self) -> Cursor {
        self.shared.read().cursor
    }

    pub fn subscribe_state(&self) -> SubscribeState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<SubscribeState> {
        self.state.clone()
    }

    pub fn is_heartbeat_running(&self) -> bool {
        self.heartbeat.is_running()
    }

    // ── listeners ───────────────────────────────────────────────────

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Register a channel-backed listener and return its receiver.
    pub fn events(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        let (listener, rx) = ChannelListener::new();
        self.listeners.add(Arc::new(listener));
        rx
    }

    // ── lifecycle ───────────────────────────────────────────────────

    /// Cancel in-flight requests whose path starts with `path_prefix`;
    /// an empty prefix cancels everything.
    pub fn cancel_all_operations(&self, path_prefix: &str) -> usize {
        self.engine.cancel_all_operations(path_prefix)
    }

    /// Stop the subscribe loop and release both sessions.  Every later
    /// call fails with `ClientInvalidated`.
    pub fn invalidate(&self) {
        let (ack, _) = oneshot::channel();
        let _ = self.commands.send(Command::Shutdown(ack));
        self.heartbeat.stop();
        self.engine.invalidate();
    }

    pub fn is_invalidated(&self) -> bool {
        self.engine.is_invalidated()
    }

    /// Server time as a 17-digit timetoken.
    pub async fn time(&self) -> std::result::Result<u64, Status> {
        match self.process(OperationType::Time, Default::default()).await? {
            ParsedData::Time(timetoken) => Ok(timetoken),
            other => Err(unexpected(OperationType::Time, other)),
        }
    }
}

pub(crate) fn unexpected(operation: OperationType, data: ParsedData) -> Status {
    Status::malformed(operation, format!("unexpected result: {data:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use pn_transport::{TransportError, TransportRequest, TransportResponse};

    struct Offline;

    #[async_trait::async_trait]
    impl Transport for Offline {
        async fn send(
            &self,
            _request: TransportRequest,
        ) -> std::result::Result<TransportResponse, TransportError> {
            Err(TransportError::Network("offline".into()))
        }
        fn invalidate(&self) {}
    }

    fn offline_client(config: Config) -> Result<Client> {
        ClientBuilder::new(config)
            .transports(Arc::new(Offline), Arc::new(Offline))
            .store(Arc::new(MemoryStore::new()))
            .build()
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let err = offline_client(Config::default()).err();
        assert!(matches!(err, Some(Error::Config(_))));
    }

    #[tokio::test]
    async fn plaintext_cipher_key_enables_crypto() {
        let mut config = Config::with_keys("sub-c-1", "alice");
        config.crypto.cipher_key = Some("enigma".into());
        let client = offline_client(config).unwrap();
        assert!(client.has_crypto());
    }

    #[tokio::test]
    async fn invalidated_client_fails_fast() {
        let client = offline_client(Config::with_keys("sub-c-1", "alice")).unwrap();
        client.invalidate();
        client.invalidate();
        let err = client.time().await.unwrap_err();
        assert_eq!(err.category, pn_domain::StatusCategory::ClientInvalidated);
        let err = client
            .subscribe(SubscribeRequest {
                channels: vec!["a".into()],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.category, pn_domain::StatusCategory::ClientInvalidated);
    }
}
