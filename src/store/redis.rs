//! Redis store backend.
//!
//! Each namespace maps to its own logical database on its own connection.
//! A connection is only ever driven by the holder of its async mutex, so
//! commands for one namespace never interleave while the three namespaces
//! proceed in parallel.

use std::collections::BTreeMap;
use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::{
    cmd, Client, Cmd, ConnectionAddr, ConnectionInfo, ErrorKind, FromRedisValue, RedisConnectionInfo,
    RedisError,
};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{AccessStore, Namespace, NamespaceTtls, StoreError, StoreResult};

/// Connection settings for [`RedisStore`].
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Password sent with `AUTH`, if any.
    pub token: Option<String>,
    /// Limit for establishing a connection (TCP connect, `AUTH`, `SELECT`).
    pub connect_timeout: Duration,
    /// Limit for a single command round trip.
    pub command_timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            token: None,
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(2),
        }
    }
}

impl RedisStoreConfig {
    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection parameters for the database backing `namespace`.
    fn connection_info(&self, namespace: Namespace) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: namespace.index() as i64,
                password: self.token.clone().filter(|t| !t.is_empty()),
                ..RedisConnectionInfo::default()
            },
        }
    }
}

/// Store backed by a Redis server.
pub struct RedisStore {
    config: RedisStoreConfig,
    ttls: NamespaceTtls,
    connections: [Mutex<Option<MultiplexedConnection>>; 3],
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("address", &self.config.address())
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Create a store; no connection is made until first use or [`connect`](Self::connect).
    #[must_use]
    pub fn new(config: RedisStoreConfig, ttls: NamespaceTtls) -> Self {
        Self {
            config,
            ttls,
            connections: [Mutex::new(None), Mutex::new(None), Mutex::new(None)],
        }
    }

    /// Open the connection of every namespace.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if any namespace cannot be reached.
    pub async fn connect(&self) -> StoreResult<()> {
        info!(address = %self.config.address(), "Connecting to redis");
        for namespace in Namespace::ALL {
            let mut slot = self.connections[namespace.index()].lock().await;
            if slot.is_none() {
                *slot = Some(self.open(namespace).await?);
            }
        }
        info!("Connected to redis");
        Ok(())
    }

    async fn open(&self, namespace: Namespace) -> StoreResult<MultiplexedConnection> {
        let client = Client::open(self.config.connection_info(namespace))
            .map_err(|e| store_error("connect", e))?;

        let conn = timeout(
            self.config.connect_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            StoreError::Unavailable(format!(
                "timed out connecting to {} after {:?}",
                self.config.address(),
                self.config.connect_timeout
            ))
        })?
        .map_err(|e| store_error("connect", e))?;

        debug!(namespace = %namespace, "Opened redis connection");
        Ok(conn)
    }

    /// Run one command on a held connection slot, reconnecting if needed.
    ///
    /// A connection that failed or timed out is dropped so the next call
    /// starts from a fresh one.
    async fn query<T: FromRedisValue>(
        &self,
        slot: &mut Option<MultiplexedConnection>,
        namespace: Namespace,
        operation: &'static str,
        command: &Cmd,
    ) -> StoreResult<T> {
        if slot.is_none() {
            *slot = Some(self.open(namespace).await?);
        }
        let Some(conn) = slot.as_mut() else {
            return Err(StoreError::Unavailable("no connection".to_string()));
        };

        match timeout(self.config.command_timeout, command.query_async(conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                let err = store_error(operation, err);
                if err.is_unavailable() {
                    warn!(namespace = %namespace, operation, error = %err, "Dropping redis connection");
                    *slot = None;
                }
                Err(err)
            },
            Err(_) => {
                warn!(namespace = %namespace, operation, "Redis command timed out, dropping connection");
                *slot = None;
                Err(StoreError::Timeout {
                    operation,
                    namespace,
                    after: self.config.command_timeout,
                })
            },
        }
    }

    async fn execute<T: FromRedisValue>(
        &self,
        namespace: Namespace,
        operation: &'static str,
        command: &Cmd,
    ) -> StoreResult<T> {
        let mut slot = self.connections[namespace.index()].lock().await;
        self.query(&mut slot, namespace, operation, command).await
    }
}

/// Classify a client error for `operation`.
fn store_error(operation: &'static str, err: RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
        StoreError::Unavailable(format!("{operation}: {err}"))
    } else if err.kind() == ErrorKind::TypeError {
        StoreError::Protocol(format!("unexpected reply to {operation}: {err}"))
    } else {
        StoreError::Rejected {
            operation,
            message: err.to_string(),
        }
    }
}

fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl AccessStore for RedisStore {
    async fn put(
        &self,
        namespace: Namespace,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<()> {
        let mut command = cmd("SET");
        command.arg(key).arg(value).arg("EX").arg(ttl_seconds(ttl));
        self.execute(namespace, "set", &command).await
    }

    async fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<String>> {
        let mut command = cmd("GET");
        command.arg(key);
        self.execute(namespace, "get", &command).await
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> StoreResult<()> {
        let mut command = cmd("DEL");
        command.arg(key);
        let _removed: i64 = self.execute(namespace, "del", &command).await?;
        Ok(())
    }

    async fn list_all(&self, namespace: Namespace) -> StoreResult<BTreeMap<String, String>> {
        // KEYS and MGET run under one lock hold so they see the same connection.
        let mut slot = self.connections[namespace.index()].lock().await;

        let mut command = cmd("KEYS");
        command.arg("*");
        let keys: Vec<String> = self.query(&mut slot, namespace, "keys", &command).await?;
        if keys.is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut command = cmd("MGET");
        command.arg(&keys);
        let values: Vec<Option<String>> = self.query(&mut slot, namespace, "mget", &command).await?;

        if values.len() != keys.len() {
            return Err(StoreError::Protocol(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }

        // A key may expire between KEYS and MGET.
        Ok(keys
            .into_iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .collect())
    }

    async fn refresh_ttl(&self, namespace: Namespace, key: &str) -> StoreResult<bool> {
        let mut command = cmd("EXPIRE");
        command
            .arg(key)
            .arg(ttl_seconds(self.ttls.for_namespace(namespace)));
        let updated: i64 = self.execute(namespace, "expire", &command).await?;
        Ok(updated == 1)
    }

    async fn ping(&self) -> StoreResult<()> {
        for namespace in Namespace::ALL {
            let _pong: String = self.execute(namespace, "ping", &cmd("PING")).await?;
        }
        Ok(())
    }
}
