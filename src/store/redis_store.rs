//! Redis store adapter
//!
//! Sync connections for the three supported topologies. All `redis` errors
//! are classified here and never leave this module.

use parking_lot::Mutex;
use redis::cluster::{ClusterClient, ClusterConnection};
use redis::sentinel::{SentinelClient, SentinelNodeConnectionInfo, SentinelServerType};
use redis::{Client, ConnectionLike, ErrorKind, RedisConnectionInfo, RedisError};

use crate::config::{Config, ConnectionOptions};
use crate::error::Result;
use super::{Connector, StoreConnection, StoreFault, StoreResult};

/// Classify a `redis` error
impl From<RedisError> for StoreFault {
    fn from(err: RedisError) -> Self {
        if err.kind() == ErrorKind::NoScriptError {
            StoreFault::ScriptMissing
        } else if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            StoreFault::ConnectionLost(err.to_string())
        } else {
            StoreFault::Other(err.to_string())
        }
    }
}

/// Topology specific client, built once from the options
enum Target {
    Single(Client),
    // SentinelClient::get_connection needs &mut self
    Failover(Mutex<SentinelClient>),
    Cluster(ClusterClient),
}

/// Opens Redis connections from retained options
pub struct RedisConnector {
    options: ConnectionOptions,
    target: Target,
    config: Config,
}

impl RedisConnector {
    /// Build the client for the configured topology. Does not connect.
    pub fn new(config: &Config) -> Result<Self> {
        let target = match &config.connection {
            ConnectionOptions::Single { url } => Target::Single(Client::open(url.as_str())
                .map_err(StoreFault::from)?),
            ConnectionOptions::Failover {
                sentinels,
                master_name,
                password,
                db,
            } => {
                let node_info = SentinelNodeConnectionInfo {
                    tls_mode: None,
                    redis_connection_info: Some(RedisConnectionInfo {
                        db: *db,
                        password: password.clone(),
                        ..Default::default()
                    }),
                };
                let client = SentinelClient::build(
                    sentinels.clone(),
                    master_name.clone(),
                    Some(node_info),
                    SentinelServerType::Master,
                )
                .map_err(StoreFault::from)?;
                Target::Failover(Mutex::new(client))
            }
            ConnectionOptions::Cluster { nodes } => {
                let mut builder = ClusterClient::builder(nodes.clone());
                if let Some(timeout) = config.connect_timeout() {
                    builder = builder.connection_timeout(timeout);
                }
                if let Some(timeout) = config.io_timeout() {
                    builder = builder.response_timeout(timeout);
                }
                Target::Cluster(builder.build().map_err(StoreFault::from)?)
            }
        };

        Ok(Self {
            options: config.connection.clone(),
            target,
            config: config.clone(),
        })
    }

    fn configure(&self, conn: &redis::Connection) -> StoreResult<()> {
        let timeout = self.config.io_timeout();
        conn.set_read_timeout(timeout)?;
        conn.set_write_timeout(timeout)?;
        Ok(())
    }
}

impl Connector for RedisConnector {
    type Connection = RedisConnection;

    fn connect(&self) -> StoreResult<RedisConnection> {
        match &self.target {
            Target::Single(client) => {
                let conn = match self.config.connect_timeout() {
                    Some(timeout) => client.get_connection_with_timeout(timeout)?,
                    None => client.get_connection()?,
                };
                self.configure(&conn)?;
                Ok(RedisConnection::Single(conn))
            }
            Target::Failover(client) => {
                let conn = client.lock().get_connection()?;
                self.configure(&conn)?;
                Ok(RedisConnection::Single(conn))
            }
            Target::Cluster(client) => Ok(RedisConnection::Cluster(client.get_connection()?)),
        }
    }

    fn describe(&self) -> String {
        match &self.options {
            ConnectionOptions::Single { url } => format!("redis {}", url),
            ConnectionOptions::Failover {
                sentinels,
                master_name,
                ..
            } => format!("sentinel master '{}' via {}", master_name, sentinels.join(",")),
            ConnectionOptions::Cluster { nodes } => format!("redis cluster {}", nodes.join(",")),
        }
    }
}

/// A live Redis connection
pub enum RedisConnection {
    Single(redis::Connection),
    Cluster(ClusterConnection),
}

impl RedisConnection {
    fn as_conn(&mut self) -> &mut dyn ConnectionLike {
        match self {
            RedisConnection::Single(conn) => conn,
            RedisConnection::Cluster(conn) => conn,
        }
    }
}

impl StoreConnection for RedisConnection {
    fn ping(&mut self) -> StoreResult<()> {
        let reply: String = redis::cmd("PING").query(self.as_conn())?;
        if reply != "PONG" {
            return Err(StoreFault::Other(format!("unexpected PING reply: {}", reply)));
        }
        Ok(())
    }

    fn load_script(&mut self, source: &str) -> StoreResult<String> {
        let handle: String = redis::cmd("SCRIPT")
            .arg("LOAD")
            .arg(source)
            .query(self.as_conn())?;
        Ok(handle)
    }

    fn eval_sha(&mut self, handle: &str, keys: &[&str], args: &[String]) -> StoreResult<String> {
        let reply: String = redis::cmd("EVALSHA")
            .arg(handle)
            .arg(keys.len())
            .arg(keys)
            .arg(args)
            .query(self.as_conn())?;
        Ok(reply)
    }
}
