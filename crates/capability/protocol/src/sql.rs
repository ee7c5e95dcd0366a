//! SQL 客户端实现
//!
//! 基于 `sqlx` Any 驱动，连接串可以是 `postgres://...` 或 `sqlite:...`。
//! 连接串来源：绑定指定了 `authProfile` 时取认证档案的 `connection_string`，
//! 否则取 `uri` 去掉 `sql://` 前缀后的部分。
//!
//! 查询结果形态：
//! - 无行 → `null`
//! - 单行单列 → 标量
//! - 单行 → `{列名: 值}`
//! - 多行 → `[{列名: 值}, ...]`

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::{refresh_interval, BindingConfig, Protocol};
use scenelink_auth::AuthManager;
use serde_json::{Map, Value};
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Column, Row, ValueRef};
use tracing::{debug, info};

use crate::client::{require, stream_key, ClientSettings, ProtocolClient, StreamHandler};
use crate::error::ProtocolError;
use crate::stream::{spawn_poller, StreamTasks};

const URI_PREFIX: &str = "sql://";

/// SQL 协议客户端
pub struct SqlClient {
    auth: Arc<AuthManager>,
    settings: ClientSettings,
    pool: RwLock<Option<AnyPool>>,
    streams: StreamTasks,
}

impl SqlClient {
    pub fn new(auth: Arc<AuthManager>, settings: ClientSettings) -> Self {
        sqlx::any::install_default_drivers();
        Self {
            auth,
            settings,
            pool: RwLock::new(None),
            streams: StreamTasks::new(),
        }
    }

    fn connection_string(&self, config: &BindingConfig) -> Result<String, ProtocolError> {
        if let Some(profile) = config.auth_profile.as_deref() {
            return self.auth.get_sql_connection_string(profile).ok_or_else(|| {
                ProtocolError::Config(format!(
                    "auth profile {profile} has no connection_string"
                ))
            });
        }
        let uri = require(&config.uri, "SQL", "uri")?;
        Ok(uri.strip_prefix(URI_PREFIX).unwrap_or(uri).to_string())
    }

    fn pool(&self) -> Result<AnyPool, ProtocolError> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ProtocolError::NotConnected("sql"))
    }
}

async fn run_query(pool: &AnyPool, config: &BindingConfig) -> Result<Value, ProtocolError> {
    let sql = require(&config.query, "SQL", "query")?;
    let rows = sqlx::query(sql)
        .fetch_all(pool)
        .await
        .map_err(|e| ProtocolError::Request(e.to_string()))?;
    shape_rows(&rows)
}

fn shape_rows(rows: &[AnyRow]) -> Result<Value, ProtocolError> {
    match rows {
        [] => Ok(Value::Null),
        [row] if row.columns().len() == 1 => column_value(row, 0),
        [row] => row_object(row).map(Value::Object),
        rows => rows
            .iter()
            .map(|row| row_object(row).map(Value::Object))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
    }
}

fn row_object(row: &AnyRow) -> Result<Map<String, Value>, ProtocolError> {
    let mut object = Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), column_value(row, index)?);
    }
    Ok(object)
}

fn column_value(row: &AnyRow, index: usize) -> Result<Value, ProtocolError> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| ProtocolError::DataParse(e.to_string()))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Ok(Value::from(v));
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Ok(serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number));
    }
    if let Ok(v) = row.try_get::<bool, _>(index) {
        return Ok(Value::Bool(v));
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Ok(Value::String(v));
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return Ok(Value::String(String::from_utf8_lossy(&v).into_owned()));
    }
    Err(ProtocolError::DataParse(format!(
        "unsupported column type at index {index}"
    )))
}

/// 把写入值绑定为语句参数。
fn bind_params<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    value: &Value,
) -> Query<'q, Any, AnyArguments<'q>> {
    let params: Vec<&Value> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().collect(),
        Value::Object(fields) => fields.values().collect(),
        scalar => vec![scalar],
    };
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => query.bind(s.clone()),
            nested => query.bind(nested.to_string()),
        };
    }
    query
}

/// sqlite 内存库每条连接各自独立，只能用单连接且不回收；其余数据库使用 sqlx 默认池参数。
fn pool_options(url: &str, acquire_timeout: Duration) -> AnyPoolOptions {
    let options = AnyPoolOptions::new().acquire_timeout(acquire_timeout);
    if is_sqlite_memory(url) {
        options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        options
    }
}

fn is_sqlite_memory(url: &str) -> bool {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return false;
    };
    let rest = rest.trim_start_matches('/');
    rest.starts_with(":memory:") || rest.contains("mode=memory")
}

#[async_trait]
impl ProtocolClient for SqlClient {
    fn protocol(&self) -> Protocol {
        Protocol::Sql
    }

    fn is_connected(&self) -> bool {
        self.pool
            .read()
            .map(|pool| pool.as_ref().is_some_and(|pool| !pool.is_closed()))
            .unwrap_or(false)
    }

    async fn connect(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        let url = self.connection_string(config)?;
        let pool = pool_options(&url, self.settings.connect_timeout)
            .connect(&url)
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;
        let previous = self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(pool);
        if let Some(previous) = previous {
            previous.close().await;
        }
        info!(binding = %config.key(), "sql pool ready");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        self.streams.stop_all();
        let pool = self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pool) = pool {
            pool.close().await;
            debug!("sql pool closed");
        }
        Ok(())
    }

    async fn read(&self, config: &BindingConfig) -> Result<Value, ProtocolError> {
        let pool = self.pool()?;
        run_query(&pool, config).await
    }

    async fn write(&self, config: &BindingConfig, value: &Value) -> Result<bool, ProtocolError> {
        let pool = self.pool()?;
        let sql = require(&config.query, "SQL", "query")?;
        let result = bind_params(sqlx::query(sql), value)
            .execute(&pool)
            .await
            .map_err(|e| ProtocolError::Request(e.to_string()))?;
        debug!(binding = %config.key(), rows = result.rows_affected(), "sql write executed");
        Ok(true)
    }

    async fn start_stream(
        &self,
        config: &BindingConfig,
        handler: StreamHandler,
    ) -> Result<(), ProtocolError> {
        let pool = self.pool()?;
        require(&config.query, "SQL", "query")?;
        let every = refresh_interval(config, Protocol::Sql.default_poll_seconds().unwrap_or(60.0));
        let key = stream_key(config);
        let config = config.clone();
        let handle = spawn_poller(
            key.clone(),
            every,
            move || {
                let pool = pool.clone();
                let config = config.clone();
                async move { run_query(&pool, &config).await }
            },
            handler.on_value,
        );
        self.streams.insert(key, handle);
        Ok(())
    }

    async fn stop_stream(&self, config: &BindingConfig) -> Result<(), ProtocolError> {
        self.streams.stop(&stream_key(config));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_in_memory_sqlite_is_pinned_to_one_connection() {
        let wait = Duration::from_secs(1);
        assert!(is_sqlite_memory("sqlite::memory:"));
        assert!(is_sqlite_memory("sqlite://file:plant?mode=memory&cache=shared"));
        assert!(!is_sqlite_memory("sqlite://data/plant.db"));
        assert!(!is_sqlite_memory("postgres://scada@db.local/plant"));

        assert_eq!(pool_options("sqlite::memory:", wait).get_max_connections(), 1);
        assert!(pool_options("postgres://scada@db.local/plant", wait).get_max_connections() > 1);
    }
}
