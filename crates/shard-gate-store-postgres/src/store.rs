// crates/shard-gate-store-postgres/src/store.rs
// ============================================================================
// Module: Postgres Shard Store
// Description: ConnectionFactory and ShardConnection backed by `postgres`.
// Purpose: Execute coordinator and benchmark SQL against PostgreSQL shards.
// Dependencies: bytes, postgres, shard-gate-core, uuid
// ============================================================================

//! ## Overview
//! Text parameters bind as `text`. UUID parameters follow the type the server
//! infers for the placeholder: a `uuid` column receives the native 16-byte
//! value, while `text`, `varchar`, or `char(36)` id columns receive the
//! lowercase hyphenated form. Any other column type is rejected by the driver
//! before the statement runs.
//!
//! Fetched rows are read column by column as optional text, so read
//! statements cast non-text columns (`id::text`, `created_at::text`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error;

use bytes::BytesMut;
use postgres::Client;
use postgres::Config;
use postgres::NoTls;
use postgres::Row;
use postgres::types::IsNull;
use postgres::types::ToSql;
use postgres::types::Type;
use shard_gate_core::ConnectPolicy;
use shard_gate_core::ConnectionFactory;
use shard_gate_core::ShardConnection;
use shard_gate_core::ShardDbError;
use shard_gate_core::ShardDescriptor;
use shard_gate_core::ShardKey;
use shard_gate_core::ShardRow;
use shard_gate_core::SqlDialect;
use shard_gate_core::SqlParam;
use uuid::Uuid;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Application name reported to the server.
const APPLICATION_NAME: &str = "shard-gate";

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Opens unpooled `PostgreSQL` connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresShardFactory;

impl PostgresShardFactory {
    /// Creates a new factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ConnectionFactory for PostgresShardFactory {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    fn connect(
        &self,
        _key: ShardKey,
        descriptor: &ShardDescriptor,
        policy: &ConnectPolicy,
    ) -> Result<Box<dyn ShardConnection>, ShardDbError> {
        let client = client_config(descriptor, policy)
            .connect(NoTls)
            .map_err(|err| ShardDbError::Connect(err.to_string()))?;
        Ok(Box::new(PostgresShardConnection {
            client,
        }))
    }
}

/// Builds the client configuration for a shard descriptor.
///
/// The statement timeout, when set, is applied as a session option so every
/// statement on the connection inherits it.
#[must_use]
pub fn client_config(descriptor: &ShardDescriptor, policy: &ConnectPolicy) -> Config {
    let mut config = Config::new();
    config.host(&descriptor.host).port(descriptor.port).application_name(APPLICATION_NAME);
    if let Some(database) = &descriptor.database {
        config.dbname(database);
    }
    if let Some(username) = &descriptor.username {
        config.user(username);
    }
    if let Some(password) = &descriptor.password {
        config.password(password);
    }
    if let Some(timeout) = policy.connect_timeout {
        config.connect_timeout(timeout);
    }
    if let Some(timeout) = policy.statement_timeout {
        config.options(&format!("-c statement_timeout={}", timeout.as_millis()));
    }
    config
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// One open `PostgreSQL` session.
struct PostgresShardConnection {
    /// Underlying blocking client.
    client: Client,
}

/// Converts typed parameters into driver values.
fn bind(params: &[SqlParam]) -> Vec<Box<dyn ToSql + Sync>> {
    params
        .iter()
        .map(|param| -> Box<dyn ToSql + Sync> {
            match param {
                SqlParam::Text(value) => Box::new(value.clone()),
                SqlParam::Uuid(value) => Box::new(UuidParam(*value)),
            }
        })
        .collect()
}

/// Borrows bound values in the shape the client expects.
fn as_refs(bound: &[Box<dyn ToSql + Sync>]) -> Vec<&(dyn ToSql + Sync)> {
    bound.iter().map(AsRef::as_ref).collect()
}

// ============================================================================
// SECTION: UUID Parameters
// ============================================================================

/// Column types a UUID parameter can bind to.
const UUID_TARGETS: [Type; 4] = [Type::UUID, Type::TEXT, Type::VARCHAR, Type::BPCHAR];

/// UUID value that binds natively to `uuid` columns and as hyphenated text
/// to character columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UuidParam(Uuid);

impl ToSql for UuidParam {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        if *ty == Type::UUID {
            self.0.to_sql(ty, out)
        } else {
            self.0.hyphenated().to_string().to_sql(ty, out)
        }
    }

    fn accepts(ty: &Type) -> bool {
        UUID_TARGETS.contains(ty)
    }

    fn to_sql_checked(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        if !Self::accepts(ty) {
            return Err(format!("cannot bind a UUID parameter to a column of type {ty}").into());
        }
        self.to_sql(ty, out)
    }
}

/// Renders every column of a row as optional text.
fn render_row(row: &Row) -> Result<ShardRow, ShardDbError> {
    let mut columns = Vec::with_capacity(row.len());
    for index in 0 .. row.len() {
        let value: Option<String> =
            row.try_get(index).map_err(|err| ShardDbError::Query(err.to_string()))?;
        columns.push(value);
    }
    Ok(ShardRow {
        columns,
    })
}

impl ShardConnection for PostgresShardConnection {
    fn begin(&mut self) -> Result<(), ShardDbError> {
        self.client.batch_execute("BEGIN").map_err(|err| ShardDbError::Execute(err.to_string()))
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), ShardDbError> {
        self.client.batch_execute(sql).map_err(|err| ShardDbError::Execute(err.to_string()))
    }

    fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, ShardDbError> {
        let bound = bind(params);
        self.client
            .execute(sql, &as_refs(&bound))
            .map_err(|err| ShardDbError::Execute(err.to_string()))
    }

    fn query_opt(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Option<ShardRow>, ShardDbError> {
        let bound = bind(params);
        let row = self
            .client
            .query_opt(sql, &as_refs(&bound))
            .map_err(|err| ShardDbError::Query(err.to_string()))?;
        row.as_ref().map(render_row).transpose()
    }

    fn commit(&mut self) -> Result<(), ShardDbError> {
        self.client.batch_execute("COMMIT").map_err(|err| ShardDbError::Commit(err.to_string()))
    }

    fn rollback(&mut self) -> Result<(), ShardDbError> {
        self.client
            .batch_execute("ROLLBACK")
            .map_err(|err| ShardDbError::Rollback(err.to_string()))
    }

    fn close(self: Box<Self>) -> Result<(), ShardDbError> {
        self.client.close().map_err(|err| ShardDbError::Close(err.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests unwrap known-good fixtures.")]
mod tests {
    use std::time::Duration;

    use bytes::BytesMut;
    use postgres::config::Host;
    use postgres::types::ToSql;
    use postgres::types::Type;
    use shard_gate_core::ConnectPolicy;
    use shard_gate_core::ShardDescriptor;
    use uuid::Uuid;

    use super::UuidParam;
    use super::client_config;

    const SAMPLE_ID: &str = "9f1c2d3e-4b5a-4c6d-8e7f-0a1b2c3d4e5f";

    #[test]
    fn descriptor_fields_map_onto_client_config() {
        let descriptor = ShardDescriptor {
            host: "db7.internal".to_string(),
            port: 6432,
            database: Some("plans_7".to_string()),
            username: Some("app".to_string()),
            password: Some("secret".to_string()),
        };
        let config = client_config(&descriptor, &ConnectPolicy::default());
        assert_eq!(config.get_hosts(), &[Host::Tcp("db7.internal".to_string())]);
        assert_eq!(config.get_ports(), &[6432]);
        assert_eq!(config.get_dbname(), Some("plans_7"));
        assert_eq!(config.get_user(), Some("app"));
        assert_eq!(config.get_password(), Some(&b"secret"[..]));
        assert_eq!(config.get_connect_timeout(), None);
        assert_eq!(config.get_options(), None);
    }

    #[test]
    fn policy_timeouts_are_applied() {
        let policy = ConnectPolicy {
            connect_timeout: Some(Duration::from_secs(5)),
            statement_timeout: Some(Duration::from_millis(30_000)),
            connect_retries: 0,
        };
        let config = client_config(&ShardDescriptor::default(), &policy);
        assert_eq!(config.get_connect_timeout(), Some(&Duration::from_secs(5)));
        assert_eq!(config.get_options(), Some("-c statement_timeout=30000"));
        assert_eq!(config.get_dbname(), None);
    }

    #[test]
    fn uuid_param_binds_natively_to_uuid_columns() {
        let id = Uuid::parse_str(SAMPLE_ID).unwrap();
        let mut out = BytesMut::new();
        UuidParam(id).to_sql_checked(&Type::UUID, &mut out).unwrap();
        assert_eq!(&out[..], id.as_bytes());
    }

    #[test]
    fn uuid_param_binds_as_text_to_character_columns() {
        let id = Uuid::parse_str(SAMPLE_ID).unwrap();
        for ty in [Type::TEXT, Type::VARCHAR, Type::BPCHAR] {
            let mut out = BytesMut::new();
            UuidParam(id).to_sql_checked(&ty, &mut out).unwrap();
            assert_eq!(&out[..], SAMPLE_ID.as_bytes());
        }
    }

    #[test]
    fn uuid_param_rejects_other_column_types() {
        let id = Uuid::parse_str(SAMPLE_ID).unwrap();
        let mut out = BytesMut::new();
        let err = UuidParam(id).to_sql_checked(&Type::INT8, &mut out).err().unwrap();
        assert!(err.to_string().contains("cannot bind a UUID parameter"));
        assert!(out.is_empty());
    }
}
