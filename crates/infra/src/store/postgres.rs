//! Postgres-backed company table.
//!
//! Expects a `companies` table with a `BIGSERIAL` `id` primary key and the
//! text columns `name`, `code`, `country`, `website` and `phone`. Schema
//! provisioning is out of scope; the table must exist before the service
//! starts.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | Database | `Query` |
//! | PoolClosed / PoolTimedOut / Io / Tls | `Connection` |
//! | ColumnDecode / Decode / TypeNotFound | `Corrupt` |
//! | Other | `Query` |

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::instrument;

use corpreg_companies::{Company, CompanyDraft, CompanyFilter};
use corpreg_core::CompanyId;

use super::{CompanyStore, CompanyTx, StoreError};

const SELECT_COMPANY: &str = "SELECT id, name, code, country, website, phone FROM companies";

/// Pool sizing and connection lifetimes.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub url: String,
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

#[derive(Debug, Clone)]
pub struct PostgresCompanyStore {
    pool: PgPool,
}

impl PostgresCompanyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool and verify it can hand out a connection.
    pub async fn connect(options: &PostgresOptions) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .idle_timeout(options.idle_timeout)
            .max_lifetime(options.max_lifetime)
            .connect(&options.url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CompanyStore for PostgresCompanyStore {
    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Box<dyn CompanyTx>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        Ok(Box::new(PostgresCompanyTx { tx }))
    }

    #[instrument(skip(self), err)]
    async fn list(&self, filter: &CompanyFilter) -> Result<Vec<Company>, StoreError> {
        let mut query = QueryBuilder::<Postgres>::new(SELECT_COMPANY);
        for (idx, (field, needle)) in filter.active().enumerate() {
            query.push(if idx == 0 { " WHERE " } else { " AND " });
            query.push(field.column());
            query.push(" LIKE ");
            query.push_bind(contains_pattern(needle));
            query.push(" ESCAPE '\\'");
        }
        query.push(" ORDER BY id ASC");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;

        rows.iter().map(|row| company_from_row("list", row)).collect()
    }

    #[instrument(skip(self), fields(company_id = %id), err)]
    async fn get(&self, id: CompanyId) -> Result<Option<Company>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_COMPANY} WHERE id = $1"))
            .bind(db_id("get", id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(|r| company_from_row("get", r)).transpose()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| map_sqlx_error("ping", e))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

struct PostgresCompanyTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CompanyTx for PostgresCompanyTx {
    async fn insert(&mut self, draft: &CompanyDraft) -> Result<CompanyId, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO companies (name, code, country, website, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.code)
        .bind(&draft.country)
        .bind(&draft.website)
        .bind(&draft.phone)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;

        let id: i64 = row.try_get("id").map_err(|e| map_sqlx_error("insert", e))?;
        domain_id("insert", id)
    }

    async fn update(&mut self, id: CompanyId, draft: &CompanyDraft) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE companies
            SET name = $1, code = $2, country = $3, website = $4, phone = $5
            WHERE id = $6
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.code)
        .bind(&draft.country)
        .bind(&draft.website)
        .bind(&draft.phone)
        .bind(db_id("update", id)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&mut self, id: CompanyId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(db_id("delete", id)?)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get(&mut self, id: CompanyId) -> Result<Option<Company>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_COMPANY} WHERE id = $1"))
            .bind(db_id("get", id)?)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(|r| company_from_row("get", r)).transpose()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// `%needle%` with LIKE metacharacters in `needle` matched literally.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn db_id(operation: &'static str, id: CompanyId) -> Result<i64, StoreError> {
    i64::try_from(id.get()).map_err(|_| StoreError::Corrupt {
        operation,
        message: format!("company id {id} out of range"),
    })
}

fn domain_id(operation: &'static str, id: i64) -> Result<CompanyId, StoreError> {
    u64::try_from(id)
        .map(CompanyId::new)
        .map_err(|_| StoreError::Corrupt {
            operation,
            message: format!("negative company id {id}"),
        })
}

fn company_from_row(operation: &'static str, row: &PgRow) -> Result<Company, StoreError> {
    let id: i64 = row.try_get("id").map_err(|e| map_sqlx_error(operation, e))?;
    let text = |column: &str| -> Result<String, StoreError> {
        row.try_get(column).map_err(|e| map_sqlx_error(operation, e))
    };

    Ok(Company {
        id: domain_id(operation, id)?,
        name: text("name")?,
        code: text("code")?,
        country: text("country")?,
        website: text("website")?,
        phone: text("phone")?,
    })
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::Query {
            operation,
            message: db_err.message().to_string(),
        },
        sqlx::Error::PoolClosed => StoreError::Connection {
            operation,
            message: "connection pool closed".to_string(),
        },
        sqlx::Error::PoolTimedOut => StoreError::Connection {
            operation,
            message: "timed out acquiring connection".to_string(),
        },
        e @ (sqlx::Error::Io(_) | sqlx::Error::Tls(_)) => StoreError::Connection {
            operation,
            message: e.to_string(),
        },
        e @ (sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::TypeNotFound { .. }) => StoreError::Corrupt {
            operation,
            message: e.to_string(),
        },
        other => StoreError::Query {
            operation,
            message: other.to_string(),
        },
    }
}
