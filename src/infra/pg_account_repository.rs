use crate::domain::{self, AccountRepository, AccountUpdate, NewAccount};
use futures::{Stream, TryStreamExt};
use sqlx::{prelude::FromRow, PgPool, QueryBuilder};
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

const CREATE_ACCOUNT_TABLE: &str = "CREATE TABLE IF NOT EXISTS account (
    id         SERIAL PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name  TEXT NOT NULL,
    number     INTEGER NOT NULL UNIQUE,
    balance    DOUBLE PRECISION NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
)";

const INSERT_ACCOUNT: &str = "INSERT INTO account (first_name, last_name, number, balance, created_at)
VALUES ($1, $2, $3, $4, $5)
RETURNING *";

/// Name Postgres derives for the unique constraint on `account.number`.
const NUMBER_CONSTRAINT: &str = "account_number_key";

const MAX_CREATE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the account table unless it already exists.
    #[instrument(skip(self))]
    pub async fn init(&self) -> Result<(), sqlx::Error> {
        sqlx::query(CREATE_ACCOUNT_TABLE)
            .execute(&self.pool)
            .await?;
        debug!("account table ready");
        Ok(())
    }
}

impl AccountRepository for PgAccountRepository {
    type Error = sqlx::Error;

    #[instrument(skip(self))]
    async fn accounts(
        &self,
    ) -> Result<impl Stream<Item = Result<domain::Account, Self::Error>> + Send, Self::Error> {
        let accounts = sqlx::query_as::<_, Account>("SELECT * FROM account")
            .fetch(&self.pool)
            .map_ok(domain::Account::from);
        Ok(accounts)
    }

    #[instrument(skip(self))]
    async fn account_by_id(&self, id: i32) -> Result<Option<domain::Account>, Self::Error> {
        let account = QueryBuilder::new("SELECT * FROM account WHERE id = ")
            .push_bind(id)
            .build_query_as::<Account>()
            .fetch_optional(&self.pool)
            .await?;
        let account = account.map(domain::Account::from);
        Ok(account)
    }

    #[instrument(skip(self))]
    async fn create_account(
        &self,
        mut account: NewAccount,
    ) -> Result<domain::Account, Self::Error> {
        let mut attempt = 1;

        loop {
            let result = sqlx::query_as::<_, Account>(INSERT_ACCOUNT)
                .bind(account.first_name.as_str())
                .bind(account.last_name.as_str())
                .bind(account.number)
                .bind(account.balance)
                .bind(account.created_at)
                .fetch_one(&self.pool)
                .await;

            match result {
                Ok(account) => {
                    info!(id = account.id, number = account.number, "inserted account");
                    return Ok(account.into());
                }

                Err(error) if is_number_conflict(&error) && attempt < MAX_CREATE_ATTEMPTS => {
                    warn!(number = account.number, attempt, "account number taken, retrying");
                    account.renumber();
                    attempt += 1;
                }

                Err(error) => return Err(error),
            }
        }
    }

    #[instrument(skip(self))]
    async fn update_account(
        &self,
        id: i32,
        update: AccountUpdate,
    ) -> Result<Option<domain::Account>, Self::Error> {
        let AccountUpdate {
            first_name,
            last_name,
        } = update;

        let account = QueryBuilder::new("UPDATE account SET first_name = ")
            .push_bind(first_name)
            .push(", last_name = ")
            .push_bind(last_name)
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING *")
            .build_query_as::<Account>()
            .fetch_optional(&self.pool)
            .await?;

        if account.is_some() {
            info!(id, "updated account");
        }
        Ok(account.map(domain::Account::from))
    }

    #[instrument(skip(self))]
    async fn delete_account(&self, id: i32) -> Result<Option<domain::Account>, Self::Error> {
        let account = QueryBuilder::new("DELETE FROM account WHERE id = ")
            .push_bind(id)
            .push(" RETURNING *")
            .build_query_as::<Account>()
            .fetch_optional(&self.pool)
            .await?;

        if account.is_some() {
            info!(id, "deleted account");
        }
        Ok(account.map(domain::Account::from))
    }
}

fn is_number_conflict(error: &sqlx::Error) -> bool {
    error.as_database_error().is_some_and(|error| {
        error.is_unique_violation() && error.constraint() == Some(NUMBER_CONSTRAINT)
    })
}

#[derive(Debug, FromRow)]
struct Account {
    id: i32,
    first_name: String,
    last_name: String,
    number: i32,
    balance: f64,
    created_at: OffsetDateTime,
}

impl From<Account> for domain::Account {
    fn from(
        Account {
            id,
            first_name,
            last_name,
            number,
            balance,
            created_at,
        }: Account,
    ) -> Self {
        domain::Account {
            id,
            first_name,
            last_name,
            number,
            balance,
            created_at,
        }
    }
}
