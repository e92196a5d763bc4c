use crate::domain::{Account, AccountUpdate, NewAccount};
use futures::Stream;
use std::error::Error as StdError;

/// Storage gateway for accounts. Lookups by ID signal a missing record with `None`.
#[trait_variant::make(Send)]
pub trait AccountRepository
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// All accounts in storage-defined order.
    async fn accounts(
        &self,
    ) -> Result<impl Stream<Item = Result<Account, Self::Error>> + Send, Self::Error>;

    async fn account_by_id(&self, id: i32) -> Result<Option<Account>, Self::Error>;

    /// Persist the given new account and return it including its assigned ID.
    async fn create_account(&self, account: NewAccount) -> Result<Account, Self::Error>;

    async fn update_account(
        &self,
        id: i32,
        update: AccountUpdate,
    ) -> Result<Option<Account>, Self::Error>;

    /// Delete the account with the given ID and return it.
    async fn delete_account(&self, id: i32) -> Result<Option<Account>, Self::Error>;
}
