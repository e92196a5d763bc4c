use rand::Rng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Upper bound (exclusive) for randomly generated account numbers.
pub const ACCOUNT_NUMBER_LIMIT: i32 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub number: i32,
    pub balance: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// An account which has not yet been persisted and hence has no ID.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub number: i32,
    pub balance: f64,
    pub created_at: OffsetDateTime,
}

impl NewAccount {
    /// Create a new account with a random account number, zero balance and the current UTC time as
    /// creation timestamp.
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            number: random_account_number(),
            balance: 0.0,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Replace the account number with a freshly generated one.
    pub fn renumber(&mut self) {
        self.number = random_account_number();
    }
}

/// Changes to the display fields of an existing account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountUpdate {
    pub first_name: String,
    pub last_name: String,
}

/// Generate a random account number in `0..ACCOUNT_NUMBER_LIMIT`. Uniqueness is not checked here.
pub fn random_account_number() -> i32 {
    rand::thread_rng().gen_range(0..ACCOUNT_NUMBER_LIMIT)
}

#[cfg(test)]
mod tests {
    use crate::domain::{random_account_number, NewAccount, ACCOUNT_NUMBER_LIMIT};
    use time::OffsetDateTime;

    #[test]
    fn test_new_account() {
        let before = OffsetDateTime::now_utc();
        let account = NewAccount::new("Jane", "Doe");

        assert_eq!(account.first_name, "Jane");
        assert_eq!(account.last_name, "Doe");
        assert_eq!(account.balance, 0.0);
        assert!((0..ACCOUNT_NUMBER_LIMIT).contains(&account.number));
        assert!(account.created_at >= before);
        assert!(account.created_at.offset().is_utc());
    }

    #[test]
    fn test_new_account_accepts_empty_names() {
        let account = NewAccount::new("", "");
        assert!(account.first_name.is_empty());
        assert!(account.last_name.is_empty());
    }

    #[test]
    fn test_random_account_number() {
        for _ in 0..1_000 {
            let number = random_account_number();
            assert!((0..ACCOUNT_NUMBER_LIMIT).contains(&number));
        }
    }
}
