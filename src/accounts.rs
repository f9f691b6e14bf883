use tracing::{info, instrument};

use crate::{
    ChatError, Username,
    store::{Collection, CollectionStore, fields},
};

const USERNAME: &str = "username";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub username: String,
}

/// Sign-up and login against the accounts collection. There are no
/// credentials; knowing a registered username is enough.
#[derive(Clone)]
pub struct AccountClient<S> {
    store: S,
}

impl<S: CollectionStore> AccountClient<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn sign_up(&self, username: &str) -> Result<Account, ChatError> {
        let username = Username::parse(username)?;
        let record = self
            .store
            .create(Collection::Accounts, fields([(USERNAME, username.as_str())]))
            .await?;
        info!(id = record.id, "account created");
        Ok(Account {
            id: record.id,
            username: username.to_string(),
        })
    }

    /// First account whose username matches ignoring case, if any.
    #[instrument(skip(self))]
    pub async fn login(&self, username: &str) -> Result<Option<Account>, ChatError> {
        let username = Username::parse(username)?;
        let matches = self
            .store
            .find_eqi(Collection::Accounts, USERNAME, username.as_str())
            .await?;
        Ok(matches.into_iter().next().map(|r| Account {
            id: r.id,
            username: r.str_attr(USERNAME).unwrap_or_default().to_owned(),
        }))
    }
}
