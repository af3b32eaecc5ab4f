//! Credential store backed by static tables loaded at startup

use std::collections::HashMap;

use super::{Client, CredentialStore, User};
use crate::error::StoreError;
use crate::scope::ScopeSet;

/// Clients and users fixed for the process lifetime
#[derive(Debug, Default)]
pub struct StaticCredentialStore {
    clients: HashMap<String, Client>,
    users: HashMap<String, User>,
}

impl StaticCredentialStore {
    /// Build the tables. Later entries replace earlier ones with the same id.
    pub fn new(
        clients: impl IntoIterator<Item = Client>,
        users: impl IntoIterator<Item = User>,
    ) -> Self {
        let clients: HashMap<_, _> = clients
            .into_iter()
            .map(|c| (c.client_id.clone(), c))
            .collect();
        let users: HashMap<_, _> = users
            .into_iter()
            .map(|u| (u.username.clone(), u))
            .collect();
        tracing::info!(
            "Loaded {} static clients and {} static users",
            clients.len(),
            users.len()
        );
        Self { clients, users }
    }
}

impl CredentialStore for StaticCredentialStore {
    fn find_client(&self, client_id: &str) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.get(client_id).cloned())
    }

    fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(username).cloned())
    }

    fn client_scopes(&self) -> Result<ScopeSet, StoreError> {
        Ok(self
            .clients
            .values()
            .flat_map(|c| c.scopes.iter().cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::GrantType;

    fn store() -> StaticCredentialStore {
        StaticCredentialStore::new(
            [Client {
                client_id: "webapp".into(),
                client_secret: "{noop}secret".into(),
                authorized_grant_types: [GrantType::Password].into(),
                scopes: ["read".to_string()].into(),
            }],
            [
                User {
                    username: "user1".into(),
                    password: "{noop}password".into(),
                    roles: ["USER".to_string()].into(),
                    enabled: true,
                },
                User {
                    username: "ghost".into(),
                    password: "{noop}password".into(),
                    roles: Default::default(),
                    enabled: false,
                },
            ],
        )
    }

    #[test]
    fn test_find_and_verify_client() {
        let store = store();
        let client = store.find_client("webapp").unwrap().unwrap();
        assert!(store.verify_client_secret(&client, "secret"));
        assert!(!store.verify_client_secret(&client, "wrong"));
        assert!(store.find_client("other").unwrap().is_none());
    }

    #[test]
    fn test_find_and_verify_user() {
        let store = store();
        let user = store.find_user("user1").unwrap().unwrap();
        assert!(store.verify_user_password(&user, "password"));
        assert!(!store.verify_user_password(&user, "nope"));
        assert!(store.find_user("nobody").unwrap().is_none());
    }

    #[test]
    fn test_client_scopes() {
        assert_eq!(store().client_scopes().unwrap(), ScopeSet::from(["read".to_string()]));
    }

    #[test]
    fn test_disabled_user_never_verifies() {
        let store = store();
        let user = store.find_user("ghost").unwrap().unwrap();
        assert!(!store.verify_user_password(&user, "password"));
    }
}
