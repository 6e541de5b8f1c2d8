//! Login: checks a username/password pair against the stored account of the requested role and
//! hands out an access token.
use std::sync::Arc;

use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::{
    database::{Store, find_account, insert_account},
    error::{AppError, DenyReason},
    models::Role,
    token::TokenIssuer,
};

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str, salt: &str) -> String;

    fn verify(&self, password: &str, salt: &str, expected: &str) -> bool {
        self.hash(password, salt) == expected
    }
}

/// Salted SHA-256, hex encoded.
pub struct Sha256Hasher;

impl PasswordHasher for Sha256Hasher {
    fn hash(&self, password: &str, salt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());

        hex::encode(hasher.finalize())
    }
}

pub struct Credentials {
    store: Arc<Store>,
    tokens: Arc<TokenIssuer>,
    hasher: Arc<dyn PasswordHasher>,
}

impl Credentials {
    pub fn new(store: Arc<Store>, tokens: Arc<TokenIssuer>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            store,
            tokens,
            hasher,
        }
    }

    pub fn login(&self, username: &str, password: &str, role: Role) -> Result<String, AppError> {
        let account = self.store.read(|conn| find_account(conn, username, role))?;

        let Some(account) = account else {
            warn!(username, %role, "Login for unknown account");
            return Err(AppError::Denied(DenyReason::BadCredentials));
        };

        if !self
            .hasher
            .verify(password, &account.salt, &account.password_hash)
        {
            warn!(username, %role, "Login with wrong password");
            return Err(AppError::Denied(DenyReason::BadCredentials));
        }

        info!(account = account.id, %role, "Login succeeded");
        self.tokens.issue(account.id, role)
    }

    pub fn register(&self, username: &str, password: &str, role: Role) -> Result<i64, AppError> {
        register(&self.store, self.hasher.as_ref(), username, password, role)
    }
}

pub fn register(
    store: &Store,
    hasher: &dyn PasswordHasher,
    username: &str,
    password: &str,
    role: Role,
) -> Result<i64, AppError> {
    let salt = new_salt();
    let hash = hasher.hash(password, &salt);

    let id = store.write(|tx| insert_account(tx, username, role, &hash, &salt))?;

    info!(account = id, %role, "Account registered");
    Ok(id)
}

/// 16 bytes from the OS generator, hex encoded.
fn new_salt() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);

    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn credentials() -> (Credentials, Arc<TokenIssuer>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let tokens = Arc::new(TokenIssuer::new(b"login-secret", Duration::from_secs(60)));

        (
            Credentials::new(store, tokens.clone(), Arc::new(Sha256Hasher)),
            tokens,
        )
    }

    #[test]
    fn test_login_issues_token_for_role() {
        let (credentials, tokens) = credentials();
        let id = credentials.register("user", "user", Role::User).unwrap();

        let token = credentials.login("user", "user", Role::User).unwrap();
        let principal = tokens.verify(&token).unwrap();
        assert_eq!(principal.id, id);
        assert_eq!(principal.role, Role::User);
    }

    #[test]
    fn test_login_rejects_wrong_password_and_role() {
        let (credentials, _) = credentials();
        credentials.register("chef", "chef", Role::Chef).unwrap();

        assert!(matches!(
            credentials.login("chef", "nope", Role::Chef),
            Err(AppError::Denied(DenyReason::BadCredentials))
        ));
        assert!(matches!(
            credentials.login("chef", "chef", Role::User),
            Err(AppError::Denied(_))
        ));
    }

    #[test]
    fn test_salts_are_random() {
        let first = new_salt();

        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, new_salt());
    }

    #[test]
    fn test_same_password_stores_different_hashes() {
        let (credentials, _) = credentials();
        credentials.register("twin", "secret", Role::User).unwrap();
        credentials.register("twin", "secret", Role::Chef).unwrap();

        let (user, chef) = credentials
            .store
            .read(|conn| {
                Ok((
                    find_account(conn, "twin", Role::User)?,
                    find_account(conn, "twin", Role::Chef)?,
                ))
            })
            .unwrap();
        let (user, chef) = (user.unwrap(), chef.unwrap());

        assert_ne!(user.salt, chef.salt);
        assert_ne!(user.password_hash, chef.password_hash);
        assert!(credentials.login("twin", "secret", Role::Chef).is_ok());
    }

    #[test]
    fn test_hash_depends_on_salt() {
        let hasher = Sha256Hasher;
        assert_ne!(hasher.hash("pw", "a"), hasher.hash("pw", "b"));
        assert!(hasher.verify("pw", "a", &hasher.hash("pw", "a")));
    }
}
