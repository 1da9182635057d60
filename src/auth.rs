use std::collections::HashSet;

use spin_sdk::http::Request;

use crate::common::helpers::{new_id, now};
use crate::common::store::{KvStore, KvStoreExt};
use crate::config::{token_key, TOKENS_LIST_KEY};
use crate::models::models::{TokenData, User};
use crate::users::get_user;

/// Resolves the caller of a request. Credentials, login and logout belong to
/// the authentication subsystem; the board only asks "who is this?".
pub trait IdentityProvider {
    fn authenticate(&self, store: &dyn KvStore, req: &Request) -> anyhow::Result<Option<User>>;
}

/// Bearer tokens written by the authentication subsystem under `token:<t>`.
pub struct TokenIdentity {
    expiration_hours: i64,
}

impl TokenIdentity {
    pub fn new(expiration_hours: i64) -> Self {
        Self { expiration_hours }
    }
}

fn bearer_token(req: &Request) -> Option<&str> {
    let auth_header = req.header("authorization")?.as_str()?;
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl IdentityProvider for TokenIdentity {
    fn authenticate(&self, store: &dyn KvStore, req: &Request) -> anyhow::Result<Option<User>> {
        let token = match bearer_token(req) {
            Some(token) => token,
            None => return Ok(None),
        };

        let data = match store.get_json::<TokenData>(&token_key(token))? {
            Some(data) => data,
            None => return Ok(None),
        };

        let age_hours = (now() - data.created_at).num_hours();
        if age_hours > self.expiration_hours {
            tracing::debug!(user_id = %data.user_id, "expired token presented");
            return Ok(None);
        }

        // Tokens of deleted users stop resolving.
        get_user(store, &data.user_id)
    }
}

/// Records a fresh token for `user_id`, as the login flow would.
pub fn issue_token(store: &dyn KvStore, user_id: &str) -> anyhow::Result<String> {
    let token = new_id();
    let data = TokenData {
        user_id: user_id.to_string(),
        created_at: now(),
    };
    store.set_json(&token_key(&token), &data)?;

    store.update_json(TOKENS_LIST_KEY, |tokens: &mut Vec<String>| tokens.push(token.clone()))?;

    Ok(token)
}

pub fn revoke_user_tokens(store: &dyn KvStore, user_id: &str) -> anyhow::Result<()> {
    let tokens: Vec<String> = store.get_json(TOKENS_LIST_KEY)?.unwrap_or_default();
    let mut dropped = HashSet::new();

    for token in tokens {
        let key = token_key(&token);
        match store.get_json::<TokenData>(&key)? {
            Some(data) if data.user_id == user_id => {
                store.delete(&key)?;
                dropped.insert(token);
            }
            Some(_) => {}
            None => {
                dropped.insert(token);
            }
        }
    }

    // Tokens issued meanwhile are kept.
    store.update_json(TOKENS_LIST_KEY, |tokens: &mut Vec<String>| {
        tokens.retain(|token| !dropped.contains(token))
    })
}
