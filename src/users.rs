use std::collections::BTreeMap;

use crate::auth::revoke_user_tokens;
use crate::comments::delete_comments_by_author;
use crate::common::helpers::new_id;
use crate::common::store::{KvStore, KvStoreExt};
use crate::config::{user_key, RESERVED_USERNAMES, USERNAMES_KEY, USERS_LIST_KEY};
use crate::follow::remove_all_edges;
use crate::models::models::User;
use crate::posts::{delete_post, posts_by_author};

pub fn get_user(store: &dyn KvStore, user_id: &str) -> anyhow::Result<Option<User>> {
    store.get_json(&user_key(user_id))
}

pub fn list_users(store: &dyn KvStore) -> anyhow::Result<Vec<User>> {
    let ids: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    let mut users = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(user) = get_user(store, &id)? {
            users.push(user);
        }
    }
    Ok(users)
}

type UsernameIndex = BTreeMap<String, String>;

pub fn find_by_username(store: &dyn KvStore, username: &str) -> anyhow::Result<Option<User>> {
    let index: UsernameIndex = store.get_json(USERNAMES_KEY)?.unwrap_or_default();
    match index.get(username) {
        Some(user_id) => get_user(store, user_id),
        None => Ok(None),
    }
}

/// Creates the identity record the authentication subsystem would own.
/// Used for seeding and tests; the board exposes no sign-up route.
pub fn register_user(store: &dyn KvStore, username: &str) -> anyhow::Result<User> {
    let username = username.trim();
    if username.is_empty() || username.contains('/') {
        anyhow::bail!("Invalid username {:?}", username);
    }
    if RESERVED_USERNAMES.contains(&username) {
        anyhow::bail!("Username is reserved: {}", username);
    }

    let user = User {
        id: new_id(),
        username: username.to_string(),
    };
    let claimed = store.update_json(USERNAMES_KEY, |index: &mut UsernameIndex| {
        if index.contains_key(username) {
            return false;
        }
        index.insert(username.to_string(), user.id.clone());
        true
    })?;
    if !claimed {
        anyhow::bail!("Username exists: {}", username);
    }

    store.set_json(&user_key(&user.id), &user)?;
    store.update_json(USERS_LIST_KEY, |ids: &mut Vec<String>| ids.push(user.id.clone()))?;

    Ok(user)
}

/// Removes a user and everything that cannot outlive them: their posts (with
/// those posts' comments), their comments elsewhere, follow edges in both
/// directions and their tokens.
pub fn delete_user(store: &dyn KvStore, user_id: &str) -> anyhow::Result<bool> {
    let user = match get_user(store, user_id)? {
        Some(user) => user,
        None => return Ok(false),
    };

    for post in posts_by_author(store, user_id)? {
        delete_post(store, &post.id)?;
    }
    delete_comments_by_author(store, user_id)?;
    remove_all_edges(store, user_id)?;
    revoke_user_tokens(store, user_id)?;

    store.delete(&user_key(user_id))?;
    store.update_json(USERS_LIST_KEY, |ids: &mut Vec<String>| ids.retain(|id| id != user_id))?;
    store.update_json(USERNAMES_KEY, |index: &mut UsernameIndex| {
        index.remove(&user.username);
    })?;

    tracing::info!(%user_id, "user deleted with dependent records");
    Ok(true)
}
