use serde_json::json;

use crate::app::{App, RequestContext};
use crate::common::errors::AppError;
use crate::common::helpers::is_local_path;
use crate::common::query_params::get_string;
use crate::common::store::{KvStore, KvStoreExt};
use crate::config::followings_key;
use crate::feed::{feed_page, FeedFilter};
use crate::models::models::{Follow, Followings};
use crate::policy::{can_follow, require_login};
use crate::posts::profile_url;
use crate::users::{find_by_username, list_users};
use crate::views::View;

/// Adds the edge unless it exists or would point at the follower.
/// Returns whether an edge was written.
pub fn follow_author(store: &dyn KvStore, user_id: &str, author_id: &str) -> anyhow::Result<bool> {
    if user_id == author_id {
        return Ok(false);
    }

    let added = store.update_json(&followings_key(user_id), |followings: &mut Followings| {
        if followings.iter().any(|id| id == author_id) {
            return false;
        }
        followings.push(author_id.to_string());
        true
    })?;
    if added {
        tracing::info!(%user_id, %author_id, "follow edge added");
    }
    Ok(added)
}

/// Removing a missing edge is a no-op.
pub fn unfollow_author(store: &dyn KvStore, user_id: &str, author_id: &str) -> anyhow::Result<bool> {
    let removed = store.update_json(&followings_key(user_id), |followings: &mut Followings| {
        let before = followings.len();
        followings.retain(|id| id != author_id);
        followings.len() != before
    })?;
    if removed {
        tracing::info!(%user_id, %author_id, "follow edge removed");
    }
    Ok(removed)
}

pub fn is_following(store: &dyn KvStore, user_id: &str, author_id: &str) -> anyhow::Result<bool> {
    Ok(get_followings(store, user_id)?.iter().any(|id| id == author_id))
}

pub fn get_followings(store: &dyn KvStore, user_id: &str) -> anyhow::Result<Followings> {
    Ok(store.get_json(&followings_key(user_id))?.unwrap_or_default())
}

pub fn get_followers(store: &dyn KvStore, user_id: &str) -> anyhow::Result<Vec<String>> {
    let mut followers = Vec::new();
    for user in list_users(store)? {
        if is_following(store, &user.id, user_id)? {
            followers.push(user.id);
        }
    }
    Ok(followers)
}

pub fn follow_edges(store: &dyn KvStore, user_id: &str) -> anyhow::Result<Vec<Follow>> {
    Ok(get_followings(store, user_id)?
        .into_iter()
        .map(|author_id| Follow {
            user_id: user_id.to_string(),
            author_id,
        })
        .collect())
}

/// Drops every edge the user takes part in, on either end.
pub fn remove_all_edges(store: &dyn KvStore, user_id: &str) -> anyhow::Result<()> {
    for follower in get_followers(store, user_id)? {
        unfollow_author(store, &follower, user_id)?;
    }
    store.delete(&followings_key(user_id))
}

// === HTTP Handlers ===

fn follow_redirect(ctx: &RequestContext, username: &str) -> View {
    match get_string(&ctx.params, "next", None) {
        Some(next) if is_local_path(&next) => View::redirect(next),
        _ => View::redirect(profile_url(username)),
    }
}

pub fn profile_follow(app: &App, ctx: &RequestContext, username: &str) -> Result<View, AppError> {
    let user = require_login(ctx)?;
    let author = find_by_username(app.store, username)?
        .ok_or_else(|| AppError::not_found(format!("user {}", username)))?;

    if can_follow(user, &author) {
        follow_author(app.store, &user.id, &author.id)?;
    }
    Ok(follow_redirect(ctx, &author.username))
}

pub fn profile_unfollow(app: &App, ctx: &RequestContext, username: &str) -> Result<View, AppError> {
    let user = require_login(ctx)?;
    let author = find_by_username(app.store, username)?
        .ok_or_else(|| AppError::not_found(format!("user {}", username)))?;

    unfollow_author(app.store, &user.id, &author.id)?;
    Ok(follow_redirect(ctx, &author.username))
}

pub fn follow_index(app: &App, ctx: &RequestContext) -> Result<View, AppError> {
    let user = require_login(ctx)?;
    let page = feed_page(app.store, app.paginator(), FeedFilter::FollowedBy(&user.id), ctx.page_param())?;
    Ok(View::render("posts/follow.html", json!({ "page": page })))
}
