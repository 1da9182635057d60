use std::collections::HashSet;

use serde_json::json;

use crate::app::{App, RequestContext};
use crate::common::errors::AppError;
use crate::common::helpers::{new_id, now};
use crate::common::store::{KvStore, KvStoreExt};
use crate::config::{comment_key, post_comments_key};
use crate::feed::ViewBuilder;
use crate::forms::{parse_form, CommentForm, FormErrors};
use crate::models::models::{Comment, Post};
use crate::policy::require_login;
use crate::posts::{all_posts, post_url, resolve_post};
use crate::views::View;

pub fn add_comment(store: &dyn KvStore, post_id: &str, author_id: &str, text: &str) -> anyhow::Result<Comment> {
    let comment = Comment {
        id: new_id(),
        post_id: Some(post_id.to_string()),
        author_id: author_id.to_string(),
        text: text.to_string(),
        created_at: now(),
    };
    store.set_json(&comment_key(&comment.id), &comment)?;

    store.update_json(&post_comments_key(post_id), |ids: &mut Vec<String>| {
        ids.insert(0, comment.id.clone())
    })?;

    tracing::info!(comment_id = %comment.id, %post_id, "comment added");
    Ok(comment)
}

/// Comments on a post, newest first.
pub fn comments_for_post(store: &dyn KvStore, post_id: &str) -> anyhow::Result<Vec<Comment>> {
    let ids: Vec<String> = store.get_json(&post_comments_key(post_id))?.unwrap_or_default();
    let mut comments = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(comment) = store.get_json::<Comment>(&comment_key(&id))? {
            comments.push(comment);
        }
    }
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(comments)
}

pub fn delete_post_comments(store: &dyn KvStore, post_id: &str) -> anyhow::Result<()> {
    let list_key = post_comments_key(post_id);
    let ids: Vec<String> = store.get_json(&list_key)?.unwrap_or_default();
    for id in ids {
        store.delete(&comment_key(&id))?;
    }
    store.delete(&list_key)
}

pub fn delete_comments_by_author(store: &dyn KvStore, author_id: &str) -> anyhow::Result<()> {
    for post in all_posts(store)? {
        let list_key = post_comments_key(&post.id);
        let ids: Vec<String> = store.get_json(&list_key)?.unwrap_or_default();
        let mut dropped = HashSet::new();
        for id in ids {
            match store.get_json::<Comment>(&comment_key(&id))? {
                Some(comment) if comment.author_id == author_id => {
                    store.delete(&comment_key(&id))?;
                    dropped.insert(id);
                }
                Some(_) => {}
                None => {
                    dropped.insert(id);
                }
            }
        }
        if !dropped.is_empty() {
            store.update_json(&list_key, |ids: &mut Vec<String>| ids.retain(|id| !dropped.contains(id)))?;
        }
    }
    Ok(())
}

fn comment_form_view(app: &App, form: &CommentForm, errors: &FormErrors, post: &Post) -> Result<View, AppError> {
    let post = ViewBuilder::new(app.store).post(post.clone())?;
    Ok(View::render(
        "posts/comments.html",
        json!({ "form": form.context(errors), "post": post }),
    ))
}

pub fn add_comment_view(app: &App, ctx: &RequestContext, username: &str, post_id: &str) -> Result<View, AppError> {
    let user = require_login(ctx)?;
    let (author, post) = resolve_post(app.store, username, post_id)?;

    if !ctx.is_submit {
        return comment_form_view(app, &CommentForm::default(), &FormErrors::new(), &post);
    }

    let form: CommentForm = match parse_form(ctx.body) {
        Ok(form) => form,
        Err(errors) => return comment_form_view(app, &CommentForm::default(), &errors, &post),
    };
    let text = match form.validate() {
        Ok(text) => text,
        Err(errors) => return comment_form_view(app, &form, &errors, &post),
    };

    add_comment(app.store, &post.id, &user.id, &text)?;
    Ok(View::redirect(post_url(&author.username, &post.id)))
}
