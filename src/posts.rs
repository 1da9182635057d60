use chrono::{DateTime, Utc};
use serde_json::json;

use crate::app::{App, RequestContext};
use crate::comments::{comments_for_post, delete_post_comments};
use crate::common::errors::AppError;
use crate::common::helpers::{new_id, now, validate_uuid};
use crate::common::store::{KvStore, KvStoreExt};
use crate::config::{media_key, post_key, FEED_KEY};
use crate::feed::{feed_page, FeedFilter, ViewBuilder};
use crate::follow::is_following;
use crate::forms::{parse_form, CleanImage, CleanPost, CommentForm, FormErrors, PostForm};
use crate::groups::{get_group, list_groups};
use crate::models::models::{CommentView, Post, User};
use crate::policy::{can_edit_post, require_login};
use crate::users::find_by_username;
use crate::views::View;

pub fn post_url(username: &str, post_id: &str) -> String {
    format!("/{}/{}/", username, post_id)
}

pub fn profile_url(username: &str) -> String {
    format!("/{}/", username)
}

// === Repository ===

pub struct NewPost {
    pub author_id: String,
    pub text: String,
    pub group: Option<String>,
    pub image: Option<CleanImage>,
}

fn save_image(store: &dyn KvStore, image: &CleanImage) -> anyhow::Result<String> {
    let name = format!("posts/{}.{}", new_id(), image.extension);
    store.set(&media_key(&name), &image.bytes)?;
    Ok(name)
}

pub fn get_image(store: &dyn KvStore, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
    store.get(&media_key(name))
}

pub fn create_post(store: &dyn KvStore, new: NewPost) -> anyhow::Result<Post> {
    insert_post(store, new, now())
}

/// Stores a post with the given creation time; `create_post` stamps "now".
pub fn insert_post(store: &dyn KvStore, new: NewPost, created_at: DateTime<Utc>) -> anyhow::Result<Post> {
    let image = match &new.image {
        Some(image) => Some(save_image(store, image)?),
        None => None,
    };

    let post = Post {
        id: new_id(),
        author_id: new.author_id,
        text: new.text,
        created_at,
        group: new.group,
        image,
    };
    store.set_json(&post_key(&post.id), &post)?;

    // prepend newest
    store.update_json(FEED_KEY, |feed: &mut Vec<String>| feed.insert(0, post.id.clone()))?;

    tracing::info!(post_id = %post.id, author_id = %post.author_id, "post created");
    Ok(post)
}

pub fn get_post(store: &dyn KvStore, post_id: &str) -> anyhow::Result<Option<Post>> {
    if !validate_uuid(post_id) {
        return Ok(None);
    }
    store.get_json(&post_key(post_id))
}

/// Every post, newest first.
pub fn all_posts(store: &dyn KvStore) -> anyhow::Result<Vec<Post>> {
    let feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    let mut posts = Vec::with_capacity(feed.len());
    for id in feed {
        if let Some(post) = store.get_json::<Post>(&post_key(&id))? {
            posts.push(post);
        }
    }
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(posts)
}

pub fn posts_by_author(store: &dyn KvStore, author_id: &str) -> anyhow::Result<Vec<Post>> {
    Ok(all_posts(store)?
        .into_iter()
        .filter(|p| p.author_id == author_id)
        .collect())
}

/// Applies an edit. Author, id and creation time never change.
pub fn update_post(store: &dyn KvStore, post: &mut Post, clean: CleanPost) -> anyhow::Result<()> {
    post.text = clean.text;
    post.group = clean.group;

    if clean.image.is_some() || clean.image_clear {
        if let Some(old) = post.image.take() {
            store.delete(&media_key(&old))?;
        }
    }
    if let Some(image) = &clean.image {
        post.image = Some(save_image(store, image)?);
    }

    store.set_json(&post_key(&post.id), post)?;
    tracing::info!(post_id = %post.id, "post updated");
    Ok(())
}

/// Deletes a post together with its comments and image.
pub fn delete_post(store: &dyn KvStore, post_id: &str) -> anyhow::Result<bool> {
    let post = match get_post(store, post_id)? {
        Some(post) => post,
        None => return Ok(false),
    };

    delete_post_comments(store, post_id)?;
    if let Some(image) = &post.image {
        store.delete(&media_key(image))?;
    }
    store.delete(&post_key(post_id))?;

    store.update_json(FEED_KEY, |feed: &mut Vec<String>| feed.retain(|id| id != post_id))?;

    tracing::info!(%post_id, "post deleted");
    Ok(true)
}

/// Looks a post up by its URL pair. A post that exists but belongs to a
/// different author is treated as missing.
pub fn resolve_post(store: &dyn KvStore, username: &str, post_id: &str) -> Result<(User, Post), AppError> {
    let author = find_by_username(store, username)?
        .ok_or_else(|| AppError::not_found(format!("user {}", username)))?;
    let post = get_post(store, post_id)?
        .filter(|post| post.author_id == author.id)
        .ok_or_else(|| AppError::not_found(format!("post {}", post_id)))?;
    Ok((author, post))
}

// === Handlers ===

pub fn index(app: &App, ctx: &RequestContext) -> Result<View, AppError> {
    let page = feed_page(app.store, app.paginator(), FeedFilter::All, ctx.page_param())?;
    Ok(View::render("posts/index.html", json!({ "page": page })))
}

pub fn group_posts(app: &App, ctx: &RequestContext, slug: &str) -> Result<View, AppError> {
    let group = get_group(app.store, slug)?
        .ok_or_else(|| AppError::not_found(format!("group {}", slug)))?;
    let page = feed_page(app.store, app.paginator(), FeedFilter::Group(&group.slug), ctx.page_param())?;
    Ok(View::render(
        "group.html",
        json!({ "group": group, "page": page }),
    ))
}

pub fn profile(app: &App, ctx: &RequestContext, username: &str) -> Result<View, AppError> {
    let author = find_by_username(app.store, username)?
        .ok_or_else(|| AppError::not_found(format!("user {}", username)))?;
    let page = feed_page(app.store, app.paginator(), FeedFilter::Author(&author.id), ctx.page_param())?;
    let following = match &ctx.user {
        Some(user) if user.id != author.id => is_following(app.store, &user.id, &author.id)?,
        _ => false,
    };
    Ok(View::render(
        "posts/profile.html",
        json!({ "author": author, "page": page, "following": following }),
    ))
}

pub fn post_view(app: &App, _ctx: &RequestContext, username: &str, post_id: &str) -> Result<View, AppError> {
    let (author, post) = resolve_post(app.store, username, post_id)?;
    let mut views = ViewBuilder::new(app.store);

    let mut comments = Vec::new();
    for comment in comments_for_post(app.store, &post.id)? {
        comments.push(CommentView {
            author: views.username(&comment.author_id)?,
            id: comment.id,
            text: comment.text,
            created_at: comment.created_at,
        });
    }

    Ok(View::render(
        "posts/post.html",
        json!({
            "author": author,
            "post": views.post(post)?,
            "comments": comments,
            "form": CommentForm::default().context(&FormErrors::new()),
        }),
    ))
}

fn post_form_view(app: &App, form: &PostForm, errors: &FormErrors, post: Option<&Post>) -> Result<View, AppError> {
    let post = match post {
        Some(post) => Some(ViewBuilder::new(app.store).post(post.clone())?),
        None => None,
    };
    Ok(View::render(
        "posts/new_post.html",
        json!({
            "form": form.context(errors),
            "groups": list_groups(app.store)?,
            "is_edit": post.is_some(),
            "post": post,
        }),
    ))
}

pub fn new_post(app: &App, ctx: &RequestContext) -> Result<View, AppError> {
    let user = require_login(ctx)?;

    if !ctx.is_submit {
        return post_form_view(app, &PostForm::default(), &FormErrors::new(), None);
    }

    let form: PostForm = match parse_form(ctx.body) {
        Ok(form) => form,
        Err(errors) => return post_form_view(app, &PostForm::default(), &errors, None),
    };
    let clean = match form.validate(app.store)? {
        Ok(clean) => clean,
        Err(errors) => return post_form_view(app, &form, &errors, None),
    };

    create_post(
        app.store,
        NewPost {
            author_id: user.id.clone(),
            text: clean.text,
            group: clean.group,
            image: clean.image,
        },
    )?;
    Ok(View::redirect("/"))
}

pub fn post_edit(app: &App, ctx: &RequestContext, username: &str, post_id: &str) -> Result<View, AppError> {
    let user = require_login(ctx)?;
    let (author, mut post) = resolve_post(app.store, username, post_id)?;
    let detail = post_url(&author.username, &post.id);

    if !can_edit_post(user, &post) {
        tracing::debug!(user_id = %user.id, post_id = %post.id, "edit refused for non-author");
        return Err(AppError::Unauthorized { redirect_to: detail });
    }

    if !ctx.is_submit {
        let form = PostForm {
            text: post.text.clone(),
            group: post.group.clone(),
            ..Default::default()
        };
        return post_form_view(app, &form, &FormErrors::new(), Some(&post));
    }

    let form: PostForm = match parse_form(ctx.body) {
        Ok(form) => form,
        Err(errors) => return post_form_view(app, &PostForm::default(), &errors, Some(&post)),
    };
    let clean = match form.validate(app.store)? {
        Ok(clean) => clean,
        Err(errors) => return post_form_view(app, &form, &errors, Some(&post)),
    };

    update_post(app.store, &mut post, clean)?;
    Ok(View::redirect(detail))
}
