use spin_sdk::http::{Method, Request, Response};

use crate::app::{App, RequestContext};
use crate::comments::add_comment_view;
use crate::common::cache::{CachedPage, PageCache};
use crate::common::errors::AppError;
use crate::common::helpers::now;
use crate::common::pages::{about_page, not_found_page};
use crate::common::query_params::{full_path, parse_query_params};
use crate::config::RESERVED_USERNAMES as RESERVED;
use crate::follow::{follow_index, profile_follow, profile_unfollow};
use crate::posts::{group_posts, index, new_post, post_edit, post_view, profile};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Verb {
    Read,
    Submit,
    Other,
}

fn verb(method: &Method) -> Verb {
    match method {
        Method::Get | Method::Head => Verb::Read,
        Method::Post => Verb::Submit,
        _ => Verb::Other,
    }
}

/// Serves one request. Never fails: handler errors become redirects, 404 or
/// 500 pages here.
pub fn handle_request(app: &App, req: &Request) -> Response {
    let path = req.path().to_string();
    let full = full_path(&path, req.uri());
    let verb = verb(req.method());

    let user = match app.identity.authenticate(app.store, req) {
        Ok(user) => user,
        Err(err) => {
            return AppError::Internal(err).into_response(&path, &app.settings.login_url);
        }
    };

    let ctx = RequestContext {
        user,
        full_path: full.clone(),
        params: parse_query_params(req.uri()),
        body: req.body(),
        is_submit: verb == Verb::Submit,
    };

    let response = match dispatch(app, &ctx, &path, verb) {
        Ok(response) => response,
        Err(err) => err.into_response(&path, &app.settings.login_url),
    };

    tracing::debug!(method = %req.method(), path = %full, status = *response.status(), "handled");
    response
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn dispatch(app: &App, ctx: &RequestContext, path: &str, verb: Verb) -> Result<Response, AppError> {
    let segs = segments(path);
    let read = verb == Verb::Read;
    let form = verb != Verb::Other;

    let view = match segs.as_slice() {
        [] if read => return cached_index(app, ctx),
        ["new"] if form => new_post(app, ctx)?,
        ["follow"] if read => follow_index(app, ctx)?,
        ["group", slug] if read => group_posts(app, ctx, slug)?,
        ["about", name] if read => {
            return about_page(name).ok_or_else(|| AppError::not_found(format!("about {}", name)));
        }
        [username] if read && !RESERVED.contains(username) => profile(app, ctx, username)?,
        [username, "follow"] if form && !RESERVED.contains(username) => {
            profile_follow(app, ctx, username)?
        }
        [username, "unfollow"] if form && !RESERVED.contains(username) => {
            profile_unfollow(app, ctx, username)?
        }
        [username, post_id] if read && !RESERVED.contains(username) => {
            post_view(app, ctx, username, post_id)?
        }
        [username, post_id, "edit"] if form && !RESERVED.contains(username) => {
            post_edit(app, ctx, username, post_id)?
        }
        [username, post_id, "comment"] if form && !RESERVED.contains(username) => {
            add_comment_view(app, ctx, username, post_id)?
        }
        _ => return Ok(not_found_page(path)),
    };

    Ok(view.into_response()?)
}

/// The index feed is served from the page cache while the entry is fresh.
fn cached_index(app: &App, ctx: &RequestContext) -> Result<Response, AppError> {
    let cache = PageCache::new(app.store, app.settings.index_cache_seconds);
    let started = now();

    if let Some(page) = cache.get(&ctx.full_path, started)? {
        tracing::debug!(route = %ctx.full_path, "index served from cache");
        return Ok(Response::builder()
            .status(page.status)
            .header("content-type", page.content_type)
            .body(page.body.into_bytes())
            .build());
    }

    let response = index(app, ctx)?.into_response()?;
    if *response.status() != 200 {
        return Ok(response);
    }

    let content_type = response
        .header("content-type")
        .and_then(|h| h.as_str())
        .unwrap_or("application/json")
        .to_string();
    let page = CachedPage {
        stored_at: started,
        status: *response.status(),
        content_type,
        body: String::from_utf8(response.body().to_vec()).map_err(anyhow::Error::from)?,
    };
    cache.put(&ctx.full_path, &page)?;

    Ok(response)
}
