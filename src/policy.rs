//! Who may do what. Failures never surface as error pages: anonymous callers
//! go to the login entry point, non-authors are quietly sent back.

use crate::app::RequestContext;
use crate::common::errors::AppError;
use crate::models::models::{Post, User};

pub fn require_login<'c>(ctx: &'c RequestContext<'_>) -> Result<&'c User, AppError> {
    ctx.user.as_ref().ok_or_else(|| AppError::Unauthenticated {
        next: ctx.full_path.clone(),
    })
}

pub fn can_edit_post(user: &User, post: &Post) -> bool {
    post.author_id == user.id
}

pub fn can_follow(user: &User, author: &User) -> bool {
    user.id != author.id
}
