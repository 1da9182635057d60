use std::collections::{HashMap, HashSet};

use crate::common::paginator::{Page, Paginator};
use crate::common::store::KvStore;
use crate::follow::get_followings;
use crate::groups::get_group;
use crate::models::models::{GroupRef, Post, PostView};
use crate::posts::all_posts;
use crate::users::get_user;

/// Which posts a feed shows. Every feed is ordered newest first.
#[derive(Debug, Clone, Copy)]
pub enum FeedFilter<'a> {
    All,
    Group(&'a str),
    Author(&'a str),
    /// Posts by every author the given user follows.
    FollowedBy(&'a str),
}

pub fn select_posts(store: &dyn KvStore, filter: FeedFilter<'_>) -> anyhow::Result<Vec<Post>> {
    let posts = all_posts(store)?;
    let selected = match filter {
        FeedFilter::All => posts,
        FeedFilter::Group(slug) => posts
            .into_iter()
            .filter(|p| p.group.as_deref() == Some(slug))
            .collect(),
        FeedFilter::Author(author_id) => posts
            .into_iter()
            .filter(|p| p.author_id == author_id)
            .collect(),
        FeedFilter::FollowedBy(user_id) => {
            let followed: HashSet<String> = get_followings(store, user_id)?.into_iter().collect();
            posts
                .into_iter()
                .filter(|p| followed.contains(&p.author_id))
                .collect()
        }
    };
    Ok(selected)
}

pub fn feed_page(
    store: &dyn KvStore,
    paginator: Paginator,
    filter: FeedFilter<'_>,
    raw_page: Option<&str>,
) -> anyhow::Result<Page<PostView>> {
    let posts = select_posts(store, filter)?;
    let page = paginator.get_page(posts, raw_page);
    let mut views = ViewBuilder::new(store);
    page.map(|post| views.post(post))
}

/// Joins posts with author names and group titles, loading each once.
pub struct ViewBuilder<'s> {
    store: &'s dyn KvStore,
    usernames: HashMap<String, String>,
    groups: HashMap<String, Option<GroupRef>>,
}

impl<'s> ViewBuilder<'s> {
    pub fn new(store: &'s dyn KvStore) -> Self {
        Self {
            store,
            usernames: HashMap::new(),
            groups: HashMap::new(),
        }
    }

    pub fn username(&mut self, user_id: &str) -> anyhow::Result<String> {
        if let Some(name) = self.usernames.get(user_id) {
            return Ok(name.clone());
        }
        let name = get_user(self.store, user_id)?
            .map(|u| u.username)
            .unwrap_or_default();
        self.usernames.insert(user_id.to_string(), name.clone());
        Ok(name)
    }

    fn group(&mut self, slug: &str) -> anyhow::Result<Option<GroupRef>> {
        if let Some(group) = self.groups.get(slug) {
            return Ok(group.clone());
        }
        let group = get_group(self.store, slug)?.map(|g| GroupRef {
            slug: g.slug,
            title: g.title,
        });
        self.groups.insert(slug.to_string(), group.clone());
        Ok(group)
    }

    pub fn post(&mut self, post: Post) -> anyhow::Result<PostView> {
        let author = self.username(&post.author_id)?;
        let group = match post.group.as_deref() {
            Some(slug) => self.group(slug)?,
            None => None,
        };
        Ok(PostView {
            id: post.id,
            text: post.text,
            created_at: post.created_at,
            author,
            group,
            image: post.image,
        })
    }
}
