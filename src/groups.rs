use std::sync::OnceLock;

use regex::Regex;

use crate::common::store::{KvStore, KvStoreExt};
use crate::config::{group_key, post_key, GROUPS_LIST_KEY, MAX_GROUP_SLUG_LENGTH, MAX_GROUP_TITLE_LENGTH};
use crate::models::models::Group;
use crate::posts::all_posts;

fn slug_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("Regex should compile"))
}

pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() <= MAX_GROUP_SLUG_LENGTH && slug_regex().is_match(slug)
}

pub fn get_group(store: &dyn KvStore, slug: &str) -> anyhow::Result<Option<Group>> {
    if !is_valid_slug(slug) {
        return Ok(None);
    }
    store.get_json(&group_key(slug))
}

pub fn list_groups(store: &dyn KvStore) -> anyhow::Result<Vec<Group>> {
    let slugs: Vec<String> = store.get_json(GROUPS_LIST_KEY)?.unwrap_or_default();
    let mut groups = Vec::with_capacity(slugs.len());
    for slug in slugs {
        if let Some(group) = store.get_json::<Group>(&group_key(&slug))? {
            groups.push(group);
        }
    }
    Ok(groups)
}

fn check_title(title: &str) -> anyhow::Result<()> {
    if title.trim().is_empty() {
        anyhow::bail!("Group title is required");
    }
    if title.chars().count() > MAX_GROUP_TITLE_LENGTH {
        anyhow::bail!("Group title longer than {} characters", MAX_GROUP_TITLE_LENGTH);
    }
    Ok(())
}

pub fn create_group(store: &dyn KvStore, slug: &str, title: &str, description: &str) -> anyhow::Result<Group> {
    if !is_valid_slug(slug) {
        anyhow::bail!("Invalid group slug {:?}", slug);
    }
    check_title(title)?;
    let group = Group {
        slug: slug.to_string(),
        title: title.trim().to_string(),
        description: description.to_string(),
    };
    let created = store.update_json(&group_key(slug), |stored: &mut Option<Group>| {
        if stored.is_some() {
            return false;
        }
        *stored = Some(group.clone());
        true
    })?;
    if !created {
        anyhow::bail!("Group slug exists: {}", slug);
    }

    store.update_json(GROUPS_LIST_KEY, |slugs: &mut Vec<String>| {
        if !slugs.contains(&group.slug) {
            slugs.push(group.slug.clone());
        }
    })?;

    Ok(group)
}

/// Title and description are editable; the slug is the group's identity.
pub fn update_group(store: &dyn KvStore, slug: &str, title: &str, description: &str) -> anyhow::Result<Option<Group>> {
    check_title(title)?;
    let mut group = match get_group(store, slug)? {
        Some(group) => group,
        None => return Ok(None),
    };
    group.title = title.trim().to_string();
    group.description = description.to_string();
    store.set_json(&group_key(slug), &group)?;
    Ok(Some(group))
}

/// Deletes the group; posts that referenced it survive without a group.
pub fn delete_group(store: &dyn KvStore, slug: &str) -> anyhow::Result<bool> {
    if get_group(store, slug)?.is_none() {
        return Ok(false);
    }

    for mut post in all_posts(store)? {
        if post.group.as_deref() == Some(slug) {
            post.group = None;
            store.set_json(&post_key(&post.id), &post)?;
        }
    }

    store.delete(&group_key(slug))?;
    store.update_json(GROUPS_LIST_KEY, |slugs: &mut Vec<String>| slugs.retain(|s| s != slug))?;

    tracing::info!(%slug, "group deleted");
    Ok(true)
}
