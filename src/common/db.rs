use chrono::Duration;

use crate::auth::issue_token;
use crate::common::helpers::now;
use crate::common::store::KvStore;
use crate::follow::follow_author;
use crate::groups::{create_group, get_group};
use crate::posts::{insert_post, NewPost};
use crate::users::{find_by_username, register_user};

const DEMO_GROUP: &str = "rustaceans";

/// Demo users, a group, a few posts and one follow edge. Safe to call on
/// every start: existing demo records are left alone.
/// Returns `(username, token)` for each demo user created by this call.
pub fn init_demo_data(store: &dyn KvStore) -> anyhow::Result<Vec<(String, String)>> {
    let mut created = Vec::new();

    if get_group(store, DEMO_GROUP)?.is_none() {
        create_group(store, DEMO_GROUP, "Rustaceans", "Everything about writing Rust")?;
    }

    let demo: [(&str, &[(&str, bool)]); 3] = [
        ("test", &[("This is my first post on the board!", false)]),
        (
            "alice",
            &[
                ("Welcome to my blog! Excited to share thoughts here.", true),
                ("Just finished an amazing project. Feeling productive today!", false),
            ],
        ),
        (
            "bob",
            &[("Hey everyone! Just joined, looking forward to connecting with you all.", true)],
        ),
    ];

    let start = now() - Duration::minutes(10);
    let mut offset = 0;
    for (username, posts) in demo {
        if find_by_username(store, username)?.is_some() {
            continue;
        }
        let user = register_user(store, username)?;
        for (text, in_group) in posts {
            offset += 1;
            insert_post(
                store,
                NewPost {
                    author_id: user.id.clone(),
                    text: text.to_string(),
                    group: in_group.then(|| DEMO_GROUP.to_string()),
                    image: None,
                },
                start + Duration::minutes(offset),
            )?;
        }
        let token = issue_token(store, &user.id)?;
        created.push((user.username, token));
    }

    // "test" follows "bob"
    if let (Some(test), Some(bob)) = (find_by_username(store, "test")?, find_by_username(store, "bob")?) {
        follow_author(store, &test.id, &bob.id)?;
    }

    Ok(created)
}
