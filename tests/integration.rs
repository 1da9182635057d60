use base64::Engine;
use serde_json::{json, Value};
use spin_sdk::http::{Method, Request, Response};

use postboard::auth::{issue_token, TokenIdentity};
use postboard::comments::comments_for_post;
use postboard::common::store::MemoryStore;
use postboard::config::Settings;
use postboard::follow::{follow_author, follow_edges, is_following};
use postboard::groups::create_group;
use postboard::models::models::{Group, Post, User};
use postboard::posts::{all_posts, create_post, get_image, get_post, NewPost};
use postboard::users::register_user;
use postboard::{handle_request, App};

const USERNAME: &str = "user1";
const GROUP_SLUG: &str = "test-slug";
const GROUP_OFF_SLUG: &str = "test-slug-1";
const LOGIN_URL: &str = "/auth/login/";

struct Board {
    store: MemoryStore,
    settings: Settings,
    identity: TokenIdentity,
}

impl Board {
    fn new() -> Self {
        let settings = Settings::default();
        let identity = TokenIdentity::new(settings.token_expiration_hours);
        Self {
            store: MemoryStore::new(),
            settings,
            identity,
        }
    }

    fn send(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder();
        builder.method(method).uri(path);
        if let Some(token) = token {
            builder.header("authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            builder.header("content-type", "application/json");
            builder.body(serde_json::to_vec(&body).unwrap());
        }
        let req = builder.build();

        let app = App::new(&self.store, &self.identity, &self.settings);
        handle_request(&app, &req)
    }

    fn get(&self, path: &str, token: Option<&str>) -> Response {
        self.send(Method::Get, path, token, None)
    }

    fn post(&self, path: &str, token: Option<&str>, body: Value) -> Response {
        self.send(Method::Post, path, token, Some(body))
    }

    fn user(&self, username: &str) -> (User, String) {
        let user = register_user(&self.store, username).unwrap();
        let token = issue_token(&self.store, &user.id).unwrap();
        (user, token)
    }

    fn post_by(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        create_post(
            &self.store,
            NewPost {
                author_id: author.id.clone(),
                text: text.to_string(),
                group: group.map(|g| g.slug.clone()),
                image: None,
            },
        )
        .unwrap()
    }
}

/// Users, groups and a post the way most scenarios start.
struct Fixture {
    board: Board,
    author: User,
    author_token: String,
    other_token: String,
    group: Group,
    post: Post,
}

impl Fixture {
    fn new() -> Self {
        let board = Board::new();
        let (author, author_token) = board.user(USERNAME);
        let (_, other_token) = board.user("ne_user2");
        let group = create_group(&board.store, GROUP_SLUG, "TitleTitle", "").unwrap();
        create_group(&board.store, GROUP_OFF_SLUG, "title", "some information").unwrap();
        let post = board.post_by(&author, "some text", Some(&group));
        Self {
            board,
            author,
            author_token,
            other_token,
            group,
            post,
        }
    }

    fn post_url(&self) -> String {
        format!("/{}/{}/", USERNAME, self.post.id)
    }

    fn edit_url(&self) -> String {
        format!("/{}/{}/edit/", USERNAME, self.post.id)
    }

    fn comment_url(&self) -> String {
        format!("/{}/{}/comment/", USERNAME, self.post.id)
    }
}

fn status(resp: &Response) -> u16 {
    *resp.status()
}

fn location(resp: &Response) -> String {
    resp.header("location")
        .and_then(|h| h.as_str())
        .unwrap_or_default()
        .to_string()
}

fn rendered(resp: &Response) -> Value {
    assert_eq!(status(resp), 200, "expected a render");
    serde_json::from_slice(resp.body()).unwrap()
}

fn page_ids(doc: &Value) -> Vec<String> {
    doc["context"]["page"]["object_list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_status_code_for_urls() {
    let fx = Fixture::new();
    let author = Some(fx.author_token.as_str());
    let cases: Vec<(String, Option<&str>, u16)> = vec![
        ("/".to_string(), author, 200),
        ("/".to_string(), None, 200),
        (format!("/group/{}/", GROUP_SLUG), author, 200),
        (format!("/group/{}/", GROUP_SLUG), None, 200),
        ("/new/".to_string(), author, 200),
        ("/new/".to_string(), None, 302),
        (format!("/{}/", USERNAME), None, 200),
        (format!("/{}/", USERNAME), author, 200),
        (fx.post_url(), author, 200),
        (fx.post_url(), None, 200),
        (fx.edit_url(), author, 200),
        (fx.edit_url(), None, 302),
        ("/follow/".to_string(), author, 200),
        (format!("/{}/unfollow/", USERNAME), author, 302),
        (format!("/{}/follow/", USERNAME), author, 302),
        (fx.comment_url(), author, 200),
    ];

    for (url, token, code) in cases {
        let resp = fx.board.get(&url, token);
        assert_eq!(status(&resp), code, "GET {}", url);
    }
}

#[test]
fn test_redirects_for_urls() {
    let fx = Fixture::new();
    let follow_url = format!("/{}/follow/", USERNAME);
    let unfollow_url = format!("/{}/unfollow/", USERNAME);
    let cases: Vec<(String, Option<&str>, String)> = vec![
        ("/new/".to_string(), None, format!("{}?next=/new/", LOGIN_URL)),
        (fx.edit_url(), None, format!("{}?next={}", LOGIN_URL, fx.edit_url())),
        (fx.edit_url(), Some(fx.other_token.as_str()), fx.post_url()),
        (follow_url.clone(), None, format!("{}?next={}", LOGIN_URL, follow_url)),
        (unfollow_url.clone(), None, format!("{}?next={}", LOGIN_URL, unfollow_url)),
        ("/follow/".to_string(), None, format!("{}?next=/follow/", LOGIN_URL)),
        (fx.comment_url(), None, format!("{}?next={}", LOGIN_URL, fx.comment_url())),
    ];

    for (url, token, target) in cases {
        let resp = fx.board.get(&url, token);
        assert_eq!(status(&resp), 302, "GET {}", url);
        assert_eq!(location(&resp), target, "GET {}", url);
    }
}

#[test]
fn test_login_redirect_keeps_query() {
    let board = Board::new();
    let resp = board.get("/follow/?page=2", None);
    assert_eq!(location(&resp), format!("{}?next=/follow/%3Fpage%3D2", LOGIN_URL));
}

#[test]
fn test_not_found_pages() {
    let fx = Fixture::new();
    let token = Some(fx.author_token.as_str());

    let unknown_route = fx.board.get("/auf/some/deep/path/", token);
    assert_eq!(status(&unknown_route), 404);
    let body = String::from_utf8_lossy(unknown_route.body()).to_string();
    assert!(body.contains("/auf/some/deep/path/"));

    assert_eq!(status(&fx.board.get("/group/no-such-group/", None)), 404);
    assert_eq!(status(&fx.board.get("/nobody/", None)), 404);
    assert_eq!(status(&fx.board.get(&format!("/ne_user2/{}/", fx.post.id), None)), 404);
    assert_eq!(status(&fx.board.get(&format!("/{}/not-an-id/", USERNAME), None)), 404);
    assert_eq!(status(&fx.board.get(&format!("/nobody/{}/edit/", fx.post.id), token)), 404);
    assert_eq!(status(&fx.board.get("/nobody/follow/", token)), 404);
}

#[test]
fn test_templates_posts() {
    let fx = Fixture::new();
    let token = Some(fx.author_token.as_str());
    let cases = vec![
        ("/".to_string(), "posts/index.html"),
        (format!("/group/{}/", GROUP_SLUG), "group.html"),
        ("/new/".to_string(), "posts/new_post.html"),
        (fx.edit_url(), "posts/new_post.html"),
        (format!("/{}/", USERNAME), "posts/profile.html"),
        (fx.post_url(), "posts/post.html"),
        ("/follow/".to_string(), "posts/follow.html"),
        (fx.comment_url(), "posts/comments.html"),
    ];

    for (url, template) in cases {
        let doc = rendered(&fx.board.get(&url, token));
        assert_eq!(doc["template"], template, "GET {}", url);
    }
}

#[test]
fn test_about_pages() {
    let board = Board::new();
    for url in ["/about/author/", "/about/tech/"] {
        let resp = board.get(url, None);
        assert_eq!(status(&resp), 200);
        let content_type = resp.header("content-type").and_then(|h| h.as_str()).unwrap_or_default();
        assert!(content_type.starts_with("text/html"));
    }
    assert_eq!(status(&board.get("/about/secrets/", None)), 404);
}

#[test]
fn test_follow_for_authorized() {
    let fx = Fixture::new();
    let (fan, fan_token) = fx.board.user("Alesha");

    let resp = fx.board.get(&format!("/{}/follow/", USERNAME), Some(&fan_token));
    assert_eq!(location(&resp), format!("/{}/", USERNAME));
    assert!(is_following(&fx.board.store, &fan.id, &fx.author.id).unwrap());

    fx.board.post(&format!("/{}/follow/", USERNAME), Some(&fan_token), json!({}));
    assert_eq!(follow_edges(&fx.board.store, &fan.id).unwrap().len(), 1);

    let profile = rendered(&fx.board.get(&format!("/{}/", USERNAME), Some(&fan_token)));
    assert_eq!(profile["context"]["following"], true);
}

#[test]
fn test_follow_redirects_to_local_next_only() {
    let fx = Fixture::new();
    let (_, fan_token) = fx.board.user("Alesha");

    let back_to_post = format!("/{}/follow/?next={}", USERNAME, fx.post_url());
    assert_eq!(location(&fx.board.get(&back_to_post, Some(&fan_token))), fx.post_url());

    let offsite = format!("/{}/unfollow/?next=https://evil.example/", USERNAME);
    assert_eq!(
        location(&fx.board.get(&offsite, Some(&fan_token))),
        format!("/{}/", USERNAME)
    );
}

#[test]
fn test_self_follow_is_skipped() {
    let fx = Fixture::new();
    let resp = fx.board.get(&format!("/{}/follow/", USERNAME), Some(&fx.author_token));
    assert_eq!(status(&resp), 302);
    assert!(follow_edges(&fx.board.store, &fx.author.id).unwrap().is_empty());

    let profile = rendered(&fx.board.get(&format!("/{}/", USERNAME), Some(&fx.author_token)));
    assert_eq!(profile["context"]["following"], false);
}

#[test]
fn test_unfollow_for_authorized() {
    let fx = Fixture::new();
    let (fan, fan_token) = fx.board.user("Alesha");
    follow_author(&fx.board.store, &fan.id, &fx.author.id).unwrap();

    fx.board.get(&format!("/{}/unfollow/", USERNAME), Some(&fan_token));
    assert!(!is_following(&fx.board.store, &fan.id, &fx.author.id).unwrap());

    let again = fx.board.get(&format!("/{}/unfollow/", USERNAME), Some(&fan_token));
    assert_eq!(status(&again), 302);
}

#[test]
fn test_context_for_posts_pages() {
    let fx = Fixture::new();
    let (fan, fan_token) = fx.board.user("Alesha");
    follow_author(&fx.board.store, &fan.id, &fx.author.id).unwrap();

    let feeds = vec![
        "/".to_string(),
        format!("/group/{}/", GROUP_SLUG),
        format!("/{}/", USERNAME),
        "/follow/".to_string(),
    ];
    for url in feeds {
        let doc = rendered(&fx.board.get(&url, Some(&fan_token)));
        let first = &doc["context"]["page"]["object_list"][0];
        assert_eq!(first["id"], fx.post.id.as_str(), "GET {}", url);
        assert_eq!(first["text"], "some text");
        assert_eq!(first["author"], USERNAME);
        assert_eq!(first["group"]["slug"], GROUP_SLUG);
    }

    let detail = rendered(&fx.board.get(&fx.post_url(), Some(&fan_token)));
    assert_eq!(detail["context"]["post"]["id"], fx.post.id.as_str());
    assert_eq!(detail["context"]["author"]["username"], USERNAME);
}

#[test]
fn test_post_not_in_group_off() {
    let fx = Fixture::new();
    let doc = rendered(&fx.board.get(&format!("/group/{}/", GROUP_OFF_SLUG), None));
    assert!(page_ids(&doc).is_empty());
    assert_eq!(doc["context"]["group"]["slug"], GROUP_OFF_SLUG);
}

#[test]
fn test_cache_index_page() {
    let fx = Fixture::new();
    let first = fx.board.get("/", None);
    fx.board.post_by(&fx.author, "meme_co", None);
    let second = fx.board.get("/", None);

    assert_eq!(first.body(), second.body());
    assert_eq!(page_ids(&rendered(&second)).len(), 1);

    // A different query string is a different cache entry.
    let other_route = rendered(&fx.board.get("/?page=1", None));
    assert_eq!(page_ids(&other_route).len(), 2);
}

#[test]
fn test_index_without_cache_sees_new_posts() {
    let mut board = Board::new();
    board.settings.index_cache_seconds = 0;
    let (author, _) = board.user(USERNAME);

    board.post_by(&author, "first", None);
    assert_eq!(page_ids(&rendered(&board.get("/", None))).len(), 1);
    board.post_by(&author, "second", None);
    assert_eq!(page_ids(&rendered(&board.get("/", None))).len(), 2);
}

#[test]
fn test_post_for_follow() {
    let fx = Fixture::new();
    let (fan, fan_token) = fx.board.user("Alesha");
    follow_author(&fx.board.store, &fan.id, &fx.author.id).unwrap();

    let doc = rendered(&fx.board.get("/follow/", Some(&fan_token)));
    assert_eq!(page_ids(&doc), vec![fx.post.id.clone()]);
}

#[test]
fn test_post_for_unfollow() {
    let fx = Fixture::new();
    let (_, loner_token) = fx.board.user("Alesha");

    let doc = rendered(&fx.board.get("/follow/", Some(&loner_token)));
    assert!(page_ids(&doc).is_empty());
    assert_eq!(doc["context"]["page"]["num_pages"], 1);
}

#[test]
fn test_authorized_comments() {
    let fx = Fixture::new();
    let (commenter, token) = fx.board.user("Alesha");

    let resp = fx.board.post(&fx.comment_url(), Some(&token), json!({"text": "test comment"}));
    assert_eq!(status(&resp), 302);
    assert_eq!(location(&resp), fx.post_url());

    let comments = comments_for_post(&fx.board.store, &fx.post.id).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "test comment");
    assert_eq!(comments[0].author_id, commenter.id);
    assert_eq!(comments[0].post_id.as_deref(), Some(fx.post.id.as_str()));

    let detail = rendered(&fx.board.get(&fx.post_url(), None));
    assert_eq!(detail["context"]["comments"][0]["author"], "Alesha");
}

#[test]
fn test_blank_comment_rerenders_form() {
    let fx = Fixture::new();
    let resp = fx.board.post(&fx.comment_url(), Some(&fx.other_token), json!({"text": "  "}));
    let doc = rendered(&resp);
    assert_eq!(doc["template"], "posts/comments.html");
    assert!(doc["context"]["form"]["errors"]["text"].is_array());
    assert!(comments_for_post(&fx.board.store, &fx.post.id).unwrap().is_empty());
}

#[test]
fn test_paginator_pages() {
    let board = Board::new();
    let (author, _) = board.user(USERNAME);
    for n in 0..12 {
        board.post_by(&author, &format!("some text{}", n), None);
    }

    assert_eq!(page_ids(&rendered(&board.get("/", None))).len(), 10);
    assert_eq!(page_ids(&rendered(&board.get("/?page=2", None))).len(), 2);

    let clamped = rendered(&board.get(&format!("/{}/?page=99", USERNAME), None));
    assert_eq!(clamped["context"]["page"]["number"], 2);
    assert_eq!(page_ids(&clamped).len(), 2);
}

#[test]
fn test_create_post() {
    let fx = Fixture::new();
    let img = image::RgbImage::from_pixel(2, 1, image::Rgb([0, 0, 0]));
    let mut small_png = std::io::Cursor::new(Vec::new());
    img.write_to(&mut small_png, image::ImageFormat::Png).unwrap();
    let small_png = small_png.into_inner();
    let form = json!({
        "text": "text text",
        "group": GROUP_SLUG,
        "image": {
            "name": "small.png",
            "content": base64::engine::general_purpose::STANDARD.encode(&small_png),
        },
    });

    let resp = fx.board.post("/new/", Some(&fx.author_token), form);
    assert_eq!(status(&resp), 302);
    assert_eq!(location(&resp), "/");

    let mut board = fx.board;
    board.settings.index_cache_seconds = 0;
    let doc = rendered(&board.get("/", None));
    let ids = page_ids(&doc);
    assert_eq!(ids.len(), 2);

    let created = get_post(&board.store, &ids[0]).unwrap().unwrap();
    assert_ne!(created.id, fx.post.id);
    assert_eq!(created.text, "text text");
    assert_eq!(created.author_id, fx.author.id);
    assert_eq!(created.group.as_deref(), Some(fx.group.slug.as_str()));
    let image = created.image.unwrap();
    assert!(image.ends_with(".png"));
    assert_eq!(get_image(&board.store, &image).unwrap().unwrap(), small_png);
}

#[test]
fn test_invalid_post_form_keeps_values() {
    let fx = Fixture::new();
    let form = json!({ "text": "", "group": "missing-group" });

    let doc = rendered(&fx.board.post("/new/", Some(&fx.author_token), form));
    assert_eq!(doc["template"], "posts/new_post.html");
    let errors = &doc["context"]["form"]["errors"];
    assert!(errors["text"].is_array());
    assert!(errors["group"].is_array());
    assert_eq!(doc["context"]["form"]["group"], "missing-group");

    let bad_image = json!({
        "text": "has words",
        "image": { "name": "fake.gif", "content": "bm90IGFuIGltYWdl" },
    });
    let doc = rendered(&fx.board.post("/new/", Some(&fx.author_token), bad_image));
    assert!(doc["context"]["form"]["errors"]["image"].is_array());
    assert_eq!(doc["context"]["form"]["text"], "has words");
}

#[test]
fn test_server_assigned_fields_ignore_input() {
    let fx = Fixture::new();
    let form = json!({
        "text": "sneaky",
        "author_id": "someone-else",
        "created_at": "1999-01-01T00:00:00Z",
    });
    let resp = fx.board.post("/new/", Some(&fx.other_token), form);
    assert_eq!(status(&resp), 302);

    let mut board = fx.board;
    board.settings.index_cache_seconds = 0;
    let doc = rendered(&board.get("/", None));
    let newest = get_post(&board.store, &page_ids(&doc)[0]).unwrap().unwrap();
    assert_eq!(newest.text, "sneaky");
    assert_ne!(newest.author_id, "someone-else");
    assert!(newest.created_at.timestamp() > 946_684_800);
}

#[test]
fn test_edit_post() {
    let fx = Fixture::new();
    let form = json!({ "text": "correct text!", "group": GROUP_OFF_SLUG });

    let resp = fx.board.post(&fx.edit_url(), Some(&fx.author_token), form);
    assert_eq!(status(&resp), 302);
    assert_eq!(location(&resp), fx.post_url());

    let edited = get_post(&fx.board.store, &fx.post.id).unwrap().unwrap();
    assert_eq!(edited.text, "correct text!");
    assert_eq!(edited.group.as_deref(), Some(GROUP_OFF_SLUG));
    assert_eq!(edited.author_id, fx.author.id);
    assert_eq!(edited.created_at, fx.post.created_at);

    let detail = rendered(&fx.board.get(&fx.post_url(), None));
    assert_eq!(detail["context"]["post"]["text"], "correct text!");
}

#[test]
fn test_edit_form_prefilled() {
    let fx = Fixture::new();
    let doc = rendered(&fx.board.get(&fx.edit_url(), Some(&fx.author_token)));
    assert_eq!(doc["context"]["is_edit"], true);
    assert_eq!(doc["context"]["form"]["text"], "some text");
    assert_eq!(doc["context"]["form"]["group"], GROUP_SLUG);
    assert_eq!(doc["context"]["groups"].as_array().unwrap().len(), 2);
}

#[test]
fn test_edit_by_non_author_changes_nothing() {
    let fx = Fixture::new();
    let resp = fx.board.post(&fx.edit_url(), Some(&fx.other_token), json!({"text": "hijacked"}));

    assert_eq!(status(&resp), 302);
    assert_eq!(location(&resp), fx.post_url());
    let stored = get_post(&fx.board.store, &fx.post.id).unwrap().unwrap();
    assert_eq!(stored.text, "some text");
}

#[test]
fn test_unsupported_method_is_not_found() {
    let fx = Fixture::new();
    let resp = fx.board.send(Method::Delete, &fx.post_url(), Some(&fx.author_token), None);
    assert_eq!(status(&resp), 404);
    assert!(get_post(&fx.board.store, &fx.post.id).unwrap().is_some());
}

#[test]
fn test_text_keeps_special_characters() {
    let mut board = Board::new();
    board.settings.index_cache_seconds = 0;
    let (author, token) = board.user(USERNAME);
    let text = "Tom & Jerry: 1 < 2 > 0";

    board.post("/new/", Some(&token), json!({ "text": text }));
    let post_id = page_ids(&rendered(&board.get("/", None)))[0].clone();
    assert_eq!(get_post(&board.store, &post_id).unwrap().unwrap().text, text);

    let edit_url = format!("/{}/{}/edit/", USERNAME, post_id);
    let prefill = rendered(&board.get(&edit_url, Some(&token)));
    assert_eq!(prefill["context"]["form"]["text"], text);

    // Resubmitting the prefilled form leaves the text as it was.
    let prefilled = prefill["context"]["form"]["text"].clone();
    board.post(&edit_url, Some(&token), json!({ "text": prefilled }));
    assert_eq!(get_post(&board.store, &post_id).unwrap().unwrap().text, text);

    board.post(&edit_url, Some(&token), json!({ "text": "<b>Tom</b> & Jerry" }));
    let detail = rendered(&board.get(&format!("/{}/{}/", USERNAME, post_id), None));
    assert_eq!(detail["context"]["post"]["text"], "Tom & Jerry");

    let comment_url = format!("/{}/{}/comment/", USERNAME, post_id);
    board.post(&comment_url, Some(&token), json!({ "text": "a & b < c" }));
    let comments = comments_for_post(&board.store, &post_id).unwrap();
    assert_eq!(comments[0].text, "a & b < c");
    assert_eq!(comments[0].author_id, author.id);
}

#[test]
fn test_concurrent_submissions_are_all_kept() {
    let mut board = Board::new();
    board.settings.index_cache_seconds = 0;
    let (fan, fan_token) = board.user("fan");
    let writers: Vec<(User, String)> = (0..4).map(|n| board.user(&format!("writer{}", n))).collect();

    let board = &board;
    std::thread::scope(|scope| {
        for (writer, token) in &writers {
            scope.spawn(move || {
                for n in 0..25 {
                    let resp = board.post("/new/", Some(token), json!({ "text": format!("note {}", n) }));
                    assert_eq!(status(&resp), 302);
                }
            });
            let fan_token = fan_token.as_str();
            scope.spawn(move || {
                for _ in 0..3 {
                    board.get(&format!("/{}/follow/", writer.username), Some(fan_token));
                }
            });
        }
    });

    assert_eq!(all_posts(&board.store).unwrap().len(), 100);
    assert_eq!(follow_edges(&board.store, &fan.id).unwrap().len(), 4);

    let feed = rendered(&board.get("/follow/", Some(&fan_token)));
    assert_eq!(feed["context"]["page"]["count"], 100);
}
