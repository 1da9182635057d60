pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_INDEX_CACHE_SECONDS: i64 = 20;
pub const MAX_INDEX_CACHE_SECONDS: i64 = 24 * 60 * 60;
pub const DEFAULT_TOKEN_EXPIRATION_HOURS: i64 = 24;
pub const DEFAULT_LOGIN_URL: &str = "/auth/login/";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:80";

pub const MAX_GROUP_TITLE_LENGTH: usize = 200;
pub const MAX_GROUP_SLUG_LENGTH: usize = 70;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub const USERS_LIST_KEY: &str = "users_list";
pub const GROUPS_LIST_KEY: &str = "groups_list";
pub const FEED_KEY: &str = "feed";
pub const TOKENS_LIST_KEY: &str = "tokens_list";
/// Username -> user id, the claim that keeps usernames unique.
pub const USERNAMES_KEY: &str = "usernames";

/// First path segments that can never be a username.
pub const RESERVED_USERNAMES: &[&str] = &["new", "follow", "group", "about", "auth"];

pub fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

pub fn group_key(slug: &str) -> String {
    format!("group:{}", slug)
}

pub fn post_key(id: &str) -> String {
    format!("post:{}", id)
}

pub fn comment_key(id: &str) -> String {
    format!("comment:{}", id)
}

pub fn post_comments_key(post_id: &str) -> String {
    format!("comments:{}", post_id)
}

pub fn followings_key(user_id: &str) -> String {
    format!("followings:{}", user_id)
}

pub fn token_key(token: &str) -> String {
    format!("token:{}", token)
}

pub fn media_key(name: &str) -> String {
    format!("media:{}", name)
}

pub fn cache_key(route: &str) -> String {
    format!("cache:{}", route)
}

/// Runtime settings, read once per process (native) or per request (Spin).
#[derive(Debug, Clone)]
pub struct Settings {
    pub page_size: usize,
    pub index_cache_seconds: i64,
    pub token_expiration_hours: i64,
    pub login_url: String,
    pub bind_addr: String,
    pub seed_demo_data: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            index_cache_seconds: DEFAULT_INDEX_CACHE_SECONDS,
            token_expiration_hours: DEFAULT_TOKEN_EXPIRATION_HOURS,
            login_url: DEFAULT_LOGIN_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            seed_demo_data: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            page_size: lookup("POSTBOARD_PAGE_SIZE")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.page_size),
            index_cache_seconds: lookup("POSTBOARD_INDEX_CACHE_SECONDS")
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|secs| *secs >= 0)
                .map(|secs| secs.min(MAX_INDEX_CACHE_SECONDS))
                .unwrap_or(defaults.index_cache_seconds),
            token_expiration_hours: lookup("POSTBOARD_TOKEN_EXPIRATION_HOURS")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(defaults.token_expiration_hours),
            login_url: lookup("POSTBOARD_LOGIN_URL")
                .filter(|url| url.starts_with('/'))
                .unwrap_or(defaults.login_url),
            bind_addr: lookup("POSTBOARD_BIND_ADDR").unwrap_or(defaults.bind_addr),
            seed_demo_data: lookup("POSTBOARD_SEED_DEMO_DATA")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.seed_demo_data),
        }
    }
}
