use std::collections::HashMap;

use crate::auth::IdentityProvider;
use crate::common::paginator::Paginator;
use crate::common::store::KvStore;
use crate::config::Settings;
use crate::models::models::User;

/// Everything a handler needs that outlives a single request.
pub struct App<'a> {
    pub store: &'a dyn KvStore,
    pub identity: &'a dyn IdentityProvider,
    pub settings: &'a Settings,
}

impl<'a> App<'a> {
    pub fn new(store: &'a dyn KvStore, identity: &'a dyn IdentityProvider, settings: &'a Settings) -> Self {
        Self {
            store,
            identity,
            settings,
        }
    }

    pub fn paginator(&self) -> Paginator {
        Paginator::new(self.settings.page_size)
    }
}

/// What the router extracted from the incoming request.
pub struct RequestContext<'r> {
    pub user: Option<User>,
    pub full_path: String,
    pub params: HashMap<String, String>,
    pub body: &'r [u8],
    pub is_submit: bool,
}

impl RequestContext<'_> {
    pub fn page_param(&self) -> Option<&str> {
        self.params.get("page").map(|s| s.as_str())
    }
}
