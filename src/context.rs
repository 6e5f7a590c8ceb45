use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::Path,
    sync::Arc,
};

use anyhow::{Result, anyhow};

use crate::{
    admin::{ClientAction, Dispatcher, InventoryAction},
    auth::{IdentityProvider, LocalIdentity, Session, User},
    binding::BoundField,
    config::Config,
    health::HealthMonitor,
    model::ClientConfig,
    store::{ArcStore, DocPath, Entity, Field, InMemoryStore, SlowStore, SqliteStore},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DashboardView {
    Inventory,
    Preferences,
    Admin,
}

impl DashboardView {
    pub const ALL: [DashboardView; 3] = [DashboardView::Inventory, DashboardView::Preferences, DashboardView::Admin];

    pub fn key(&self) -> &'static str {
        match self {
            DashboardView::Inventory => "inventory",
            DashboardView::Preferences => "preferences",
            DashboardView::Admin => "admin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DashboardView::Inventory => "Inventory",
            DashboardView::Preferences => "Preferences",
            DashboardView::Admin => "Admin",
        }
    }

    pub fn admin_only(&self) -> bool {
        matches!(self, DashboardView::Admin)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|view| view.key() == key)
    }
}

/// Views `user` may open, in menu order.
pub fn views_for(user: Option<&User>, config: &Config) -> Vec<DashboardView> {
    let admin = user.is_some_and(|user| config.is_admin(&user.email));
    DashboardView::ALL
        .into_iter()
        .filter(|view| admin || !view.admin_only())
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Login,
    ForgotPassword,
    Unauthorized,
    Dashboard(DashboardView),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::ForgotPassword => "/forgot-password".to_string(),
            Route::Unauthorized => "/unauthorized".to_string(),
            Route::Dashboard(view) => format!("/dashboard/{}", view.key()),
        }
    }
}

/// Where a navigation to `path` ends up. Signed-out users only reach the
/// login and password reset pages; everything else a signed-in user cannot
/// open lands on their first view.
pub fn resolve_route(path: &str, user: Option<&User>, config: &Config) -> Route {
    let path = path.trim_end_matches('/');
    if user.is_none() {
        return match path {
            "/forgot-password" => Route::ForgotPassword,
            _ => Route::Login,
        };
    }

    let views = views_for(user, config);
    let Some(first) = views.first().copied() else {
        return Route::Unauthorized;
    };
    match path {
        "/forgot-password" => Route::ForgotPassword,
        "/unauthorized" => Route::Unauthorized,
        _ => path
            .strip_prefix("/dashboard/")
            .and_then(DashboardView::from_key)
            .filter(|view| views.contains(view))
            .map_or(Route::Dashboard(first), Route::Dashboard),
    }
}

pub const FALLBACK_PREFIX: &str = "Something went wrong, please contact support:";

/// Output of one isolated view.
#[derive(Clone, Debug, PartialEq)]
pub enum Rendered<T> {
    View(T),
    Fallback(String),
}

/// Runs one view's render. An error or panic becomes that view's fallback
/// message and does not reach the caller.
pub fn render_isolated<T>(view: DashboardView, render: impl FnOnce() -> Result<T>) -> Rendered<T> {
    match panic::catch_unwind(AssertUnwindSafe(render)) {
        Ok(Ok(output)) => Rendered::View(output),
        Ok(Err(e)) => {
            log::error!("RENDER ERROR: {}: {:#}", view.key(), e);
            Rendered::Fallback(format!("{} {:#}", FALLBACK_PREFIX, e))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::error!("RENDER PANIC: {}: {}", view.key(), message);
            Rendered::Fallback(format!("{} {}", FALLBACK_PREFIX, message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown error".to_string()
    }
}

/// Everything the dashboard talks to, passed explicitly to the parts that
/// need it.
#[derive(Clone)]
pub struct AppContext {
    store: ArcStore,
    identity: Arc<dyn IdentityProvider>,
    config: Config,
}

impl AppContext {
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::default()
    }

    pub fn store(&self) -> &ArcStore {
        &self.store
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> Session {
        Session::new(self.identity.clone())
    }

    pub fn current_user(&self) -> Option<User> {
        self.identity.current_user()
    }

    pub fn is_admin(&self, user: &User) -> bool {
        self.config.is_admin(&user.email)
    }

    pub fn views(&self) -> Vec<DashboardView> {
        views_for(self.current_user().as_ref(), &self.config)
    }

    pub fn route(&self, path: &str) -> Route {
        resolve_route(path, self.current_user().as_ref(), &self.config)
    }

    pub fn client_config_path(&self, client_email: &str) -> DocPath {
        DocPath::new(self.config.clients_collection.as_str(), client_email)
    }

    pub fn health_path(&self) -> DocPath {
        DocPath::new(self.config.admin_collection.as_str(), self.config.health_document.as_str())
    }

    fn signed_in(&self) -> Result<User> {
        self.current_user().ok_or_else(|| anyhow!("Not signed in"))
    }

    fn signed_in_admin(&self) -> Result<User> {
        let user = self.signed_in()?;
        if !self.is_admin(&user) {
            return Err(anyhow!("{} is not an admin", user.email));
        }
        Ok(user)
    }

    /// Binds a field of the signed-in client's config document.
    pub fn bind<V>(&self, field: Field<ClientConfig, V>, default: V) -> Result<BoundField<ClientConfig, V>>
    where
        V: Entity + Clone + PartialEq + Send + 'static,
    {
        let user = self.signed_in()?;
        BoundField::mount(self.store.clone(), self.client_config_path(&user.email), field, default)
    }

    pub fn bind_validated<V>(
        &self,
        field: Field<ClientConfig, V>,
        default: V,
        validator: impl Fn(&V) -> bool + Send + Sync + 'static,
    ) -> Result<BoundField<ClientConfig, V>>
    where
        V: Entity + Clone + PartialEq + Send + 'static,
    {
        let user = self.signed_in()?;
        BoundField::mount_validated(self.store.clone(), self.client_config_path(&user.email), field, default, validator)
    }

    /// Inventory actions on the signed-in client's own items.
    pub fn inventory_dispatcher(&self) -> Result<Dispatcher<InventoryAction>> {
        let user = self.signed_in()?;
        Ok(Dispatcher::new(self.store.clone(), self.client_config_path(&user.email)))
    }

    pub fn clients_dispatcher(&self) -> Result<Dispatcher<ClientAction>> {
        self.signed_in_admin()?;
        Ok(Dispatcher::new(self.store.clone(), self.config.clients_collection.clone()))
    }

    pub fn health_monitor(&self) -> Result<HealthMonitor> {
        self.signed_in_admin()?;
        HealthMonitor::open(
            self.store.clone(),
            self.health_path(),
            self.config.stale_after(),
            self.config.restart_cooldown(),
        )
    }
}

#[derive(Default)]
pub struct AppContextBuilder {
    store: Option<ArcStore>,
    identity: Option<Arc<dyn IdentityProvider>>,
    config: Option<Config>,
    latency: Option<(u64, u64)>,
}

impl AppContextBuilder {
    pub fn in_memory(mut self) -> Self {
        self.store = Some(ArcStore::new(InMemoryStore::new()));
        self
    }

    pub fn sqlite<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        self.store = Some(ArcStore::new(SqliteStore::open(path)?));
        Ok(self)
    }

    pub fn store(mut self, store: ArcStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Adds latency to every store operation.
    pub fn latency(mut self, read_delay_ms: u64, write_delay_ms: u64) -> Self {
        self.latency = Some((read_delay_ms, write_delay_ms));
        self
    }

    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Without an explicit store, uses the configured database path or an
    /// in-memory store. Without an identity provider, uses a fresh
    /// `LocalIdentity`.
    pub fn build(self) -> Result<AppContext> {
        let config = self.config.unwrap_or_default();
        let store = match (self.store, &config.database_path) {
            (Some(store), _) => store,
            (None, Some(path)) => ArcStore::new(SqliteStore::open(path)?),
            (None, None) => ArcStore::new(InMemoryStore::new()),
        };
        let store = match self.latency {
            Some((read, write)) => ArcStore::new(SlowStore::new(store, read, write)),
            None => store,
        };
        let identity = self
            .identity
            .unwrap_or_else(|| Arc::new(LocalIdentity::new()));
        Ok(AppContext {
            store,
            identity,
            config,
        })
    }
}
