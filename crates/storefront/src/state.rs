//! Application state shared across handlers.

use std::sync::Arc;

use crate::carts::CartStore;
use crate::catalog::{CatalogService, CatalogSource, PerformanceMonitor};
use crate::config::StorefrontConfig;
use crate::stripe::{CheckoutProvider, StripeClient, StripeError};
use crate::supabase::{AuthError, AuthProvider, SupabaseClient};

/// Error building the application state from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to build Stripe client: {0}")]
    Stripe(#[from] StripeError),
    #[error("failed to build Supabase client: {0}")]
    Supabase(#[from] AuthError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// catalog cache, the payment and auth providers, and the cart store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: CatalogService,
    checkout: Arc<dyn CheckoutProvider>,
    auth: Arc<dyn AuthProvider>,
    carts: CartStore,
}

impl AppState {
    /// Assemble state from explicit providers.
    ///
    /// Tests pass in-process fakes here; production goes through
    /// [`AppState::from_config`].
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        catalog_source: Arc<dyn CatalogSource>,
        checkout: Arc<dyn CheckoutProvider>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let monitor = PerformanceMonitor::new(config.catalog.slow_call_threshold);
        let catalog = CatalogService::new(catalog_source, config.catalog.cache_ttl, monitor);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                checkout,
                auth,
                carts: CartStore::default(),
            }),
        }
    }

    /// Build the Stripe and Supabase clients from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be built.
    pub fn from_config(config: StorefrontConfig) -> Result<Self, StateError> {
        let stripe = Arc::new(StripeClient::new(&config.stripe)?);
        let supabase = Arc::new(SupabaseClient::new(&config.supabase)?);
        Ok(Self::new(
            config,
            Arc::clone(&stripe) as Arc<dyn CatalogSource>,
            stripe,
            supabase,
        ))
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the cached catalog.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    /// Get a reference to the checkout provider.
    #[must_use]
    pub fn checkout(&self) -> &dyn CheckoutProvider {
        self.inner.checkout.as_ref()
    }

    /// Get a reference to the auth provider.
    #[must_use]
    pub fn auth(&self) -> &dyn AuthProvider {
        self.inner.auth.as_ref()
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn carts(&self) -> &CartStore {
        &self.inner.carts
    }
}
