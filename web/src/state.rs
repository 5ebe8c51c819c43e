//! Application state for Axum handlers.

use drop_commerce_core::admission::DropAdmissionEngine;
use drop_commerce_core::checkout::CheckoutService;
use drop_commerce_core::store::Store;

/// Engine services shared across all HTTP handlers.
pub struct AppState<S: Store> {
    /// Checkout orchestration
    pub checkout: CheckoutService<S>,
    /// Drop queue admission
    pub admission: DropAdmissionEngine<S>,
    /// Store, for readiness checks
    pub store: S,
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            checkout: self.checkout.clone(),
            admission: self.admission.clone(),
            store: self.store.clone(),
        }
    }
}

impl<S: Store> AppState<S> {
    /// Create a new application state.
    #[must_use]
    pub const fn new(checkout: CheckoutService<S>, admission: DropAdmissionEngine<S>, store: S) -> Self {
        Self {
            checkout,
            admission,
            store,
        }
    }
}
