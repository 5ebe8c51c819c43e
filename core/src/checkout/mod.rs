//! Checkout: order drafts, the payment intent bridge call and the
//! reservation lifecycle that follows.
//!
//! - [`OrderDraftBuilder`] prices the cart, creates the order, payment shell
//!   and reservations in one unit of work.
//! - [`CheckoutService`] runs the draft, calls the payment provider and
//!   attaches the provider intent in a second, independent write.
//! - [`ReservationLifecycle`] converts or cancels the reservations of a
//!   checkout once the payment outcome is known.

mod draft;
mod lifecycle;
mod service;

pub use draft::{DraftRequest, OrderDraftBuilder, collapse_items};
pub use lifecycle::ReservationLifecycle;
pub use service::{CheckoutReceipt, CheckoutService};
