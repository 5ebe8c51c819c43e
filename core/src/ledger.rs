//! Inventory ledger operations used by checkout and the sweeper.
//!
//! The conditional update lives in the storage implementation
//! ([`InventoryLedger::try_reserve`]); this module turns its boolean outcome
//! into the engine's error taxonomy and groups credit-backs per variant.

use crate::error::{EngineError, EngineResult};
use crate::store::InventoryLedger;
use crate::types::{Reservation, VariantId};
use std::collections::BTreeMap;

/// Reserve `quantity` units or fail with [`EngineError::OutOfStock`].
///
/// # Errors
///
/// Returns [`EngineError::OutOfStock`] when the conditional update changed no
/// row, or a storage error.
pub async fn reserve_or_fail<L>(ledger: &mut L, variant_id: VariantId, quantity: i32) -> EngineResult<()>
where
    L: InventoryLedger + Send,
{
    if ledger.try_reserve(variant_id, quantity).await? {
        Ok(())
    } else {
        tracing::warn!(variant_id = %variant_id, quantity, "Reservation refused, not enough stock");
        Err(EngineError::OutOfStock(variant_id))
    }
}

/// Sum reservation quantities per variant, in variant order.
#[must_use]
pub fn quantities_by_variant(reservations: &[Reservation]) -> BTreeMap<VariantId, i32> {
    let mut totals = BTreeMap::new();
    for reservation in reservations {
        *totals.entry(reservation.variant_id).or_insert(0) += reservation.quantity;
    }
    totals
}

/// Credit the ledger back for reservations that left the ACTIVE state.
///
/// One clamped decrement per distinct variant, issued in variant order so
/// concurrent callers lock inventory rows in the same sequence.
///
/// # Errors
///
/// Returns a storage error if any decrement fails.
pub async fn credit_back<L>(ledger: &mut L, released: &[Reservation]) -> EngineResult<()>
where
    L: InventoryLedger + Send,
{
    for (variant_id, quantity) in quantities_by_variant(released) {
        ledger.release_reserved(variant_id, quantity).await?;
    }
    Ok(())
}
