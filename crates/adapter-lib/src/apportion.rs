//! Splitting an aggregate value across selector-matched objects

use crate::error::{ProviderError, Result};

/// Give every target `floor(total * 100 / targets.len())`, in target order.
///
/// Every target gets the same share and the remainder of the division is
/// dropped. An empty target list is rejected before dividing.
pub fn apportion(total: i64, targets: Vec<String>) -> Result<Vec<(String, i64)>> {
    if targets.is_empty() {
        return Err(ProviderError::NoMatchingObjects);
    }

    let share = total.saturating_mul(100) / targets.len() as i64;
    Ok(targets.into_iter().map(|name| (name, share)).collect())
}
