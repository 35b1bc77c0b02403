// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EIP-1559 fee parameters for fulfillment transactions.

/// Upper bound of the priority fee (0.1 gwei).
pub const PRIORITY_FEE_CAP_WEI: u128 = 100_000_000;

/// Gas limit used when none is configured.
pub const DEFAULT_GAS_LIMIT: u64 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeParams {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Fees derived from the current base fee.
///
/// - priority fee: `min(0.1 gwei, 80% of base fee)`
/// - max fee: `120% of base fee`
///
/// The priority fee never exceeds the max fee, and the max fee never falls
/// below the base fee.
pub fn fee_params(base_fee: u128) -> FeeParams {
    let max_priority_fee_per_gas = PRIORITY_FEE_CAP_WEI.min(base_fee.saturating_mul(8) / 10);
    // floor(1.2 * base), without overflowing near u128::MAX
    let max_fee_per_gas = base_fee.saturating_add(base_fee / 5);

    FeeParams {
        max_fee_per_gas,
        max_priority_fee_per_gas,
    }
}
