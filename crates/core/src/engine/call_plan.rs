//! Contract call construction.
//!
//! The plan shape is fixed by currency kind:
//!
//! ```text
//! Native: [distributeNative(b0) +v0, distributeNative(b1) +v1, ...]
//! Token:  [approve(distributor, Σ totals), distributeToken(token, b0, t0), ...]
//! ```

use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolCall, sol};

use crate::models::{Batch, Call, CallKind, CallPlan, Currency, CurrencyKind};

sol! {
    /// Minimal ERC-20 surface needed before a token distribution.
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
    }

    /// Tip distribution contract.
    interface ITipDistributor {
        function distributeNative(address[] recipients) external payable;
        function distributeToken(address token, address[] recipients, uint256 amount) external;
    }
}

/// Deployed contract addresses the plan targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    /// Tip distribution contract.
    pub distribution: Address,
}

/// Build the ordered call plan for `batches`.
///
/// Pure and deterministic: identical inputs give byte-identical plans.
/// An empty batch list gives an empty plan.
pub fn build_call_plan(
    currency: &Currency,
    batches: &[Batch],
    contracts: &ContractAddresses,
) -> CallPlan {
    if batches.is_empty() {
        return CallPlan::default();
    }

    let calls = match currency.kind {
        CurrencyKind::Native => batches
            .iter()
            .map(|batch| native_distribution(batch, contracts))
            .collect(),
        CurrencyKind::Token { contract } => {
            let approved = batches.iter().fold(U256::ZERO, |acc, b| acc + b.total);
            std::iter::once(approval(contract, contracts.distribution, approved))
                .chain(
                    batches
                        .iter()
                        .map(|batch| token_distribution(contract, batch, contracts)),
                )
                .collect()
        }
    };

    CallPlan { calls }
}

fn approval(token: Address, spender: Address, amount: U256) -> Call {
    Call {
        target: token,
        value: U256::ZERO,
        payload: IERC20::approveCall { spender, amount }.abi_encode().into(),
        kind: CallKind::Approval,
    }
}

fn native_distribution(batch: &Batch, contracts: &ContractAddresses) -> Call {
    Call {
        target: contracts.distribution,
        value: batch.total,
        payload: ITipDistributor::distributeNativeCall {
            recipients: batch.recipients.clone(),
        }
        .abi_encode()
        .into(),
        kind: CallKind::Distribution { batch: batch.index },
    }
}

fn token_distribution(token: Address, batch: &Batch, contracts: &ContractAddresses) -> Call {
    Call {
        target: contracts.distribution,
        value: U256::ZERO,
        payload: ITipDistributor::distributeTokenCall {
            token,
            recipients: batch.recipients.clone(),
            amount: batch.total,
        }
        .abi_encode()
        .into(),
        kind: CallKind::Distribution { batch: batch.index },
    }
}
