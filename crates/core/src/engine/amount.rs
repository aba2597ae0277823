//! USD to on-chain amount conversion.
//!
//! All math is exact integer arithmetic on `U256`. A decimal `d` is treated
//! as `mantissa / 10^scale`, so
//!
//! ```text
//! floor(usd / price * 10^decimals)
//!   = floor(usd_m * 10^price_s * 10^decimals / (price_m * 10^usd_s))
//! ```
//!
//! and the only rounding step is the final floor division.

use std::num::NonZeroUsize;

use alloy_primitives::U256;
use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};
use crate::models::{Currency, Distribution, ensure_positive_usd};

/// Convert a USD amount into smallest units of `currency`.
///
/// `price` is the USD-per-unit quote. It is ignored for USD-pegged tokens and
/// required (positive, non-zero) for everything else.
pub fn compute_on_chain_amount(
    usd_amount: Decimal,
    currency: &Currency,
    price: Option<Decimal>,
) -> DomainResult<U256> {
    ensure_positive_usd(usd_amount)?;

    let (usd_m, usd_s) = decompose(usd_amount)?;
    let unit = pow10(u32::from(currency.decimals))?;

    if !currency.requires_quote() {
        // floor(usd_m * 10^decimals / 10^usd_s)
        let numerator = checked_mul(usd_m, unit)?;
        return Ok(numerator / pow10(usd_s)?);
    }

    let price = price
        .filter(|p| !p.is_zero() && p.is_sign_positive())
        .ok_or_else(|| DomainError::PriceUnavailable(currency.id.clone()))?;
    let (price_m, price_s) = decompose(price)?;

    let numerator = checked_mul(checked_mul(usd_m, pow10(price_s)?)?, unit)?;
    let denominator = checked_mul(price_m, pow10(usd_s)?)?;
    Ok(numerator / denominator)
}

/// Split `total` evenly across `recipient_count` recipients.
///
/// The remainder (at most `recipient_count - 1` smallest units) is left
/// with the payer rather than handed to an arbitrary recipient.
pub fn compute_per_recipient_share(total: U256, recipient_count: NonZeroUsize) -> Distribution {
    let count = U256::from(recipient_count.get());
    let (share, remainder) = total.div_rem(count);
    Distribution {
        total,
        share,
        remainder,
        recipient_count: recipient_count.get(),
    }
}

fn decompose(value: Decimal) -> DomainResult<(U256, u32)> {
    let mantissa = u128::try_from(value.mantissa())
        .map_err(|_| DomainError::InvalidAmount(format!("negative value {}", value)))?;
    Ok((U256::from(mantissa), value.scale()))
}

fn pow10(exp: u32) -> DomainResult<U256> {
    let ten = U256::from(10u8);
    (0..exp).try_fold(U256::from(1u8), |acc, _| checked_mul(acc, ten))
}

fn checked_mul(a: U256, b: U256) -> DomainResult<U256> {
    a.checked_mul(b)
        .ok_or_else(|| DomainError::InvalidAmount("amount exceeds 256-bit range".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CurrencyKind, PricingMode};
    use alloy_primitives::Address;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn native() -> Currency {
        Currency {
            id: "eth".into(),
            decimals: 18,
            kind: CurrencyKind::Native,
            pricing: PricingMode::Market,
        }
    }

    fn token(decimals: u8, pricing: PricingMode) -> Currency {
        Currency {
            id: "tok".into(),
            decimals,
            kind: CurrencyKind::Token {
                contract: Address::repeat_byte(0x11),
            },
            pricing,
        }
    }

    fn n(count: usize) -> NonZeroUsize {
        NonZeroUsize::new(count).unwrap()
    }

    // $5 at $2500/ETH is 0.002 ETH
    #[test]
    fn native_amount_uses_quote() {
        let amount = compute_on_chain_amount(dec!(5), &native(), Some(dec!(2500))).unwrap();
        assert_eq!(amount, U256::from(2_000_000_000_000_000u64));
    }

    // $1.00 of a 6-decimal stable token needs no quote
    #[test]
    fn pegged_token_ignores_quote() {
        let currency = token(6, PricingMode::UsdPegged);
        let amount = compute_on_chain_amount(dec!(1.00), &currency, None).unwrap();
        assert_eq!(amount, U256::from(1_000_000u64));

        let split = compute_per_recipient_share(amount, n(3));
        assert_eq!(split.share, U256::from(333_333u64));
        assert_eq!(split.remainder, U256::from(1u8));
    }

    #[test]
    fn market_token_uses_own_decimals() {
        let currency = token(8, PricingMode::Market);
        // $3 at $1.5 per unit = 2 units = 2 * 10^8
        let amount = compute_on_chain_amount(dec!(3), &currency, Some(dec!(1.5))).unwrap();
        assert_eq!(amount, U256::from(200_000_000u64));
    }

    // Critical: floor, never round up
    #[test]
    fn amounts_are_floored() {
        // $1 at $3 per unit with 2 decimals = 33.33.. -> 33
        let currency = token(2, PricingMode::Market);
        let amount = compute_on_chain_amount(dec!(1), &currency, Some(dec!(3))).unwrap();
        assert_eq!(amount, U256::from(33u8));

        // $0.019 pegged with 2 decimals -> 1
        let pegged = token(2, PricingMode::UsdPegged);
        let amount = compute_on_chain_amount(dec!(0.019), &pegged, None).unwrap();
        assert_eq!(amount, U256::from(1u8));
    }

    #[test]
    fn missing_or_zero_quote_is_price_unavailable() {
        for price in [None, Some(dec!(0)), Some(dec!(-2))] {
            let err = compute_on_chain_amount(dec!(5), &native(), price).unwrap_err();
            assert_eq!(err, DomainError::PriceUnavailable("eth".into()));
        }
    }

    #[test]
    fn non_positive_usd_is_invalid() {
        for usd in [dec!(0), dec!(-1)] {
            let err = compute_on_chain_amount(usd, &native(), Some(dec!(1))).unwrap_err();
            assert!(matches!(err, DomainError::InvalidAmount(_)));
        }
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        let absurd = token(u8::MAX, PricingMode::UsdPegged);
        let err = compute_on_chain_amount(dec!(1), &absurd, None).unwrap_err();
        assert!(matches!(err, DomainError::InvalidAmount(_)));
    }

    proptest! {
        #[test]
        fn share_times_count_plus_remainder_is_total(
            total in any::<u128>(),
            count in 1usize..10_000,
        ) {
            let total = U256::from(total);
            let split = compute_per_recipient_share(total, n(count));
            prop_assert_eq!(split.share * U256::from(count) + split.remainder, total);
            prop_assert!(split.remainder < U256::from(count));
            prop_assert_eq!(split.distributed() + split.remainder, total);
        }
    }
}
