//! Fixed-point money helpers. Two fractional digits, midpoint away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round to cents and pin the scale so the value always renders as `x.yy`.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// `percent`% of `base`, rounded to cents. `None` when the product leaves
/// the 96-bit range.
pub fn percent_of(base: Decimal, percent: Decimal) -> Option<Decimal> {
    base.checked_mul(percent)?
        .checked_div(Decimal::ONE_HUNDRED)
        .map(round_money)
}

/// `unit_price * quantity`, rounded to cents.
pub fn extend(unit_price: Decimal, quantity: u32) -> Option<Decimal> {
    unit_price.checked_mul(Decimal::from(quantity)).map(round_money)
}

/// Sum of `amounts`, rounded to cents.
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .map(round_money)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn pins_two_fractional_digits() {
        assert_eq!(round_money(dec!(1000)).to_string(), "1000.00");
        assert_eq!(round_money(dec!(0.5)).to_string(), "0.50");
    }

    #[test]
    fn midpoint_rounds_away_from_zero() {
        assert_eq!(round_money(dec!(0.125)), dec!(0.13));
        assert_eq!(round_money(dec!(-0.125)), dec!(-0.13));
        assert_eq!(round_money(dec!(0.124)), dec!(0.12));
    }

    #[test]
    fn percentages() {
        assert_eq!(percent_of(dec!(5000.00), dec!(10)), Some(dec!(500.00)));
        assert_eq!(percent_of(dec!(33.33), dec!(15)), Some(dec!(5.00)));
        assert_eq!(percent_of(dec!(0.10), dec!(5)), Some(dec!(0.01)));
    }

    #[test]
    fn out_of_range_arithmetic_is_none() {
        assert_eq!(percent_of(Decimal::MAX, dec!(50)), None);
        assert_eq!(extend(dec!(10000000000000000000000.00), 100_000_000), None);
        assert_eq!(extend(dec!(1.50), u32::MAX), Some(dec!(6442450942.50)));
        assert_eq!(checked_sum([Decimal::MAX, dec!(1)]), None);
        assert_eq!(checked_sum([dec!(1.005), dec!(2)]), Some(dec!(3.01)));
        assert_eq!(checked_sum(Vec::<Decimal>::new()), Some(dec!(0.00)));
    }
}
