use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurrencyCode([u8; 8]);

impl CurrencyCode {
    pub fn new(code: &str) -> Self {
        let mut bytes = [0u8; 8];
        for (dst, src) in bytes.iter_mut().zip(code.bytes()) {
            *dst = src.to_ascii_uppercase();
        }
        Self(bytes)
    }

    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(8);
        // Constructors only write ASCII, but a code truncated mid-way through
        // a multi-byte character would not be valid UTF-8.
        std::str::from_utf8(&self.0[..len]).unwrap_or("")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurrencyCode({:?})", self.as_str())
    }
}

impl Serialize for CurrencyCode {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(Self::new(&s))
    }
}

/// The shop's trading currency. Every amount in the books is denominated in
/// a single currency; `decimals` drives rounding of computed totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    pub code: CurrencyCode,
    pub decimals: u8,
}

impl Currency {
    pub fn new(code: &str, decimals: u8) -> Self {
        Self {
            code: CurrencyCode::new(code),
            decimals,
        }
    }

    pub fn usd() -> Self {
        Self::new("USD", 2)
    }

    pub fn sar() -> Self {
        Self::new("SAR", 2)
    }

    pub fn egp() -> Self {
        Self::new("EGP", 2)
    }

    /// Construct a `Currency` from a [`CurrencyCode`], inferring the minor
    /// unit precision from ISO 4217 for the codes the shop is likely to use.
    ///
    /// Unknown codes default to 2 decimals.
    pub fn from_code(code: CurrencyCode) -> Self {
        let decimals = match code.as_str() {
            "KWD" | "BHD" | "OMR" | "JOD" | "IQD" | "LYD" | "TND" => 3,
            "JPY" | "KRW" => 0,
            _ => 2,
        };
        Self { code, decimals }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn is_sign_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// `None` when the sum leaves `Decimal`'s range.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Line total; `None` on overflow.
    pub fn checked_mul(self, qty: Quantity) -> Option<Self> {
        self.0.checked_mul(qty.0).map(Self)
    }

    /// Clamps at `Decimal`'s bounds. Report totals only.
    #[must_use]
    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    #[must_use]
    pub fn saturating_mul(self, qty: Quantity) -> Self {
        Self(self.0.saturating_mul(qty.0))
    }

    /// Round half-away-from-zero to the currency's minor unit.
    #[must_use]
    pub fn round_to(self, currency: Currency) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(
                    u32::from(currency.decimals),
                    RoundingStrategy::MidpointAwayFromZero,
                )
                .normalize(),
        )
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Decimal> for Amount {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl From<Amount> for Decimal {
    fn from(a: Amount) -> Self {
        a.0
    }
}

impl Add<Amount> for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Sub<Amount> for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl AddAssign<Amount> for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl SubAssign<Amount> for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl Mul<Quantity> for Amount {
    type Output = Amount;

    fn mul(self, rhs: Quantity) -> Amount {
        Amount(self.0 * rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Stock quantity. Decimal so that products sold by weight or length
/// (`kg`, `m`) are exact.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn is_sign_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Decimal> for Quantity {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl From<Quantity> for Decimal {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl Add<Quantity> for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 + rhs.0)
    }
}

impl Sub<Quantity> for Quantity {
    type Output = Quantity;

    fn sub(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 - rhs.0)
    }
}

impl AddAssign<Quantity> for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        self.0 += rhs.0;
    }
}

impl SubAssign<Quantity> for Quantity {
    fn sub_assign(&mut self, rhs: Quantity) {
        self.0 -= rhs.0;
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Quantity {
        Quantity(-self.0)
    }
}

impl Mul<Amount> for Quantity {
    type Output = Amount;

    fn mul(self, rhs: Amount) -> Amount {
        Amount(self.0 * rhs.0)
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::ZERO, Add::add)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Amount,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Amount, currency: Currency) -> Self {
        Self { amount, currency }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount.round_to(self.currency), self.currency)
    }
}

#[cfg(test)]
mod tests {
    use std::hash::{DefaultHasher, Hash, Hasher};

    use anyhow::{Context, Result};
    use rust_decimal::dec;

    use super::*;

    #[test]
    fn test_currency_new_uppercases_code() {
        let currency = Currency::new("sar", 2);
        assert_eq!(currency.code.as_str(), "SAR");
        assert_eq!(currency.decimals, 2);
    }

    #[test]
    fn test_currency_defaults() {
        assert_eq!(Currency::usd().code.as_str(), "USD");
        assert_eq!(Currency::sar().code.as_str(), "SAR");
        assert_eq!(Currency::egp().decimals, 2);
    }

    #[test]
    fn test_currency_display_trait() {
        let currency = Currency::new("KWD", 3);
        assert_eq!(format!("{currency}"), "KWD");
    }

    #[test]
    fn test_currency_hash_matches_equal_values() {
        let mut h1 = DefaultHasher::new();
        Currency::sar().hash(&mut h1);
        let mut h2 = DefaultHasher::new();
        Currency::new("SAR", 2).hash(&mut h2);
        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn test_currency_serialization() -> Result<()> {
        let c = Currency::sar();
        let serialized = serde_json::to_string(&c).context("Failed to serialize")?;
        assert!(serialized.contains("SAR"));

        let deserialized: Currency =
            serde_json::from_str(&serialized).context("Failed to deserialize")?;
        assert_eq!(c, deserialized);
        Ok(())
    }

    #[test]
    fn test_currency_from_code_three_decimal_dinars() {
        let kwd = Currency::from_code(CurrencyCode::new("KWD"));
        assert_eq!(kwd.decimals, 3);
        let jod = Currency::from_code(CurrencyCode::new("jod"));
        assert_eq!(jod.decimals, 3);
    }

    #[test]
    fn test_currency_from_code_zero_decimals() {
        assert_eq!(Currency::from_code(CurrencyCode::new("JPY")).decimals, 0);
    }

    #[test]
    fn test_currency_from_code_unknown_defaults_to_2() {
        let unknown = Currency::from_code(CurrencyCode::new("XYZ"));
        assert_eq!(unknown.decimals, 2);
    }

    #[test]
    fn test_currency_code_truncates_to_eight_bytes() {
        let code = CurrencyCode::new("ABCDEFGHIJ");
        assert_eq!(code.as_str(), "ABCDEFGH");
    }

    #[test]
    fn test_amount_arithmetic() {
        let a = Amount::from(dec!(100));
        let b = Amount::from(dec!(50));

        assert_eq!(a + b, Amount::from(dec!(150)));
        assert_eq!(a - b, Amount::from(dec!(50)));
        assert_eq!(-b, Amount::from(dec!(-50)));

        let mut c = Amount::from(dec!(10));
        c += Amount::from(dec!(5));
        assert_eq!(c, Amount::from(dec!(15)));
        c -= Amount::from(dec!(3));
        assert_eq!(c, Amount::from(dec!(12)));
    }

    #[test]
    fn test_amount_sign_predicates() {
        assert!(Amount::from(dec!(-1)).is_sign_negative());
        assert!(!Amount::ZERO.is_sign_negative());
        assert!(!Amount::from(dec!(-0)).is_sign_negative());
        assert!(Amount::from(dec!(0.01)).is_positive());
        assert!(!Amount::ZERO.is_positive());
        assert!(Amount::from(dec!(0.00)).is_zero());
    }

    #[test]
    fn test_amount_times_quantity() {
        let price = Amount::from(dec!(12.50));
        let qty = Quantity::from(dec!(3));
        assert_eq!(price * qty, Amount::from(dec!(37.5)));
        assert_eq!(qty * price, Amount::from(dec!(37.5)));
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        let huge = Amount::from(Decimal::MAX);
        assert_eq!(huge.checked_mul(Quantity::from(dec!(2))), None);
        assert_eq!(huge.checked_add(Amount::from(dec!(1))), None);
        assert_eq!(Amount::from(Decimal::MIN).checked_sub(Amount::from(dec!(1))), None);
        assert_eq!(
            Quantity::from(Decimal::MAX).checked_add(Quantity::from(dec!(1))),
            None
        );

        let price = Amount::from(dec!(12.50));
        assert_eq!(
            price.checked_mul(Quantity::from(dec!(3))),
            Some(Amount::from(dec!(37.5)))
        );
        assert_eq!(
            price.checked_sub(Amount::from(dec!(2.5))),
            Some(Amount::from(dec!(10)))
        );
        assert_eq!(
            Quantity::from(dec!(4)).checked_sub(Quantity::from(dec!(5))),
            Some(Quantity::from(dec!(-1)))
        );

        assert_eq!(huge.saturating_mul(Quantity::from(dec!(2))), huge);
        assert_eq!(huge.saturating_add(huge), huge);
        assert_eq!(
            Amount::from(Decimal::MIN).saturating_sub(huge),
            Amount::from(Decimal::MIN)
        );
    }

    #[test]
    fn test_amount_round_to_currency() {
        let a = Amount::from(dec!(10.005));
        assert_eq!(a.round_to(Currency::usd()), Amount::from(dec!(10.01)));
        assert_eq!(
            Amount::from(dec!(1.23456)).round_to(Currency::new("KWD", 3)),
            Amount::from(dec!(1.235))
        );
    }

    #[test]
    fn test_amount_sum() {
        let total: Amount = [dec!(1.5), dec!(2.25), dec!(3)]
            .into_iter()
            .map(Amount::from)
            .sum();
        assert_eq!(total, Amount::from(dec!(6.75)));
    }

    #[test]
    fn test_amount_deserializes_from_number_and_string() -> Result<()> {
        let from_str: Amount = serde_json::from_str(r#""19.99""#)?;
        let from_num: Amount = serde_json::from_str("20")?;
        assert_eq!(from_str, Amount::from(dec!(19.99)));
        assert_eq!(from_num, Amount::from(dec!(20)));
        Ok(())
    }

    #[test]
    fn test_quantity_arithmetic() {
        let mut q = Quantity::from(dec!(10));
        q -= Quantity::from(dec!(2.5));
        assert_eq!(q, Quantity::from(dec!(7.5)));
        q += Quantity::from(dec!(0.5));
        assert_eq!(q, Quantity::from(dec!(8)));
        assert!((Quantity::ZERO - q).is_sign_negative());
        assert!(q.is_positive());
    }

    #[test]
    fn test_money_display_rounds_to_currency() {
        let m = Money::new(Amount::from(dec!(99.999)), Currency::sar());
        assert_eq!(m.to_string(), "100 SAR");
        let m = Money::new(Amount::from(dec!(12.5)), Currency::usd());
        assert_eq!(m.to_string(), "12.5 USD");
    }

    #[test]
    fn test_money_serialization() -> Result<()> {
        let m = Money::new(Amount::from(dec!(123.45)), Currency::sar());
        let serialized = serde_json::to_string(&m).context("Failed to serialize")?;
        let deserialized: Money =
            serde_json::from_str(&serialized).context("Failed to deserialize")?;
        assert_eq!(m, deserialized);
        Ok(())
    }
}
