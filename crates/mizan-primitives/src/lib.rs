pub mod currency;
pub mod locale;

pub use currency::{Amount, Currency, CurrencyCode, Money, Quantity};
pub use locale::Locale;
