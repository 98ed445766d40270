use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO 3166-1 alpha-3 identifier of a country in the compute market.
///
/// A country is simultaneously a potential supplier of compute (with a
/// unit cost and a capacity limit) and a demand center (with a share of
/// global demand).
///
/// # Examples
///
/// ```
/// use flop_trade::core::country::CountryId;
///
/// let kgz = CountryId::new("KGZ");
/// let usa = CountryId::new("USA");
/// assert_ne!(kgz, usa);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryId(String);

impl CountryId {
    pub fn new(iso: impl Into<String>) -> Self {
        Self(iso.into())
    }

    /// Returns the ISO code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CountryId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Calibrated cost record for one country.
///
/// `unit_cost` is the all-in cost of one compute-unit-hour produced
/// domestically, `capacity` the compute-unit-hours the country can supply
/// over the clearing horizon, and `demand_weight` its share of global
/// demand. An `excluded` country (sanctioned or embargoed) cannot sell into
/// the traded market but still demands compute.
///
/// # Examples
///
/// ```
/// use flop_trade::core::country::CountryCost;
/// use rust_decimal_macros::dec;
///
/// let kgz = CountryCost::new("KGZ", "Kyrgyz Republic", dec!(1.21), dec!(5_000_000), dec!(0.002));
/// assert!(!kgz.excluded);
/// assert!(kgz.clone().sanctioned().excluded);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryCost {
    pub id: CountryId,
    pub name: String,
    pub unit_cost: Decimal,
    pub capacity: Decimal,
    pub demand_weight: Decimal,
    #[serde(default)]
    pub excluded: bool,
}

impl CountryCost {
    pub fn new(
        iso: impl Into<String>,
        name: impl Into<String>,
        unit_cost: Decimal,
        capacity: Decimal,
        demand_weight: Decimal,
    ) -> Self {
        Self {
            id: CountryId::new(iso),
            name: name.into(),
            unit_cost,
            capacity,
            demand_weight,
            excluded: false,
        }
    }

    /// Mark this country as excluded from the supply side of the market.
    pub fn sanctioned(mut self) -> Self {
        self.excluded = true;
        self
    }

    /// Whether this country may sell into the traded market.
    pub fn is_eligible_supplier(&self) -> bool {
        !self.excluded
    }
}
