//! Business interpretation of the clusters.
//!
//! The numbering of clusters is a property of one trained model. The
//! [`PersonaTable`] is therefore configuration: the default table matches the
//! shipped artifacts, and an artifact manifest can pin another mapping for a
//! retrained model. The persona texts themselves never change at runtime.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::segmenter::ClusterId;

/// Color used for clusters that have no persona.
pub const FALLBACK_COLOR: &str = "#f0f2f6";

/// Strategy text shown for clusters that have no persona.
pub const STRATEGY_NOT_AVAILABLE: &str = "Strategy not available for this cluster.";

/// Everything the dashboard shows about one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonaRecord {
    pub name: Cow<'static, str>,
    /// Hex color (`#rrggbb`) used for the banner and the scatter plot
    pub display_color: Cow<'static, str>,
    pub short_description: Cow<'static, str>,
    /// One-line tactical suggestion
    pub recommended_action: Cow<'static, str>,
    /// Multi-section playbook in Markdown
    pub full_strategy_text: Cow<'static, str>,
}

impl PersonaRecord {
    /// Placeholder for a cluster id without a persona
    pub fn fallback(id: ClusterId) -> Self {
        Self {
            name: Cow::Owned(format!("Cluster {}", id)),
            display_color: Cow::Borrowed(FALLBACK_COLOR),
            short_description: Cow::Borrowed("Unknown customer type."),
            recommended_action: Cow::Borrowed("Further analysis required."),
            full_strategy_text: Cow::Borrowed(STRATEGY_NOT_AVAILABLE),
        }
    }
}

/// The four customer personas found in the training data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    BigSpender,
    BudgetShoppers,
    QualitySeekers,
    TheWhales,
}

impl Persona {
    pub const ALL: [Persona; 4] = [
        Persona::BigSpender,
        Persona::TheWhales,
        Persona::QualitySeekers,
        Persona::BudgetShoppers,
    ];

    pub fn record(&self) -> &'static PersonaRecord {
        match self {
            Persona::BigSpender => &BIG_SPENDER,
            Persona::BudgetShoppers => &BUDGET_SHOPPERS,
            Persona::QualitySeekers => &QUALITY_SEEKERS,
            Persona::TheWhales => &THE_WHALES,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Persona::BigSpender => "Big Spender",
            Persona::BudgetShoppers => "Budget Shoppers",
            Persona::QualitySeekers => "Quality Seekers",
            Persona::TheWhales => "The Whales",
        }
    }

    /// One-line summary used on the landing view
    pub fn headline(&self) -> &'static str {
        match self {
            Persona::BigSpender => "High transaction value.",
            Persona::BudgetShoppers => "Thrifty, budget-minded buyers.",
            Persona::QualitySeekers => "Buys expensive, high-quality items.",
            Persona::TheWhales => "Massive purchase volumes.",
        }
    }

    /// Looks a persona up by its display name
    pub fn from_name(name: &str) -> Option<Persona> {
        Persona::ALL.iter().copied().find(|p| p.name() == name)
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mapping from cluster ids to personas for one specific trained model.
///
/// Always a bijection: ids `0..4` each map to a distinct [`Persona`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<ClusterId, Persona>", into = "BTreeMap<ClusterId, Persona>")]
pub struct PersonaTable {
    mapping: BTreeMap<ClusterId, Persona>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersonaTableError {
    #[error("persona mapping must cover {expected} clusters, got {actual}")]
    WrongSize { expected: usize, actual: usize },
    #[error("cluster id {id} is outside 0..{expected}")]
    UnexpectedId { id: ClusterId, expected: usize },
    #[error("persona '{persona}' is mapped to both cluster {first} and cluster {second}")]
    DuplicatePersona {
        persona: Persona,
        first: ClusterId,
        second: ClusterId,
    },
}

impl TryFrom<BTreeMap<ClusterId, Persona>> for PersonaTable {
    type Error = PersonaTableError;

    fn try_from(mapping: BTreeMap<ClusterId, Persona>) -> Result<Self, Self::Error> {
        let expected = Persona::ALL.len();
        if mapping.len() != expected {
            return Err(PersonaTableError::WrongSize { expected, actual: mapping.len() });
        }
        let mut seen: BTreeMap<Persona, ClusterId> = BTreeMap::new();
        for (&id, &persona) in &mapping {
            if !(0..expected as i64).contains(&id.0) {
                return Err(PersonaTableError::UnexpectedId { id, expected });
            }
            if let Some(first) = seen.insert(persona, id) {
                return Err(PersonaTableError::DuplicatePersona { persona, first, second: id });
            }
        }
        Ok(Self { mapping })
    }
}

impl From<PersonaTable> for BTreeMap<ClusterId, Persona> {
    fn from(table: PersonaTable) -> Self {
        table.mapping
    }
}

lazy_static! {
    static ref DEFAULT_TABLE: PersonaTable = PersonaTable {
        mapping: BTreeMap::from([
            (ClusterId(0), Persona::BigSpender),
            (ClusterId(1), Persona::BudgetShoppers),
            (ClusterId(2), Persona::QualitySeekers),
            (ClusterId(3), Persona::TheWhales),
        ]),
    };
}

impl Default for PersonaTable {
    fn default() -> Self {
        DEFAULT_TABLE.clone()
    }
}

impl PersonaTable {
    /// Builds a table from `(id, persona)` pairs, rejecting anything that is
    /// not a one-to-one mapping of ids `0..4`.
    pub fn new(entries: impl IntoIterator<Item = (ClusterId, Persona)>) -> Result<Self, PersonaTableError> {
        Self::try_from(entries.into_iter().collect::<BTreeMap<_, _>>())
    }

    /// The mapping calibrated against the shipped k-means model
    pub fn builtin() -> &'static PersonaTable {
        &DEFAULT_TABLE
    }

    pub fn persona(&self, id: ClusterId) -> Option<Persona> {
        self.mapping.get(&id).copied()
    }

    /// Resolves any cluster id to a record; unknown ids get the placeholder.
    pub fn resolve(&self, id: ClusterId) -> Cow<'static, PersonaRecord> {
        match self.persona(id) {
            Some(persona) => Cow::Borrowed(persona.record()),
            None => Cow::Owned(PersonaRecord::fallback(id)),
        }
    }

    /// Display name for a cluster id, as used to label sample rows
    pub fn name_for(&self, id: ClusterId) -> Cow<'static, str> {
        match self.persona(id) {
            Some(persona) => Cow::Borrowed(persona.name()),
            None => Cow::Owned(format!("Cluster {}", id)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClusterId, Persona)> + '_ {
        self.mapping.iter().map(|(&id, &persona)| (id, persona))
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// Resolves a cluster id against the built-in table.
///
/// Total over the whole integer domain: ids without a persona come back as a
/// `"Cluster {id}"` placeholder instead of an error.
///
/// ```
/// use segmenta::{resolve_persona, ClusterId};
///
/// assert_eq!(resolve_persona(ClusterId(3)).name, "The Whales");
/// assert_eq!(resolve_persona(ClusterId(-7)).name, "Cluster -7");
/// ```
pub fn resolve_persona(id: ClusterId) -> Cow<'static, PersonaRecord> {
    PersonaTable::builtin().resolve(id)
}

static BIG_SPENDER: PersonaRecord = PersonaRecord {
    name: Cow::Borrowed("Big Spender"),
    display_color: Cow::Borrowed("#2ca02c"),
    short_description: Cow::Borrowed(
        "Top-tier customers with very high transaction values. Low price sensitivity.",
    ),
    recommended_action: Cow::Borrowed(
        "Strategy: priority service, cross-sell exclusive products, concierge service.",
    ),
    full_strategy_text: Cow::Borrowed(
        "**Summary:** Customers with very high transaction values. Low price sensitivity; focus on experience and exclusivity.

**Short-term tactics:**
- Exclusive offers (early access, limited bundles).
- Personalized recommendations and cross-sell at checkout.

**Long-term tactics:**
- Loyalty tiers with tangible benefits (free expedited shipping, dedicated support).
- VIP retention program and premium subscription.

**Communication & channels:**
- Personal email, in-app notifications, account manager for high-value customers.

**Key KPIs:** AOV, CLTV, repeat purchase rate, churn rate.

**Example campaign:** \"VIP Preview + White-Glove Delivery\" (early access + premium delivery service).
",
    ),
};

static BUDGET_SHOPPERS: PersonaRecord = PersonaRecord {
    name: Cow::Borrowed("Budget Shoppers"),
    display_color: Cow::Borrowed("#d62728"),
    short_description: Cow::Borrowed(
        "Small transactions, cheap items and low quantities. Highly price sensitive.",
    ),
    recommended_action: Cow::Borrowed(
        "Strategy: minimum-spend vouchers (to grow basket size), flash sales, shipping discounts.",
    ),
    full_strategy_text: Cow::Borrowed(
        "**Summary:** Price-sensitive buyers; low transaction values and low prices, responsive to discounts.

**Short-term tactics:**
- Targeted coupons and discounts, free-shipping threshold, flash sales.
- Cheap bundles to increase basket size.

**Long-term tactics:**
- Loyalty program that accelerates rewards for small purchases.
- Retargeting with personalized vouchers and referral incentives.

**Communication & channels:**
- Promo-driven emails, push notifications, discount-targeted social ads.

**Key KPIs:** Conversion rate, average basket size, coupon redemption rate, repeat frequency.

**Example campaign:** \"Buy 2 Get 1 / 10% off with Min Spend\".
",
    ),
};

static QUALITY_SEEKERS: PersonaRecord = PersonaRecord {
    name: Cow::Borrowed("Quality Seekers"),
    display_color: Cow::Borrowed("#ff7f0e"),
    short_description: Cow::Borrowed(
        "Buys items with a high unit price (good quality), but not in large quantities.",
    ),
    recommended_action: Cow::Borrowed(
        "Strategy: premium product bundling, offer limited-edition products and new arrivals.",
    ),
    full_strategy_text: Cow::Borrowed(
        "**Summary:** Buyers of high-value-per-unit products; quality and features come first.

**Short-term tactics:**
- Highlight product benefits (reviews, demos, UGC).
- Premium bundle offers and free trials / warranty extensions.

**Long-term tactics:**
- Loyalty program for premium purchases, membership with benefits.

**Communication & channels:**
- Content marketing, influencers, interest-based targeted email.

**Key KPIs:** Conversion rate on premium products, AOV, margin.

**Example campaign:** \"Premium Bundle + Extended Warranty\".
",
    ),
};

static THE_WHALES: PersonaRecord = PersonaRecord {
    name: Cow::Borrowed("The Whales"),
    display_color: Cow::Borrowed("#1f77b4"),
    short_description: Cow::Borrowed(
        "Buys in massive quantities at a low unit price. Resellers / B2B.",
    ),
    recommended_action: Cow::Borrowed(
        "Strategy: bulk discounts, large bundle packages, B2B loyalty program.",
    ),
    full_strategy_text: Cow::Borrowed(
        "**Summary:** High-volume buyers (B2B / resellers). Low price per unit, high total order value.

**Short-term tactics:**
- Tiered volume discounts and wholesale packages.
- B2B checkout options (invoices, tax forms).

**Long-term tactics:**
- B2B portal, negotiated price contracts, dedicated account manager.
- ERP / purchase-order integration for large customers.

**Communication & channels:**
- Sales outreach, business email, special price catalogs.

**Key KPIs:** Units per order, repeat order frequency, margin per bulk order.

**Example campaign:** \"Tiered Volume Discount + Dedicated B2B Account\".
",
    ),
};
