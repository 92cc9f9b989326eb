//! Pricing and trial descriptions derived from subscription offers.

use crate::billing::client::{PricingPhase, ProductDetails, SubscriptionOffer};
use std::fmt;

/// Unit of an ISO 8601 billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodUnit {
    /// Days.
    Day,
    /// Weeks.
    Week,
    /// Months.
    Month,
    /// Years.
    Year,
}

impl PeriodUnit {
    fn name(&self) -> &'static str {
        match self {
            PeriodUnit::Day => "day",
            PeriodUnit::Week => "week",
            PeriodUnit::Month => "month",
            PeriodUnit::Year => "year",
        }
    }
}

/// A billing period such as `P7D` or `P1M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    /// Number of units.
    pub count: u32,
    /// Unit.
    pub unit: PeriodUnit,
}

impl BillingPeriod {
    /// Parse a single-component ISO 8601 period (`PnD`, `PnW`, `PnM`, `PnY`).
    pub fn parse(iso: &str) -> Option<Self> {
        let body = iso.trim().strip_prefix('P')?;
        let unit = match body.chars().last()? {
            'D' => PeriodUnit::Day,
            'W' => PeriodUnit::Week,
            'M' => PeriodUnit::Month,
            'Y' => PeriodUnit::Year,
            _ => return None,
        };
        let count: u32 = body[..body.len() - 1].parse().ok()?;
        if count == 0 {
            return None;
        }
        Some(Self { count, unit })
    }
}

impl fmt::Display for BillingPeriod {
    /// `1 day`, `3 days`, `1 month`, `12 months`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.count == 1 { "" } else { "s" };
        write!(f, "{} {}{}", self.count, self.unit.name(), plural)
    }
}

/// Display-ready pricing for an offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingSummary {
    /// Formatted recurring price.
    pub recurring_price: Option<String>,
    /// Recurring billing period.
    pub recurring_period: Option<BillingPeriod>,
    /// Length of the free trial, if any.
    pub trial_period: Option<BillingPeriod>,
    /// One-line description, e.g. `7 days free trial, then $4.99/month`.
    pub description: String,
}

impl PricingSummary {
    /// Derive the summary from an offer's pricing phases.
    pub fn from_offer(offer: &SubscriptionOffer) -> Self {
        let trial = trial_phase(offer).and_then(|p| BillingPeriod::parse(&p.billing_period));
        let recurring = recurring_phase(offer);
        let recurring_period = recurring.and_then(|p| BillingPeriod::parse(&p.billing_period));
        let recurring_price = recurring.map(|p| p.formatted_price.clone());

        let price_text = match (&recurring_price, recurring_period) {
            (Some(price), Some(period)) if period.count == 1 => {
                format!("{price}/{}", period.unit.name())
            }
            (Some(price), Some(period)) => format!("{price} every {period}"),
            (Some(price), None) => price.clone(),
            (None, _) => "Price unavailable".to_string(),
        };

        let description = match trial {
            Some(trial) => format!("{trial} free trial, then {price_text}"),
            None => price_text,
        };

        Self {
            recurring_price,
            recurring_period,
            trial_period: trial,
            description,
        }
    }
}

/// The zero-price phase of an offer.
pub fn trial_phase(offer: &SubscriptionOffer) -> Option<&PricingPhase> {
    offer.pricing_phases.iter().find(|p| p.price_micros == 0)
}

/// The first positive-price phase of an offer.
pub fn recurring_phase(offer: &SubscriptionOffer) -> Option<&PricingPhase> {
    offer.pricing_phases.iter().find(|p| p.price_micros > 0)
}

/// Pick the offer to sell: one with a free trial if available, else the first.
pub fn select_offer(product: &ProductDetails) -> Option<&SubscriptionOffer> {
    product
        .offers
        .iter()
        .find(|o| trial_phase(o).is_some() && recurring_phase(o).is_some())
        .or_else(|| product.offers.first())
}
