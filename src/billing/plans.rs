//! Subscription plan configuration.
//!
//! Plans are defined in code with the builder pattern:
//!
//! ```rust
//! use librarium::billing::Plans;
//!
//! let plans = Plans::builder()
//!     .plan("free")
//!         .display_name("Free")
//!         .free()
//!         .done()
//!     .plan("starter")
//!         .display_name("Starter")
//!         .monthly_price("price_starter_monthly")
//!         .yearly_price("price_starter_yearly")
//!         .currency("usd")
//!         .trial_days(14)
//!         .done()
//!     .build();
//!
//! assert!(plans.get("free").unwrap().is_free);
//! ```

use super::client::BillingPeriod;
use std::collections::HashMap;

/// A collection of plan configurations.
#[derive(Clone, Debug, Default)]
pub struct Plans {
    plans: HashMap<String, PlanConfig>,
}

impl Plans {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> PlansBuilder {
        PlansBuilder::new()
    }

    /// Get a plan by ID.
    #[must_use]
    pub fn get(&self, plan_id: &str) -> Option<&PlanConfig> {
        self.plans.get(plan_id)
    }

    #[must_use]
    pub fn contains(&self, plan_id: &str) -> bool {
        self.plans.contains_key(plan_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PlanConfig)> {
        self.plans.iter().map(|(id, config)| (id.as_str(), config))
    }
}

/// Configuration for a single plan.
#[derive(Clone, Debug)]
pub struct PlanConfig {
    pub id: String,
    pub display_name: String,
    /// Stripe price for monthly billing.
    pub monthly_price_id: Option<String>,
    /// Stripe price for yearly billing.
    pub yearly_price_id: Option<String>,
    /// ISO currency the plan's prices are denominated in.
    pub currency: String,
    /// Free tier: no checkout, no processor involvement.
    pub is_free: bool,
    pub trial_days: Option<u32>,
}

impl PlanConfig {
    /// The price ID for a billing period, if the plan is purchasable in it.
    #[must_use]
    pub fn price_for(&self, period: BillingPeriod) -> Option<&str> {
        match period {
            BillingPeriod::Monthly => self.monthly_price_id.as_deref(),
            BillingPeriod::Yearly => self.yearly_price_id.as_deref(),
        }
    }
}

/// Builder for [`Plans`].
#[must_use = "builder does nothing until you call build()"]
#[derive(Debug, Default)]
pub struct PlansBuilder {
    plans: Vec<PlanConfig>,
}

impl PlansBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start configuring a plan.
    pub fn plan(self, id: impl Into<String>) -> PlanBuilder {
        let id = id.into();
        PlanBuilder {
            parent: self,
            config: PlanConfig {
                display_name: id.clone(),
                id,
                monthly_price_id: None,
                yearly_price_id: None,
                currency: "usd".to_string(),
                is_free: false,
                trial_days: None,
            },
        }
    }

    pub fn build(self) -> Plans {
        Plans {
            plans: self
                .plans
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
        }
    }
}

/// Builder for a single plan inside [`PlansBuilder`].
#[must_use = "call done() to add the plan"]
#[derive(Debug)]
pub struct PlanBuilder {
    parent: PlansBuilder,
    config: PlanConfig,
}

impl PlanBuilder {
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.config.display_name = name.into();
        self
    }

    pub fn monthly_price(mut self, price_id: impl Into<String>) -> Self {
        self.config.monthly_price_id = Some(price_id.into());
        self
    }

    pub fn yearly_price(mut self, price_id: impl Into<String>) -> Self {
        self.config.yearly_price_id = Some(price_id.into());
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.config.currency = currency.into();
        self
    }

    /// Mark this plan as the free tier.
    pub fn free(mut self) -> Self {
        self.config.is_free = true;
        self
    }

    pub fn trial_days(mut self, days: u32) -> Self {
        self.config.trial_days = Some(days);
        self
    }

    /// Finish this plan and return to the parent builder.
    pub fn done(mut self) -> PlansBuilder {
        self.parent.plans.push(self.config);
        self.parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_plans() -> Plans {
        Plans::builder()
            .plan("free")
                .free()
                .done()
            .plan("starter")
                .monthly_price("price_starter_m")
                .yearly_price("price_starter_y")
                .trial_days(14)
                .done()
            .plan("pro")
                .monthly_price("price_pro_m")
                .done()
            .build()
    }

    #[test]
    fn builder_registers_plans() {
        let plans = test_plans();
        assert!(plans.contains("free"));
        assert!(plans.get("free").unwrap().is_free);
        assert_eq!(plans.get("starter").unwrap().trial_days, Some(14));
        assert!(plans.get("enterprise").is_none());
    }

    #[test]
    fn price_lookup_respects_period() {
        let plans = test_plans();
        let starter = plans.get("starter").unwrap();
        assert_eq!(
            starter.price_for(BillingPeriod::Monthly),
            Some("price_starter_m")
        );
        assert_eq!(
            starter.price_for(BillingPeriod::Yearly),
            Some("price_starter_y")
        );

        let pro = plans.get("pro").unwrap();
        assert!(pro.price_for(BillingPeriod::Yearly).is_none());
    }
}
