//! Present-value lifecycle cost model.
//!
//! The model is a trait so a study can swap in its own accounting; the
//! pipeline only needs [`LifecycleModel::evaluate`].

use rv_project::LifecycleConfig;
use serde::{Deserialize, Serialize};

/// An amount spent in a given year of the analysis period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CashFlow {
    pub amount: f64,
    pub year: u32,
}

impl CashFlow {
    pub fn new(amount: f64, year: u32) -> Self {
        Self { amount, year }
    }
}

/// Case-level inputs gathered during metric extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleInputs {
    pub analysis_years: u32,
    /// First-year electricity plus gas cost, $.
    pub annual_energy_cost: f64,
    /// Operational electricity emissions per year, kg. The last entry repeats
    /// for years past the end of the list.
    pub annual_electric_co2_kg: Vec<f64>,
    pub annual_gas_co2_kg: f64,
    /// Maintenance and replacement spending.
    pub direct_costs: Vec<CashFlow>,
    /// Embodied carbon, already priced in $.
    pub embodied_co2_costs: Vec<CashFlow>,
    pub peak_electric_w: f64,
}

/// Present values of each lifecycle component, $.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleResult {
    pub direct_energy: f64,
    pub direct_maintenance: f64,
    pub operational_co2: f64,
    pub embodied_co2: f64,
    pub energy_transition: f64,
}

impl LifecycleResult {
    pub fn total(&self) -> f64 {
        self.direct_energy
            + self.direct_maintenance
            + self.operational_co2
            + self.embodied_co2
            + self.energy_transition
    }
}

pub trait LifecycleModel: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, inputs: &LifecycleInputs) -> LifecycleResult;

    /// Price applied to embodied carbon when building the inputs, $/kg.
    fn carbon_price_per_kg(&self) -> f64;
}

/// Discounted cash-flow model with a fixed real discount rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountedLifecycle {
    pub discount_rate: f64,
    pub carbon_price_per_kg: f64,
    pub transition_cost_per_kw: f64,
}

impl DiscountedLifecycle {
    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self {
            discount_rate: config.discount_rate,
            carbon_price_per_kg: config.carbon_price_per_kg,
            transition_cost_per_kw: config.transition_cost_per_kw,
        }
    }

    pub fn discount_factor(&self, year: u32) -> f64 {
        1.0 / (1.0 + self.discount_rate).powi(year as i32)
    }

    fn present_value(&self, flows: &[CashFlow]) -> f64 {
        flows
            .iter()
            .map(|f| f.amount * self.discount_factor(f.year))
            .sum()
    }
}

impl Default for DiscountedLifecycle {
    fn default() -> Self {
        Self::from_config(&LifecycleConfig::default())
    }
}

impl LifecycleModel for DiscountedLifecycle {
    fn name(&self) -> &str {
        "discounted"
    }

    fn evaluate(&self, inputs: &LifecycleInputs) -> LifecycleResult {
        let years = inputs.analysis_years;
        let transition_per_year = if years == 0 {
            0.0
        } else {
            inputs.peak_electric_w / 1000.0 * self.transition_cost_per_kw / f64::from(years)
        };

        let mut result = LifecycleResult {
            direct_maintenance: self.present_value(&inputs.direct_costs),
            embodied_co2: self.present_value(&inputs.embodied_co2_costs),
            ..Default::default()
        };
        for year in 0..years {
            let df = self.discount_factor(year);
            let electric_co2 = inputs
                .annual_electric_co2_kg
                .get(year as usize)
                .or(inputs.annual_electric_co2_kg.last())
                .copied()
                .unwrap_or(0.0);
            result.direct_energy += inputs.annual_energy_cost * df;
            result.operational_co2 +=
                (electric_co2 + inputs.annual_gas_co2_kg) * self.carbon_price_per_kg * df;
            result.energy_transition += transition_per_year * df;
        }
        result
    }

    fn carbon_price_per_kg(&self) -> f64 {
        self.carbon_price_per_kg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn undiscounted() -> DiscountedLifecycle {
        DiscountedLifecycle {
            discount_rate: 0.0,
            carbon_price_per_kg: 0.5,
            transition_cost_per_kw: 100.0,
        }
    }

    #[test]
    fn zero_rate_sums_cash_flows() {
        let inputs = LifecycleInputs {
            analysis_years: 10,
            annual_energy_cost: 1200.0,
            annual_electric_co2_kg: vec![1000.0, 800.0],
            annual_gas_co2_kg: 100.0,
            direct_costs: vec![CashFlow::new(5000.0, 0), CashFlow::new(5000.0, 5)],
            embodied_co2_costs: vec![CashFlow::new(300.0, 0)],
            peak_electric_w: 4000.0,
        };
        let result = undiscounted().evaluate(&inputs);
        assert!((result.direct_energy - 12_000.0).abs() < 1e-6);
        assert!((result.direct_maintenance - 10_000.0).abs() < 1e-6);
        // 1000 then nine years at 800, plus gas, at $0.5/kg.
        assert!((result.operational_co2 - (1000.0 + 9.0 * 800.0 + 10.0 * 100.0) * 0.5).abs() < 1e-6);
        assert!((result.embodied_co2 - 300.0).abs() < 1e-9);
        assert!((result.energy_transition - 400.0).abs() < 1e-6);
    }

    #[test]
    fn later_spending_is_worth_less() {
        let model = DiscountedLifecycle::default();
        let now = LifecycleInputs {
            direct_costs: vec![CashFlow::new(1000.0, 0)],
            ..Default::default()
        };
        let later = LifecycleInputs {
            direct_costs: vec![CashFlow::new(1000.0, 20)],
            ..Default::default()
        };
        assert!(model.evaluate(&later).direct_maintenance < model.evaluate(&now).direct_maintenance);
    }

    #[test]
    fn zero_year_analysis_only_counts_lump_sums() {
        let inputs = LifecycleInputs {
            annual_energy_cost: 1000.0,
            peak_electric_w: 5000.0,
            direct_costs: vec![CashFlow::new(250.0, 0)],
            ..Default::default()
        };
        let result = DiscountedLifecycle::default().evaluate(&inputs);
        assert_eq!(result.direct_energy, 0.0);
        assert_eq!(result.energy_transition, 0.0);
        assert_eq!(result.total(), 250.0);
    }

    proptest! {
        #[test]
        fn total_is_the_sum_of_components(
            years in 0u32..60,
            energy in 0.0f64..10_000.0,
            co2 in 0.0f64..20_000.0,
            rate in 0.0f64..0.1,
        ) {
            let model = DiscountedLifecycle { discount_rate: rate, ..Default::default() };
            let inputs = LifecycleInputs {
                analysis_years: years,
                annual_energy_cost: energy,
                annual_electric_co2_kg: vec![co2],
                ..Default::default()
            };
            let r = model.evaluate(&inputs);
            let sum = r.direct_energy + r.direct_maintenance + r.operational_co2 + r.embodied_co2 + r.energy_transition;
            prop_assert!((r.total() - sum).abs() < 1e-6);
            prop_assert!(r.direct_energy <= energy * f64::from(years) + 1e-6);
        }
    }
}
