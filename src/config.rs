use crate::error::{Result, ZipError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default tax-rate fallback applied when a ZIP's state has no county data.
pub const DEFAULT_TAX_RATE: f64 = 0.015;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// State codes eligible for screening; empty means all states
    #[serde(default)]
    pub states_allowlist: Vec<String>,
    /// Default minimum cap rate used when a query supplies none
    pub cap_threshold: f64,
    /// Default minimum debt service coverage ratio
    pub min_dscr: f64,
    /// Tax rate applied when no state average is available
    #[serde(default = "default_tax_rate")]
    pub default_tax_rate: f64,
    /// Maximum number of records in the ranked output; None keeps all
    #[serde(default)]
    pub result_limit: Option<usize>,
    pub budget: BudgetConfig,
    pub loan: LoanConfig,
    pub cash_costs: CashCostsConfig,
    pub assumptions: AssumptionsConfig,
    pub scoring_weights: ScoringWeights,
    pub data: DataConfig,
}

fn default_tax_rate() -> f64 {
    DEFAULT_TAX_RATE
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct BudgetConfig {
    /// Default maximum cash-needed filter
    pub max_cash: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LoanConfig {
    /// Annual interest rate as a decimal, e.g. 0.065
    pub rate: f64,
    pub term_years: u32,
    /// Fraction of price paid down, in (0, 1]
    pub down_payment_pct: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CashCostsConfig {
    pub closing_costs_pct: f64,
    /// Flat rehab budget added to cash needed
    #[serde(default)]
    pub rehab: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct AssumptionsConfig {
    /// Fraction of gross rent lost to vacancy
    pub vacancy_pct: f64,
    /// Annual insurance cost as a fraction of price
    pub insurance_pct: f64,
    /// Annual repairs as a fraction of annual rent
    pub repairs_pct: f64,
    /// Property management as a fraction of annual rent
    pub management_pct: f64,
    /// Capital expenditure reserve as a fraction of annual rent
    pub capex_pct: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ScoringWeights {
    pub cap_rate: f64,
    pub cash_on_cash: f64,
    pub dscr: f64,
    /// Weight on the inverse of cash needed (cheaper entry scores higher)
    pub cash_inverse: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    pub county_tax_csv: String,
    pub baselines_csv: String,
    #[serde(default)]
    pub crime_csv: Option<String>,
    #[serde(default)]
    pub inventory_csv: Option<String>,
    pub cache_dir: String,
    pub output_dir: String,
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ZipError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Range-checks every loan/expense field. All metric computation depends
    /// on these, so any violation is fatal before the pipeline starts.
    pub fn validate(&self) -> Result<()> {
        check_fraction("cap_threshold", self.cap_threshold)?;
        check_fraction("default_tax_rate", self.default_tax_rate)?;
        if !self.min_dscr.is_finite() || self.min_dscr < 0.0 {
            return Err(ZipError::Config("min_dscr must be >= 0".to_string()));
        }
        if !self.budget.max_cash.is_finite() || self.budget.max_cash < 0.0 {
            return Err(ZipError::Config("budget.max_cash must be >= 0".to_string()));
        }

        check_fraction("loan.rate", self.loan.rate)?;
        if self.loan.term_years == 0 {
            return Err(ZipError::Config("loan.term_years must be > 0".to_string()));
        }
        if !self.loan.down_payment_pct.is_finite()
            || self.loan.down_payment_pct <= 0.0
            || self.loan.down_payment_pct > 1.0
        {
            return Err(ZipError::Config(
                "loan.down_payment_pct must be in (0, 1]".to_string(),
            ));
        }

        check_fraction("cash_costs.closing_costs_pct", self.cash_costs.closing_costs_pct)?;
        if !self.cash_costs.rehab.is_finite() || self.cash_costs.rehab < 0.0 {
            return Err(ZipError::Config("cash_costs.rehab must be >= 0".to_string()));
        }

        check_fraction("assumptions.vacancy_pct", self.assumptions.vacancy_pct)?;
        check_fraction("assumptions.insurance_pct", self.assumptions.insurance_pct)?;
        check_fraction("assumptions.repairs_pct", self.assumptions.repairs_pct)?;
        check_fraction("assumptions.management_pct", self.assumptions.management_pct)?;
        check_fraction("assumptions.capex_pct", self.assumptions.capex_pct)?;

        let w = &self.scoring_weights;
        for (name, value) in [
            ("scoring_weights.cap_rate", w.cap_rate),
            ("scoring_weights.cash_on_cash", w.cash_on_cash),
            ("scoring_weights.dscr", w.dscr),
            ("scoring_weights.cash_inverse", w.cash_inverse),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ZipError::Config(format!("{name} must be >= 0")));
            }
        }
        let sum = w.cap_rate + w.cash_on_cash + w.dscr + w.cash_inverse;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ZipError::Config(format!(
                "scoring_weights must sum to 1.0, got {sum}"
            )));
        }

        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 || value >= 1.0 {
        return Err(ZipError::Config(format!("{name} must be in [0, 1)")));
    }
    Ok(())
}

impl Config {
    /// Baseline configuration shared by unit tests across the crate.
    #[cfg(test)]
    pub(crate) fn sample() -> Config {
        Config {
            states_allowlist: vec!["AL".to_string(), "GA".to_string()],
            cap_threshold: 0.05,
            min_dscr: 1.2,
            default_tax_rate: DEFAULT_TAX_RATE,
            result_limit: Some(100),
            budget: BudgetConfig { max_cash: 60_000.0 },
            loan: LoanConfig {
                rate: 0.065,
                term_years: 30,
                down_payment_pct: 0.20,
            },
            cash_costs: CashCostsConfig {
                closing_costs_pct: 0.03,
                rehab: 0.0,
            },
            assumptions: AssumptionsConfig {
                vacancy_pct: 0.05,
                insurance_pct: 0.005,
                repairs_pct: 0.05,
                management_pct: 0.08,
                capex_pct: 0.05,
            },
            scoring_weights: ScoringWeights {
                cap_rate: 0.4,
                cash_on_cash: 0.3,
                dscr: 0.2,
                cash_inverse: 0.1,
            },
            data: DataConfig {
                county_tax_csv: "data/county_property_tax.csv".to_string(),
                baselines_csv: "data/baselines.csv".to_string(),
                crime_csv: None,
                inventory_csv: None,
                cache_dir: "cache".to_string(),
                output_dir: "output".to_string(),
            },
        }
    }
}
