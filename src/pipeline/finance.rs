use crate::config::{AssumptionsConfig, CashCostsConfig, LoanConfig};
use crate::types::{ScoredZipRecord, ZipRecord};

/// Monthly payment on a fixed-rate amortized loan. Zero-rate loans pay the
/// principal down linearly; a zero principal costs nothing.
pub fn monthly_payment(principal: f64, annual_rate: f64, term_years: u32) -> f64 {
    if principal <= 0.0 {
        return 0.0;
    }

    let monthly_rate = annual_rate / 12.0;
    let num_payments = f64::from(term_years * 12);

    if monthly_rate == 0.0 {
        return principal / num_payments;
    }

    let growth = (1.0 + monthly_rate).powf(num_payments);
    principal * (monthly_rate * growth) / (growth - 1.0)
}

/// Derives all investment metrics for one fused ZIP record. Pure per-record
/// computation with no cross-record dependency; the composite score is left
/// at zero for the scoring stage to fill in.
///
/// The fuser guarantees price > 0 and rent > 0, so cap rate is always
/// finite here. DSCR and cash-on-cash carry `None` for their documented
/// undefined cases instead of NaN or infinity.
pub fn compute_metrics(
    record: &ZipRecord,
    loan: &LoanConfig,
    cash_costs: &CashCostsConfig,
    assumptions: &AssumptionsConfig,
) -> ScoredZipRecord {
    let rent_annual = record.rent * 12.0;
    let egi = rent_annual * (1.0 - assumptions.vacancy_pct);

    let property_tax = record.price * record.eff_tax_rate;
    let insurance = assumptions.insurance_pct * record.price;
    let rent_based_opex =
        (assumptions.repairs_pct + assumptions.management_pct + assumptions.capex_pct)
            * rent_annual;
    let operating_expenses = property_tax + insurance + rent_based_opex;

    let noi = egi - operating_expenses;
    let cap_rate = noi / record.price;

    let loan_amount = record.price * (1.0 - loan.down_payment_pct);
    let annual_debt_service = monthly_payment(loan_amount, loan.rate, loan.term_years) * 12.0;

    // Unfinanced deals have unbounded coverage, not a division fault
    let dscr = if annual_debt_service > 0.0 {
        Some(noi / annual_debt_service)
    } else {
        None
    };

    let cash_needed = record.price * (loan.down_payment_pct + cash_costs.closing_costs_pct)
        + cash_costs.rehab;
    let annual_cash_flow = noi - annual_debt_service;
    let cash_on_cash = if cash_needed > 0.0 {
        Some(annual_cash_flow / cash_needed)
    } else {
        None
    };

    ScoredZipRecord {
        zip: record.zip.clone(),
        city: record.city.clone(),
        state: record.state.clone(),
        price: record.price,
        rent: record.rent,
        eff_tax_rate: record.eff_tax_rate,
        crime_index: record.crime_index,
        inventory_hits: record.inventory_hits,
        noi,
        cap_rate,
        cash_on_cash,
        dscr,
        cash_needed,
        score: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const EPS: f64 = 1e-9;

    fn zip_record(price: f64, rent: f64, eff_tax_rate: f64) -> ZipRecord {
        ZipRecord {
            zip: "35004".to_string(),
            city: "Moody".to_string(),
            state: "AL".to_string(),
            price,
            rent,
            eff_tax_rate,
            crime_index: 1.0,
            inventory_hits: 0,
        }
    }

    #[test]
    fn amortized_payment_matches_reference_value() {
        // 100k principal at 6.5% over 30 years
        let payment = monthly_payment(100_000.0, 0.065, 30);
        assert!((payment - 632.068).abs() < 1e-3);
    }

    #[test]
    fn zero_rate_loan_pays_principal_linearly() {
        let payment = monthly_payment(120_000.0, 0.0, 10);
        assert!((payment - 1_000.0).abs() < EPS);
    }

    #[test]
    fn zero_principal_costs_nothing() {
        assert_eq!(monthly_payment(0.0, 0.065, 30), 0.0);
    }

    #[test]
    fn noi_and_cap_rate_follow_documented_formula() {
        let config = Config::sample();
        let record = zip_record(100_000.0, 1_200.0, 0.00339);
        let scored = compute_metrics(
            &record,
            &config.loan,
            &config.cash_costs,
            &config.assumptions,
        );

        let rent_annual = 1_200.0 * 12.0;
        let egi = rent_annual * (1.0 - config.assumptions.vacancy_pct);
        // price $100,000 at 0.00339 -> $339/yr property tax
        let property_tax = 339.0;
        let insurance = config.assumptions.insurance_pct * 100_000.0;
        let rent_opex = (config.assumptions.repairs_pct
            + config.assumptions.management_pct
            + config.assumptions.capex_pct)
            * rent_annual;
        let expected_noi = egi - (property_tax + insurance + rent_opex);

        assert!((scored.noi - expected_noi).abs() < 1e-6);
        assert!((scored.cap_rate - expected_noi / 100_000.0).abs() < EPS);
        assert!(scored.cap_rate.is_finite());
    }

    #[test]
    fn cash_needed_is_down_payment_plus_closing_plus_rehab() {
        let mut config = Config::sample();
        config.cash_costs.rehab = 5_000.0;
        let record = zip_record(100_000.0, 1_200.0, 0.00339);
        let scored = compute_metrics(
            &record,
            &config.loan,
            &config.cash_costs,
            &config.assumptions,
        );
        // 20% down + 3% closing + rehab
        assert!((scored.cash_needed - 28_000.0).abs() < EPS);
    }

    #[test]
    fn dscr_is_none_for_all_cash_purchases() {
        let mut config = Config::sample();
        config.loan.down_payment_pct = 1.0;
        let record = zip_record(100_000.0, 1_200.0, 0.00339);
        let scored = compute_metrics(
            &record,
            &config.loan,
            &config.cash_costs,
            &config.assumptions,
        );
        assert!(scored.dscr.is_none());
        // Cash flow equals NOI with no debt service
        let coc = scored.cash_on_cash.expect("cash needed is positive");
        assert!((coc - scored.noi / scored.cash_needed).abs() < EPS);
    }

    #[test]
    fn dscr_and_cash_on_cash_are_consistent_when_financed() {
        let config = Config::sample();
        let record = zip_record(100_000.0, 1_200.0, 0.00339);
        let scored = compute_metrics(
            &record,
            &config.loan,
            &config.cash_costs,
            &config.assumptions,
        );

        let annual_debt_service = monthly_payment(80_000.0, 0.065, 30) * 12.0;
        let dscr = scored.dscr.expect("financed deal has debt service");
        assert!((dscr - scored.noi / annual_debt_service).abs() < EPS);

        let coc = scored.cash_on_cash.expect("cash needed is positive");
        assert!((coc - (scored.noi - annual_debt_service) / 23_000.0).abs() < EPS);
    }

    #[test]
    fn undefined_cash_on_cash_is_none_not_nan() {
        // A zero-cash deal (no down payment, no closing costs) makes the
        // return undefined; validation rejects this config, but the engine
        // must still emit None rather than NaN if handed one
        let config = Config::sample();
        let no_money_down = LoanConfig {
            rate: 0.065,
            term_years: 30,
            down_payment_pct: 0.0,
        };
        let no_costs = CashCostsConfig {
            closing_costs_pct: 0.0,
            rehab: 0.0,
        };
        let record = zip_record(100_000.0, 1_200.0, 0.00339);
        let scored = compute_metrics(&record, &no_money_down, &no_costs, &config.assumptions);

        assert_eq!(scored.cash_needed, 0.0);
        assert!(scored.cash_on_cash.is_none());
        // Fully financed: DSCR is still well defined
        assert!(scored.dscr.expect("debt service present").is_finite());
    }
}
