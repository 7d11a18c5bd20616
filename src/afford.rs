//! Take-home-pay affordability check for a monthly rent.
//!
//! Tax is a rough single-filer estimate: standard deduction, one blended
//! federal rate picked by bracket, and flat FICA.

use serde::Serialize;

pub const STANDARD_DEDUCTION: f64 = 14_600.0;
pub const FICA_RATE: f64 = 0.0765;
/// Rent above this share of monthly take-home pay is not affordable.
pub const MAX_RENT_PERCENT: f64 = 45.0;

/// (taxable income lower bound, exclusive; blended rate), highest first.
static FEDERAL_BRACKETS: &[(f64, f64)] = &[(100_525.0, 0.22), (47_150.0, 0.18)];
const BASE_FEDERAL_RATE: f64 = 0.11;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Affordability {
    pub is_affordable: bool,
    pub percent_of_income: f64,
    pub monthly_net: f64,
}

/// Parses a salary such as `"85,000"` or `"85000.50"`.
pub fn parse_salary(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite())
}

/// Estimated annual federal income tax on `salary`.
pub fn federal_tax(salary: f64) -> f64 {
    let taxable = (salary - STANDARD_DEDUCTION).max(0.0);
    let rate = FEDERAL_BRACKETS
        .iter()
        .find(|(floor, _)| taxable > *floor)
        .map(|(_, rate)| *rate)
        .unwrap_or(BASE_FEDERAL_RATE);

    taxable * rate
}

/// Monthly pay after federal tax and FICA.
pub fn monthly_net(salary: f64) -> f64 {
    (salary - federal_tax(salary) - salary * FICA_RATE) / 12.0
}

/// `None` when either the salary or the rent is zero.
pub fn affordability(salary: f64, rent: i64) -> Option<Affordability> {
    if salary == 0.0 || rent == 0 {
        return None;
    }

    let monthly_net = monthly_net(salary);
    let percent_of_income = rent as f64 / monthly_net * 100.0;

    Some(Affordability {
        is_affordable: percent_of_income <= MAX_RENT_PERCENT,
        percent_of_income,
        monthly_net,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_parse_salary() {
        assert_eq!(parse_salary("85,000"), Some(85_000.0));
        assert_eq!(parse_salary(" 1,250,000.5 "), Some(1_250_000.5));
        assert_eq!(parse_salary("85000"), Some(85_000.0));
        assert_eq!(parse_salary("lots"), None);
        assert_eq!(parse_salary(""), None);
    }

    #[test]
    fn test_no_tax_below_standard_deduction() {
        assert_close(federal_tax(14_600.0), 0.0);
        assert_close(federal_tax(10_000.0), 0.0);
    }

    #[test]
    fn test_base_bracket_up_to_boundary() {
        // taxable 47_150 stays in the base bracket
        assert_close(federal_tax(61_750.0), 47_150.0 * 0.11);
    }

    #[test]
    fn test_middle_bracket_boundaries() {
        assert_close(federal_tax(61_751.0), 47_151.0 * 0.18);
        // taxable 100_525 is still the middle bracket
        assert_close(federal_tax(115_125.0), 100_525.0 * 0.18);
    }

    #[test]
    fn test_top_bracket() {
        assert_close(federal_tax(115_126.0), 100_526.0 * 0.22);
    }

    #[test]
    fn test_monthly_net() {
        // 61_750 - 5_186.5 federal - 4_723.875 FICA
        assert_close(monthly_net(61_750.0), 51_839.625 / 12.0);
    }

    #[test]
    fn test_affordability_threshold() {
        // 45% of 4_319.96875 is 1_943.99
        let under = affordability(61_750.0, 1_943).unwrap();
        assert!(under.is_affordable);
        assert!(under.percent_of_income < MAX_RENT_PERCENT);

        let over = affordability(61_750.0, 1_944).unwrap();
        assert!(!over.is_affordable);
        assert!(over.percent_of_income > MAX_RENT_PERCENT);
    }

    #[test]
    fn test_affordability_percent() {
        let result = affordability(61_750.0, 1_000).unwrap();
        assert_close(result.monthly_net, 4_319.968_75);
        assert_close(result.percent_of_income, 1_000.0 / 4_319.968_75 * 100.0);
    }

    #[test]
    fn test_affordability_needs_salary_and_rent() {
        assert_eq!(affordability(0.0, 1_500), None);
        assert_eq!(affordability(85_000.0, 0), None);
    }
}
