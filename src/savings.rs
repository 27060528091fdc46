//! Savings estimate for a monthly electricity bill.
//!
//! Pure arithmetic, no validation: callers make sure `monthly_bill > 0` and
//! `discount_rate` lies in (0, 100].

use std::str::FromStr;

use crate::types::{MonthlySavings, Provider, SavingsCalculation};

/// Which figure the twelve monthly shares are taken from.
///
/// `BeforeFees` splits the discount before any subscription fee, so with a fee
/// the breakdown sums to more than `estimated_savings`. It is the default
/// because the published calculator has always shown that breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BreakdownBasis {
    #[default]
    BeforeFees,
    AfterFees,
}

impl FromStr for BreakdownBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before-fees" | "before_fees" => Ok(Self::BeforeFees),
            "after-fees" | "after_fees" => Ok(Self::AfterFees),
            other => Err(format!("unknown breakdown basis: {other}")),
        }
    }
}

/// Estimate annual savings using the default breakdown basis
pub fn calculate_savings(
    monthly_bill: f64,
    discount_rate: f64,
    provider: Option<&Provider>,
) -> SavingsCalculation {
    calculate_savings_with(monthly_bill, discount_rate, provider, BreakdownBasis::default())
}

/// Estimate annual savings.
///
/// A provider subscription fee is netted against the discount and may push
/// `estimated_savings` below zero.
pub fn calculate_savings_with(
    monthly_bill: f64,
    discount_rate: f64,
    provider: Option<&Provider>,
    basis: BreakdownBasis,
) -> SavingsCalculation {
    let current_annual_cost = monthly_bill * 12.0;
    let before_fees = current_annual_cost * (discount_rate / 100.0);

    let annual_fees = provider
        .and_then(|p| p.pricing.subscription_fee)
        .map(|fee| fee * 12.0)
        .unwrap_or(0.0);
    let adjusted = before_fees - annual_fees;

    let share = match basis {
        BreakdownBasis::BeforeFees => before_fees / 12.0,
        BreakdownBasis::AfterFees => adjusted / 12.0,
    };
    let monthly_breakdown = (1..=12)
        .map(|month| MonthlySavings {
            month,
            savings: share,
        })
        .collect();

    SavingsCalculation {
        current_annual_cost,
        estimated_savings: adjusted,
        savings_percentage: discount_rate,
        new_annual_cost: current_annual_cost - adjusted,
        monthly_breakdown: Some(monthly_breakdown),
    }
}

/// Whole US dollars with thousands separators: `$1,800`, `-$120`
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}${grouped}")
}

/// One decimal place: `15.0%`
pub fn format_percentage(percentage: f64) -> String {
    format!("{:.1}%", percentage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactInfo, Features, Pricing};

    fn provider_with_fee(fee: Option<f64>) -> Provider {
        Provider {
            id: "nexamp-il".to_string(),
            name: "Nexamp".to_string(),
            logo: None,
            states: vec!["IL".to_string()],
            service_areas: Vec::new(),
            pricing: Pricing {
                discount_rate: 15.0,
                subscription_fee: fee,
                cancellation_fee: None,
                contract_length: Some(0),
            },
            features: Features {
                no_upfront_cost: true,
                cancellable_anytime: true,
                renewable_percentage: 100.0,
            },
            contact_info: ContactInfo {
                website: "https://www.nexamp.com".to_string(),
                phone: None,
                email: None,
            },
            referral_link: None,
            promotion: None,
            last_updated: String::new(),
        }
    }

    #[test]
    fn test_basic_example() {
        let calc = calculate_savings(150.0, 15.0, None);
        assert_eq!(calc.current_annual_cost, 1800.0);
        assert_eq!(calc.estimated_savings, 270.0);
        assert_eq!(calc.new_annual_cost, 1530.0);
        assert_eq!(calc.savings_percentage, 15.0);

        let breakdown = calc.monthly_breakdown.unwrap();
        assert_eq!(breakdown.len(), 12);
        assert_eq!(breakdown[0].month, 1);
        assert_eq!(breakdown[11].month, 12);
        assert!(breakdown.iter().all(|m| (m.savings - 22.5).abs() < 1e-9));
    }

    #[test]
    fn test_subscription_fee() {
        let provider = provider_with_fee(Some(10.0));
        let calc = calculate_savings(150.0, 15.0, Some(&provider));
        assert_eq!(calc.estimated_savings, 150.0);
        assert_eq!(calc.new_annual_cost, 1650.0);

        // default breakdown still splits the pre-fee figure
        let breakdown = calc.monthly_breakdown.unwrap();
        assert!((breakdown[0].savings - 22.5).abs() < 1e-9);
    }

    #[test]
    fn test_after_fees_breakdown() {
        let provider = provider_with_fee(Some(10.0));
        let calc = calculate_savings_with(150.0, 15.0, Some(&provider), BreakdownBasis::AfterFees);
        let total: f64 = calc.monthly_breakdown.unwrap().iter().map(|m| m.savings).sum();
        assert!((total - calc.estimated_savings).abs() < 1e-9);
    }

    #[test]
    fn test_fee_can_exceed_discount() {
        let provider = provider_with_fee(Some(30.0));
        let calc = calculate_savings(100.0, 10.0, Some(&provider));
        assert!((calc.estimated_savings - -240.0).abs() < 1e-9);
        assert!((calc.new_annual_cost - 1440.0).abs() < 1e-9);
    }

    #[test]
    fn test_provider_without_fee() {
        let provider = provider_with_fee(None);
        let calc = calculate_savings(150.0, 15.0, Some(&provider));
        assert_eq!(calc.estimated_savings, 270.0);
    }

    #[test]
    fn test_monotonic() {
        let mut last = f64::NEG_INFINITY;
        for bill in [1.0, 25.5, 80.0, 150.0, 420.0, 1000.0] {
            let savings = calculate_savings(bill, 12.0, None).estimated_savings;
            assert!(savings > last, "bill {bill}");
            last = savings;
        }

        let mut last = f64::NEG_INFINITY;
        for rate in [0.5, 5.0, 10.0, 15.0, 50.0, 100.0] {
            let savings = calculate_savings(150.0, rate, None).estimated_savings;
            assert!(savings > last, "rate {rate}");
            last = savings;
        }
    }

    #[test]
    fn test_breakdown_basis_parse() {
        assert_eq!("after-fees".parse::<BreakdownBasis>(), Ok(BreakdownBasis::AfterFees));
        assert_eq!(" BEFORE_FEES".parse::<BreakdownBasis>(), Ok(BreakdownBasis::BeforeFees));
        assert!("monthly".parse::<BreakdownBasis>().is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(format_currency(1800.0), "$1,800");
        assert_eq!(format_currency(270.4), "$270");
        assert_eq!(format_currency(-120.0), "-$120");
        assert_eq!(format_currency(1234567.0), "$1,234,567");
        assert_eq!(format_currency(0.2), "$0");
        assert_eq!(format_percentage(15.0), "15.0%");
        assert_eq!(format_percentage(7.26), "7.3%");
    }
}
