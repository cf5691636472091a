//! Return forms built from an aggregation: Dutch VAT return, OSS return,
//! duty return claim, VAT difference table and revenue summary

use super::aggregate::{Aggregation, Totals};
use super::classify::Category;
use super::country::Country;
use super::error::RateError;
use super::rates::RateTable;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VatPosition {
    RefundDue,
    PaymentDue,
}

impl VatPosition {
    pub fn label(&self) -> &'static str {
        match self {
            VatPosition::RefundDue => "REFUND DUE",
            VatPosition::PaymentDue => "PAYMENT DUE",
        }
    }
}

/// Dutch VAT return: IOSS and domestic NL output VAT against import VAT reclaimed
/// for cross-border sales
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DutchVatReturn {
    pub period: String,
    /// 1a: IOSS sales VAT, all destinations
    pub ioss_sales: Decimal,
    /// 1a credit: IOSS returns
    pub ioss_returns: Decimal,
    pub ioss_net: Decimal,
    /// 1a: sale VAT on high-value NL imports that stayed in NL. Import VAT already
    /// covers these, so this is zero unless sale VAT is recorded.
    pub nl_high_value_sales: Decimal,
    /// 1a credit: import VAT refunded on high-value NL imports returned from NL
    pub nl_high_value_returns: Decimal,
    pub nl_high_value_net: Decimal,
    pub box_1_total: Decimal,
    /// 5b: import VAT paid in NL on goods sold to other member states
    pub import_vat_reclaim: Decimal,
    pub box_5_total: Decimal,
    /// Box 1 − Box 5; negative is a refund
    pub net: Decimal,
    pub position: VatPosition,
}

impl DutchVatReturn {
    pub fn from_aggregation(agg: &Aggregation) -> Self {
        let ioss = agg.category_total(Category::Ioss);
        let cross_border = agg.category_total(Category::ANl);
        let nl_sales = agg.category_total(Category::BNl);
        let nl_returns = agg.category_total(Category::CNlD);

        let ioss_net = ioss.sale_vat - ioss.return_credit;
        let nl_high_value_net = nl_sales.sale_vat - nl_returns.vat_reclaimed;
        let box_1_total = ioss_net + nl_high_value_net;
        let box_5_total = cross_border.vat;
        let net = box_1_total - box_5_total;
        DutchVatReturn {
            period: agg.period.display(),
            ioss_sales: ioss.sale_vat,
            ioss_returns: ioss.return_credit,
            ioss_net,
            nl_high_value_sales: nl_sales.sale_vat,
            nl_high_value_returns: nl_returns.vat_reclaimed,
            nl_high_value_net,
            box_1_total,
            import_vat_reclaim: cross_border.vat,
            box_5_total,
            net,
            position: if net < Decimal::ZERO {
                VatPosition::RefundDue
            } else {
                VatPosition::PaymentDue
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OssLine {
    pub country: Country,
    pub vat_rate: Decimal,
    /// Value of goods sent to the country, returned goods included
    pub taxable_amount: Decimal,
    /// Destination VAT on every sale, returned goods included
    pub sales_vat: Decimal,
    /// Destination VAT on returned goods
    pub returns_credit: Decimal,
    pub net_vat_due: Decimal,
}

/// OSS return: destination VAT on cross-border sales, NL excluded. Returned
/// cross-border sales are declared and credited back, as IOSS returns are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OssReturn {
    pub period: String,
    pub lines: Vec<OssLine>,
    pub total_sales_vat: Decimal,
    pub total_returns_credit: Decimal,
    pub total_net_vat_due: Decimal,
}

impl OssReturn {
    pub fn from_aggregation(agg: &Aggregation, rates: &RateTable) -> Result<Self, RateError> {
        let mut sales: BTreeMap<Country, (Decimal, Decimal)> = BTreeMap::new();
        let mut returns: BTreeMap<Country, Decimal> = BTreeMap::new();
        for (&(category, country), t) in &agg.totals {
            if country == Country::NL {
                continue;
            }
            match category {
                Category::ANl => {
                    let entry = sales.entry(country).or_default();
                    entry.0 += t.taxable_amount;
                    entry.1 += t.sale_vat;
                }
                Category::CNlX => *returns.entry(country).or_default() += t.taxable_amount,
                _ => {}
            }
        }

        let countries: BTreeSet<Country> = sales.keys().chain(returns.keys()).copied().collect();
        let mut lines = Vec::with_capacity(countries.len());
        for country in countries {
            let vat_rate = rates.rates(country)?.vat_rate;
            let (sold, sold_vat) = sales.get(&country).copied().unwrap_or_default();
            let returned = returns.get(&country).copied().unwrap_or_default();
            let returns_credit = returned * vat_rate;
            let sales_vat = sold_vat + returns_credit;
            lines.push(OssLine {
                country,
                vat_rate,
                taxable_amount: sold + returned,
                sales_vat,
                returns_credit,
                net_vat_due: sales_vat - returns_credit,
            });
        }
        Ok(OssReturn {
            period: agg.period.display(),
            total_sales_vat: lines.iter().map(|l| l.sales_vat).sum(),
            total_returns_credit: lines.iter().map(|l| l.returns_credit).sum(),
            total_net_vat_due: lines.iter().map(|l| l.net_vat_due).sum(),
            lines,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DutyClaimLine {
    pub country: Country,
    pub returned_value: Decimal,
    pub duty: Decimal,
}

/// Duty return claim for returned goods. Duty from countries where it cannot
/// be reclaimed is listed separately as a loss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DutyReturnClaim {
    pub period: String,
    pub claims: Vec<DutyClaimLine>,
    pub total_claim: Decimal,
    pub excluded: Vec<DutyClaimLine>,
    pub total_loss: Decimal,
}

impl DutyReturnClaim {
    pub fn from_aggregation(agg: &Aggregation) -> Self {
        let mut claims: BTreeMap<Country, DutyClaimLine> = BTreeMap::new();
        let mut excluded: BTreeMap<Country, DutyClaimLine> = BTreeMap::new();
        for (&(category, country), t) in &agg.totals {
            if !category.is_rgr_return() {
                continue;
            }
            if !t.duty_reclaimed.is_zero() {
                accumulate(&mut claims, country, t.taxable_amount, t.duty_reclaimed);
            }
            if !t.duty_loss.is_zero() {
                accumulate(&mut excluded, country, t.taxable_amount, t.duty_loss);
            }
        }
        let claims: Vec<DutyClaimLine> = claims.into_values().collect();
        let excluded: Vec<DutyClaimLine> = excluded.into_values().collect();
        DutyReturnClaim {
            period: agg.period.display(),
            total_claim: claims.iter().map(|l| l.duty).sum(),
            total_loss: excluded.iter().map(|l| l.duty).sum(),
            claims,
            excluded,
        }
    }
}

fn accumulate(
    lines: &mut BTreeMap<Country, DutyClaimLine>,
    country: Country,
    value: Decimal,
    duty: Decimal,
) {
    let line = lines.entry(country).or_insert(DutyClaimLine {
        country,
        returned_value: Decimal::ZERO,
        duty: Decimal::ZERO,
    });
    line.returned_value += value;
    line.duty += duty;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VatDifferenceLine {
    pub country: Country,
    pub taxable_amount: Decimal,
    pub nl_import_vat: Decimal,
    pub destination_vat: Decimal,
    pub difference: Decimal,
}

/// NL import VAT against destination VAT on cross-border sales
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VatDifference {
    pub period: String,
    pub lines: Vec<VatDifferenceLine>,
    pub total_difference: Decimal,
}

impl VatDifference {
    pub fn from_aggregation(agg: &Aggregation) -> Self {
        let lines: Vec<VatDifferenceLine> = agg
            .totals
            .iter()
            .filter(|((category, _), _)| *category == Category::ANl)
            .map(|(&(_, country), t)| VatDifferenceLine {
                country,
                taxable_amount: t.taxable_amount,
                nl_import_vat: t.vat,
                destination_vat: t.sale_vat,
                difference: t.spread,
            })
            .collect();
        VatDifference {
            period: agg.period.display(),
            total_difference: lines.iter().map(|l| l.difference).sum(),
            lines,
        }
    }

    /// Who settles the difference with whom
    pub fn settlement(&self) -> String {
        let amount = self.total_difference.abs().round_dp(4).normalize();
        if self.total_difference > Decimal::ZERO {
            format!("Company returns €{amount} to the carrier for VAT differences")
        } else {
            format!("Carrier pays the company €{amount} extra for VAT differences")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenueLine {
    pub category: Category,
    pub lines: usize,
    pub commission: Decimal,
    pub counterparty: Decimal,
    pub company_duty: Decimal,
    pub spread: Decimal,
    pub duty_loss: Decimal,
}

impl RevenueLine {
    fn new(category: Category, t: &Totals) -> Self {
        RevenueLine {
            category,
            lines: t.lines,
            commission: t.commission,
            counterparty: t.counterparty,
            company_duty: t.company_duty,
            spread: t.spread,
            duty_loss: t.duty_loss,
        }
    }

    /// Commission plus company duty share
    pub fn company_revenue(&self) -> Decimal {
        self.commission + self.company_duty
    }
}

/// Company revenue by category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenueSummary {
    pub period: String,
    pub lines: Vec<RevenueLine>,
    pub total_commission: Decimal,
    pub total_company_duty: Decimal,
    pub total_counterparty: Decimal,
    pub total_duty_loss: Decimal,
}

impl RevenueSummary {
    pub fn from_aggregation(agg: &Aggregation) -> Self {
        let lines: Vec<RevenueLine> = Category::ALL
            .iter()
            .map(|c| (c, agg.category_total(*c)))
            .filter(|(_, t)| t.lines > 0)
            .map(|(c, t)| RevenueLine::new(*c, &t))
            .collect();
        let total = agg.total();
        RevenueSummary {
            period: agg.period.display(),
            lines,
            total_commission: total.commission,
            total_company_duty: total.company_duty,
            total_counterparty: total.counterparty,
            total_duty_loss: total.duty_loss,
        }
    }

    pub fn total_revenue(&self) -> Decimal {
        self.total_commission + self.total_company_duty
    }
}

/// Headline amounts across the forms
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinancialSummary {
    pub period: String,
    /// Payable on the OSS return
    pub oss_vat_due: Decimal,
    /// Dutch return net; negative is a refund
    pub dutch_net_vat: Decimal,
    /// Duty claimed back from customs
    pub duty_reclaimed: Decimal,
    /// Duty that cannot be claimed back
    pub duty_loss: Decimal,
    pub company_revenue: Decimal,
    pub carrier_amount: Decimal,
}

impl FinancialSummary {
    pub fn from_forms(
        dutch: &DutchVatReturn,
        oss: &OssReturn,
        duty: &DutyReturnClaim,
        revenue: &RevenueSummary,
    ) -> Self {
        FinancialSummary {
            period: dutch.period.clone(),
            oss_vat_due: oss.total_net_vat_due,
            dutch_net_vat: dutch.net,
            duty_reclaimed: duty.total_claim,
            duty_loss: duty.total_loss,
            company_revenue: revenue.total_revenue(),
            carrier_amount: revenue.total_counterparty,
        }
    }
}
