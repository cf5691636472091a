use super::classify::Category;
use super::country::Country;
use super::error::RateError;
use super::rates::RateTable;
use super::tax::TaxFigures;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// How reclaimed duty is shared between the company and the carrier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum DutyRevenuePolicy {
    /// Commission is taken on reclaimed VAT plus reclaimed duty
    #[default]
    ReclaimCommission,
    /// Commission on VAT only; reclaimed duty goes to the carrier in full
    CarrierPassThrough,
    /// Commission on VAT only; the company keeps its duty revenue share of reclaimed duty
    CompanyShare,
}

impl DutyRevenuePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            DutyRevenuePolicy::ReclaimCommission => "reclaim-commission",
            DutyRevenuePolicy::CarrierPassThrough => "carrier-pass-through",
            DutyRevenuePolicy::CompanyShare => "company-share",
        }
    }
}

impl fmt::Display for DutyRevenuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DutyRevenuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reclaim-commission" => Ok(DutyRevenuePolicy::ReclaimCommission),
            "carrier-pass-through" => Ok(DutyRevenuePolicy::CarrierPassThrough),
            "company-share" => Ok(DutyRevenuePolicy::CompanyShare),
            other => Err(format!("unknown duty revenue policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum SplitOutcome {
    /// Reclaimed amounts are shared out
    ReturnRefund,
    /// Import VAT reclaimed against OSS VAT paid
    VatSpread,
    /// VAT owed on an IOSS sale, nothing to share
    SaleLiability,
    /// Settled at import
    #[default]
    NothingToDo,
}

/// Distribution of reclaimed amounts for one line item. Unrounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RevenueSplit {
    pub outcome: SplitOutcome,
    pub vat_reclaimed: Decimal,
    pub duty_reclaimed: Decimal,
    pub commission: Decimal,
    /// Passed on to the carrier or returning party
    pub counterparty_amount: Decimal,
    /// Company share of reclaimed duty (company-share policy only)
    pub company_duty_amount: Decimal,
    /// Duty computed but not recoverable
    pub duty_loss: Decimal,
    /// A-NL import VAT reclaimed minus OSS VAT paid
    pub spread: Decimal,
}

/// Split the reclaimable amounts of a line item.
///
/// `country` is the destination; its commission rate and duty revenue share apply.
/// Duty reclaimability follows the import country.
pub fn split_revenue(
    category: Category,
    country: Country,
    figures: &TaxFigures,
    rates: &RateTable,
    policy: DutyRevenuePolicy,
) -> Result<RevenueSplit, RateError> {
    let split = match category {
        Category::Ioss if figures.return_credit > Decimal::ZERO => {
            let rate = rates.rates(country)?.commission_rate;
            let commission = figures.return_credit * rate;
            RevenueSplit {
                outcome: SplitOutcome::ReturnRefund,
                vat_reclaimed: figures.return_credit,
                commission,
                counterparty_amount: figures.return_credit - commission,
                ..RevenueSplit::default()
            }
        }
        Category::Ioss => RevenueSplit {
            outcome: SplitOutcome::SaleLiability,
            ..RevenueSplit::default()
        },
        Category::ANl => RevenueSplit {
            outcome: SplitOutcome::VatSpread,
            vat_reclaimed: figures.vat_amount,
            spread: figures.vat_amount - figures.sale_vat,
            ..RevenueSplit::default()
        },
        Category::BNl | Category::BIe => RevenueSplit::default(),
        Category::CNlX | Category::CNlD | Category::CIeD => {
            // Category determines the import country
            let import = category
                .import_country()
                .map_or(Country::NL, |c| c.country());
            let reclaimable = rates.rates(import)?.duty_reclaimable;
            let dest = rates.rates(country)?;

            let vat = figures.vat_amount;
            let duty_reclaimed = if reclaimable {
                figures.duty_amount
            } else {
                Decimal::ZERO
            };
            let (commission, company_duty_amount) = match policy {
                DutyRevenuePolicy::ReclaimCommission => {
                    ((vat + duty_reclaimed) * dest.commission_rate, Decimal::ZERO)
                }
                DutyRevenuePolicy::CarrierPassThrough => {
                    (vat * dest.commission_rate, Decimal::ZERO)
                }
                DutyRevenuePolicy::CompanyShare => (
                    vat * dest.commission_rate,
                    duty_reclaimed * dest.duty_revenue_share,
                ),
            };

            RevenueSplit {
                outcome: SplitOutcome::ReturnRefund,
                vat_reclaimed: vat,
                duty_reclaimed,
                commission,
                counterparty_amount: vat + duty_reclaimed - commission - company_duty_amount,
                company_duty_amount,
                duty_loss: figures.duty_amount - duty_reclaimed,
                spread: Decimal::ZERO,
            }
        }
    };
    Ok(split)
}
