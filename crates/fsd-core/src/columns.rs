//! Canonical output columns.
//!
//! [`Canonical`] is the closed set of line items the standardizers guarantee
//! to populate when derivable. Each rulebook declares which of them it
//! produces and in which order they are resolved.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FsdError;

macro_rules! canonical_columns {
    ($( $(#[$doc:meta])* $variant:ident ),+ $(,)?) => {
        /// A canonical financial statement line item.
        ///
        /// The variant name is also the column name in standardized tables.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum Canonical {
            $( $(#[$doc])* $variant, )+
        }

        impl Canonical {
            /// Every canonical column, in declaration order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )+ ];

            /// Column name of this line item.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant), )+
                }
            }
        }
    };
}

canonical_columns! {
    // Balance sheet
    /// Total current assets.
    AssetsCurrent,
    /// Cash and cash equivalents.
    Cash,
    /// Total noncurrent assets.
    AssetsNoncurrent,
    /// Total assets.
    Assets,
    /// Total current liabilities.
    LiabilitiesCurrent,
    /// Total noncurrent liabilities.
    LiabilitiesNoncurrent,
    /// Total liabilities.
    Liabilities,
    /// Temporary (mezzanine) equity.
    TemporaryEquity,
    /// Redeemable equity not included in temporary equity.
    RedeemableEquity,
    /// Additional paid in capital.
    AdditionalPaidInCapital,
    /// Treasury stock value.
    TreasuryStockValue,
    /// Retained earnings or accumulated deficit.
    RetainedEarnings,
    /// Equity attributable to the parent.
    HolderEquity,
    /// Noncontrolling (minority) interest.
    MinorityInterest,
    /// Total equity including noncontrolling interest.
    Equity,
    /// Total liabilities and equity.
    LiabilitiesAndEquity,

    // Income statement
    /// Total revenues.
    Revenues,
    /// Cost of revenue.
    CostOfRevenue,
    /// Gross profit.
    GrossProfit,
    /// Total operating expenses.
    OperatingExpenses,
    /// Operating income or loss.
    OperatingIncomeLoss,
    /// Income from continuing operations before income taxes.
    IncomeLossFromContinuingOperationsBeforeTax,
    /// Income tax expense or benefit.
    IncomeTaxExpenseBenefit,
    /// Income from continuing operations after taxes.
    IncomeLossFromContinuingOperations,
    /// Income from discontinued operations, net of tax.
    IncomeLossFromDiscontinuedOperations,
    /// Profit or loss including noncontrolling interest.
    ProfitLoss,
    /// Net income attributable to noncontrolling interest.
    NetIncomeLossAttributableToNoncontrollingInterest,
    /// Net income attributable to the parent.
    NetIncomeLoss,
    /// Basic earnings per share.
    EarningsPerShareBasic,
    /// Diluted earnings per share.
    EarningsPerShareDiluted,

    // Cash flow
    /// Net cash from operating activities.
    NetCashProvidedByUsedInOperatingActivities,
    /// Net cash from operating activities of continuing operations.
    NetCashProvidedByUsedInOperatingActivitiesContinuingOperations,
    /// Net cash from operating activities of discontinued operations.
    CashProvidedByUsedInOperatingActivitiesDiscontinuedOperations,
    /// Net cash from investing activities.
    NetCashProvidedByUsedInInvestingActivities,
    /// Net cash from investing activities of continuing operations.
    NetCashProvidedByUsedInInvestingActivitiesContinuingOperations,
    /// Net cash from investing activities of discontinued operations.
    CashProvidedByUsedInInvestingActivitiesDiscontinuedOperations,
    /// Net cash from financing activities.
    NetCashProvidedByUsedInFinancingActivities,
    /// Net cash from financing activities of continuing operations.
    NetCashProvidedByUsedInFinancingActivitiesContinuingOperations,
    /// Net cash from financing activities of discontinued operations.
    CashProvidedByUsedInFinancingActivitiesDiscontinuedOperations,
    /// Effect of exchange rate changes on cash.
    EffectOfExchangeRateChanges,
    /// Net change in cash including exchange rate effects.
    NetChangeInCash,
    /// Depreciation, depletion and amortization.
    DepreciationDepletionAndAmortization,
    /// Deferred income tax expense or benefit.
    DeferredIncomeTaxExpenseBenefit,
    /// Share based compensation.
    ShareBasedCompensation,
    /// Capital expenditures.
    PaymentsToAcquirePropertyPlantAndEquipment,
    /// Proceeds from sale of property, plant and equipment.
    ProceedsFromSaleOfPropertyPlantAndEquipment,
    /// Acquisitions net of cash acquired.
    PaymentsToAcquireBusinessesNetOfCashAcquired,
    /// Dividends paid.
    PaymentsOfDividends,
    /// Share repurchases.
    PaymentsForRepurchaseOfEquity,
    /// Proceeds from issuance of long term debt.
    ProceedsFromIssuanceOfLongTermDebt,
    /// Repayments of long term debt.
    RepaymentsOfLongTermDebt,
}

impl FromStr for Canonical {
    type Err = FsdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| FsdError::InvalidParameter(format!("Unknown canonical column: {s}")))
    }
}

impl fmt::Display for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<&str> = Canonical::ALL.iter().map(Canonical::as_str).collect();
        assert_eq!(names.len(), Canonical::ALL.len());
    }

    #[test]
    fn test_parse_roundtrip() {
        for column in Canonical::ALL {
            assert_eq!(column.as_str().parse::<Canonical>().unwrap(), *column);
        }
        assert!("NotAColumn".parse::<Canonical>().is_err());
    }

    #[test]
    fn test_serde_uses_variant_name() {
        let json = serde_json::to_string(&Canonical::AssetsCurrent).unwrap();
        assert_eq!(json, "\"AssetsCurrent\"");
    }
}
