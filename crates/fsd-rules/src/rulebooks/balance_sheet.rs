use fsd_core::{Canonical as C, StatementType};

use super::{alias, column, plus, positive, tag, triangle, zero_if_all, zero_if_equal};
use crate::rulebook::{Rulebook, SignCorrection};
use crate::validation::Identity;

/// Balance sheet rulebook.
///
/// Noncurrent totals are declared before their grand totals so a report
/// with only current and noncurrent subtotals resolves the grand total in
/// the first pass.
#[must_use]
pub fn balance_sheet() -> Rulebook {
    Rulebook::new(StatementType::BS, "BS")
        .with_column(C::AssetsCurrent, vec![tag("AssetsCurrent")])
        .with_column(
            C::Cash,
            vec![alias(&[
                "CashAndCashEquivalentsAtCarryingValue",
                "CashCashEquivalentsRestrictedCashAndRestrictedCashEquivalents",
                "Cash",
                "CashAndDueFromBanks",
            ])],
        )
        .with_column(C::LiabilitiesCurrent, vec![tag("LiabilitiesCurrent")])
        .with_column(
            C::TemporaryEquity,
            vec![alias(&[
                "TemporaryEquityCarryingAmountIncludingPortionAttributableToNoncontrollingInterests",
                "TemporaryEquityCarryingAmountAttributableToParent",
            ])],
        )
        .with_column(
            C::RedeemableEquity,
            vec![alias(&[
                "RedeemableNoncontrollingInterestEquityCarryingAmount",
                "RedeemableNoncontrollingInterestEquityCommonCarryingAmount",
            ])],
        )
        .with_column(
            C::AdditionalPaidInCapital,
            vec![alias(&[
                "AdditionalPaidInCapitalCommonStock",
                "AdditionalPaidInCapital",
            ])],
        )
        .with_column(
            C::TreasuryStockValue,
            vec![
                positive("TreasuryStockValue"),
                positive("TreasuryStockCommonValue"),
            ],
        )
        .with_column(
            C::RetainedEarnings,
            vec![tag("RetainedEarningsAccumulatedDeficit")],
        )
        .with_column(
            C::HolderEquity,
            vec![
                tag("StockholdersEquity"),
                triangle(C::Equity, C::HolderEquity, C::MinorityInterest),
            ],
        )
        .with_column(
            C::MinorityInterest,
            vec![
                tag("MinorityInterest"),
                triangle(C::Equity, C::HolderEquity, C::MinorityInterest),
            ],
        )
        .with_column(
            C::Equity,
            vec![
                tag("StockholdersEquityIncludingPortionAttributableToNoncontrollingInterest"),
                triangle(C::Equity, C::HolderEquity, C::MinorityInterest),
                column(C::HolderEquity),
            ],
        )
        .with_column(
            C::LiabilitiesAndEquity,
            vec![tag("LiabilitiesAndStockholdersEquity"), column(C::Assets)],
        )
        .with_column(
            C::LiabilitiesNoncurrent,
            vec![
                tag("LiabilitiesNoncurrent"),
                triangle(C::Liabilities, C::LiabilitiesCurrent, C::LiabilitiesNoncurrent),
            ],
        )
        .with_column(
            C::Liabilities,
            vec![
                tag("Liabilities"),
                triangle(C::Liabilities, C::LiabilitiesCurrent, C::LiabilitiesNoncurrent),
            ],
        )
        .with_column(
            C::AssetsNoncurrent,
            vec![
                alias(&["AssetsNoncurrent", "NoncurrentAssets"]),
                triangle(C::Assets, C::AssetsCurrent, C::AssetsNoncurrent),
            ],
        )
        .with_column(
            C::Assets,
            vec![
                tag("Assets"),
                triangle(C::Assets, C::AssetsCurrent, C::AssetsNoncurrent),
                column(C::LiabilitiesAndEquity),
            ],
        )
        .with_post_rules(
            C::MinorityInterest,
            vec![zero_if_equal(C::Equity, C::HolderEquity)],
        )
        .with_post_rules(
            C::TemporaryEquity,
            vec![zero_if_all(&[C::Liabilities, C::Equity, C::LiabilitiesAndEquity])],
        )
        .with_identity(Identity::new(
            "AssetsCheck",
            C::Assets,
            plus(&[C::AssetsCurrent, C::AssetsNoncurrent]),
        ))
        .with_identity(Identity::new(
            "LiabilitiesCheck",
            C::Liabilities,
            plus(&[C::LiabilitiesCurrent, C::LiabilitiesNoncurrent]),
        ))
        .with_identity(Identity::new(
            "EquityCheck",
            C::Equity,
            plus(&[C::HolderEquity, C::MinorityInterest]),
        ))
        .with_identity(Identity::new(
            "AssetsLiaEquCheck",
            C::Assets,
            plus(&[C::Liabilities, C::Equity]),
        ))
        .with_identity(Identity::new(
            "LiaEquTotalCheck",
            C::LiabilitiesAndEquity,
            plus(&[C::Liabilities, C::TemporaryEquity, C::Equity]),
        ))
        .with_dedup_family(&[
            "CashAndCashEquivalentsAtCarryingValue",
            "Cash",
            "CashAndDueFromBanks",
        ])
        .with_dedup_family(&[
            "AdditionalPaidInCapitalCommonStock",
            "AdditionalPaidInCapital",
        ])
        .with_dedup_family(&["TreasuryStockValue", "TreasuryStockCommonValue"])
        .with_dedup_family(&[
            "TemporaryEquityCarryingAmountIncludingPortionAttributableToNoncontrollingInterests",
            "TemporaryEquityCarryingAmountAttributableToParent",
        ])
        .with_dedup_family(&["AssetsNoncurrent", "NoncurrentAssets"])
        .with_sign_correction(SignCorrection::positive("TreasuryStockValue"))
        .with_sign_correction(SignCorrection::positive("TreasuryStockCommonValue"))
}
