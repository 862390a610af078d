use fsd_core::{Canonical as C, StatementType};

use super::{alias, column, tag, triangle, zero_if_equal};
use crate::rulebook::Rulebook;
use crate::validation::{Identity, Term};

/// Income statement rulebook.
#[must_use]
pub fn income_statement() -> Rulebook {
    Rulebook::new(StatementType::IS, "IS")
        .with_column(
            C::Revenues,
            vec![
                alias(&[
                    "Revenues",
                    "RevenueFromContractWithCustomerExcludingAssessedTax",
                    "SalesRevenueNet",
                    "RevenueFromContractWithCustomerIncludingAssessedTax",
                    "RevenuesNetOfInterestExpense",
                ]),
                triangle(C::Revenues, C::CostOfRevenue, C::GrossProfit),
            ],
        )
        .with_column(
            C::CostOfRevenue,
            vec![
                alias(&[
                    "CostOfRevenue",
                    "CostOfGoodsAndServicesSold",
                    "CostOfGoodsSold",
                    "CostOfServices",
                ]),
                triangle(C::Revenues, C::CostOfRevenue, C::GrossProfit),
            ],
        )
        .with_column(
            C::GrossProfit,
            vec![
                tag("GrossProfit"),
                triangle(C::Revenues, C::CostOfRevenue, C::GrossProfit),
            ],
        )
        .with_column(
            C::OperatingExpenses,
            vec![
                tag("OperatingExpenses"),
                triangle(C::GrossProfit, C::OperatingExpenses, C::OperatingIncomeLoss),
            ],
        )
        .with_column(
            C::OperatingIncomeLoss,
            vec![
                tag("OperatingIncomeLoss"),
                triangle(C::GrossProfit, C::OperatingExpenses, C::OperatingIncomeLoss),
            ],
        )
        .with_column(
            C::IncomeLossFromContinuingOperationsBeforeTax,
            vec![
                alias(&[
                    "IncomeLossFromContinuingOperationsBeforeIncomeTaxesExtraordinaryItemsNoncontrollingInterest",
                    "IncomeLossFromContinuingOperationsBeforeIncomeTaxesMinorityInterestAndIncomeLossFromEquityMethodInvestments",
                ]),
                triangle(
                    C::IncomeLossFromContinuingOperationsBeforeTax,
                    C::IncomeTaxExpenseBenefit,
                    C::IncomeLossFromContinuingOperations,
                ),
            ],
        )
        .with_column(
            C::IncomeTaxExpenseBenefit,
            vec![
                tag("IncomeTaxExpenseBenefit"),
                triangle(
                    C::IncomeLossFromContinuingOperationsBeforeTax,
                    C::IncomeTaxExpenseBenefit,
                    C::IncomeLossFromContinuingOperations,
                ),
            ],
        )
        .with_column(
            C::IncomeLossFromContinuingOperations,
            vec![
                alias(&[
                    "IncomeLossFromContinuingOperations",
                    "IncomeLossFromContinuingOperationsIncludingPortionAttributableToNoncontrollingInterest",
                ]),
                triangle(
                    C::IncomeLossFromContinuingOperationsBeforeTax,
                    C::IncomeTaxExpenseBenefit,
                    C::IncomeLossFromContinuingOperations,
                ),
                triangle(
                    C::ProfitLoss,
                    C::IncomeLossFromContinuingOperations,
                    C::IncomeLossFromDiscontinuedOperations,
                ),
            ],
        )
        .with_column(
            C::IncomeLossFromDiscontinuedOperations,
            vec![
                alias(&[
                    "IncomeLossFromDiscontinuedOperationsNetOfTax",
                    "IncomeLossFromDiscontinuedOperationsNetOfTaxAttributableToReportingEntity",
                ]),
                triangle(
                    C::ProfitLoss,
                    C::IncomeLossFromContinuingOperations,
                    C::IncomeLossFromDiscontinuedOperations,
                ),
            ],
        )
        .with_column(
            C::ProfitLoss,
            vec![
                tag("ProfitLoss"),
                triangle(
                    C::ProfitLoss,
                    C::IncomeLossFromContinuingOperations,
                    C::IncomeLossFromDiscontinuedOperations,
                ),
                triangle(
                    C::ProfitLoss,
                    C::NetIncomeLoss,
                    C::NetIncomeLossAttributableToNoncontrollingInterest,
                ),
                column(C::NetIncomeLoss),
            ],
        )
        .with_column(
            C::NetIncomeLossAttributableToNoncontrollingInterest,
            vec![
                tag("NetIncomeLossAttributableToNoncontrollingInterest"),
                triangle(
                    C::ProfitLoss,
                    C::NetIncomeLoss,
                    C::NetIncomeLossAttributableToNoncontrollingInterest,
                ),
            ],
        )
        .with_column(
            C::NetIncomeLoss,
            vec![
                alias(&["NetIncomeLoss", "NetIncomeLossAvailableToCommonStockholdersBasic"]),
                triangle(
                    C::ProfitLoss,
                    C::NetIncomeLoss,
                    C::NetIncomeLossAttributableToNoncontrollingInterest,
                ),
            ],
        )
        .with_column(
            C::EarningsPerShareBasic,
            vec![alias(&["EarningsPerShareBasic", "EarningsPerShareBasicAndDiluted"])],
        )
        .with_column(
            C::EarningsPerShareDiluted,
            vec![alias(&["EarningsPerShareDiluted", "EarningsPerShareBasicAndDiluted"])],
        )
        .with_post_rules(
            C::NetIncomeLossAttributableToNoncontrollingInterest,
            vec![zero_if_equal(C::ProfitLoss, C::NetIncomeLoss)],
        )
        .with_post_rules(
            C::IncomeLossFromDiscontinuedOperations,
            vec![zero_if_equal(
                C::ProfitLoss,
                C::IncomeLossFromContinuingOperations,
            )],
        )
        .with_identity(Identity::new(
            "GrossProfitCheck",
            C::GrossProfit,
            vec![Term::plus(C::Revenues), Term::minus(C::CostOfRevenue)],
        ))
        .with_identity(Identity::new(
            "OperatingIncomeCheck",
            C::OperatingIncomeLoss,
            vec![Term::plus(C::GrossProfit), Term::minus(C::OperatingExpenses)],
        ))
        .with_identity(Identity::new(
            "ProfitLossCheck",
            C::ProfitLoss,
            vec![
                Term::plus(C::IncomeLossFromContinuingOperations),
                Term::plus(C::IncomeLossFromDiscontinuedOperations),
            ],
        ))
        .with_identity(Identity::new(
            "NetIncomeCheck",
            C::ProfitLoss,
            vec![
                Term::plus(C::NetIncomeLoss),
                Term::plus(C::NetIncomeLossAttributableToNoncontrollingInterest),
            ],
        ))
        .with_dedup_family(&[
            "Revenues",
            "RevenueFromContractWithCustomerExcludingAssessedTax",
            "SalesRevenueNet",
            "RevenueFromContractWithCustomerIncludingAssessedTax",
        ])
        .with_dedup_family(&[
            "CostOfRevenue",
            "CostOfGoodsAndServicesSold",
            "CostOfGoodsSold",
            "CostOfServices",
        ])
        .with_dedup_family(&[
            "IncomeLossFromContinuingOperationsBeforeIncomeTaxesExtraordinaryItemsNoncontrollingInterest",
            "IncomeLossFromContinuingOperationsBeforeIncomeTaxesMinorityInterestAndIncomeLossFromEquityMethodInvestments",
        ])
        .with_dedup_family(&["NetIncomeLoss", "NetIncomeLossAvailableToCommonStockholdersBasic"])
}
