use fsd_core::{Canonical as C, StatementType};

use super::{alias, plus, sum, tag, triangle, zero_if_all, zero_if_any};
use crate::rulebook::{Rulebook, SignCorrection};
use crate::validation::Identity;

const PAYMENT_TAGS: [&str; 8] = [
    "PaymentsToAcquirePropertyPlantAndEquipment",
    "PaymentsToAcquireBusinessesNetOfCashAcquired",
    "PaymentsOfDividends",
    "PaymentsOfDividendsCommonStock",
    "PaymentsForRepurchaseOfCommonStock",
    "PaymentsForRepurchaseOfEquity",
    "RepaymentsOfLongTermDebt",
    "PaymentsToAcquireInvestments",
];

/// An activity total with its continuing and discontinued parts.
struct Activity {
    total: C,
    continuing: C,
    discontinued: C,
    total_tag: &'static str,
    continuing_tag: &'static str,
    discontinued_tag: &'static str,
    check: &'static str,
}

const ACTIVITIES: [Activity; 3] = [
    Activity {
        total: C::NetCashProvidedByUsedInOperatingActivities,
        continuing: C::NetCashProvidedByUsedInOperatingActivitiesContinuingOperations,
        discontinued: C::CashProvidedByUsedInOperatingActivitiesDiscontinuedOperations,
        total_tag: "NetCashProvidedByUsedInOperatingActivities",
        continuing_tag: "NetCashProvidedByUsedInOperatingActivitiesContinuingOperations",
        discontinued_tag: "CashProvidedByUsedInOperatingActivitiesDiscontinuedOperations",
        check: "OperatingCheck",
    },
    Activity {
        total: C::NetCashProvidedByUsedInInvestingActivities,
        continuing: C::NetCashProvidedByUsedInInvestingActivitiesContinuingOperations,
        discontinued: C::CashProvidedByUsedInInvestingActivitiesDiscontinuedOperations,
        total_tag: "NetCashProvidedByUsedInInvestingActivities",
        continuing_tag: "NetCashProvidedByUsedInInvestingActivitiesContinuingOperations",
        discontinued_tag: "CashProvidedByUsedInInvestingActivitiesDiscontinuedOperations",
        check: "InvestingCheck",
    },
    Activity {
        total: C::NetCashProvidedByUsedInFinancingActivities,
        continuing: C::NetCashProvidedByUsedInFinancingActivitiesContinuingOperations,
        discontinued: C::CashProvidedByUsedInFinancingActivitiesDiscontinuedOperations,
        total_tag: "NetCashProvidedByUsedInFinancingActivities",
        continuing_tag: "NetCashProvidedByUsedInFinancingActivitiesContinuingOperations",
        discontinued_tag: "CashProvidedByUsedInFinancingActivitiesDiscontinuedOperations",
        check: "FinancingCheck",
    },
];

const NET_CHANGE_ADDENDS: [C; 4] = [
    C::NetCashProvidedByUsedInOperatingActivities,
    C::NetCashProvidedByUsedInInvestingActivities,
    C::NetCashProvidedByUsedInFinancingActivities,
    C::EffectOfExchangeRateChanges,
];

/// Cash flow rulebook.
///
/// Payments are reported with inconsistent signs; they are normalized to
/// positive amounts before pivoting.
#[must_use]
pub fn cash_flow() -> Rulebook {
    let mut book = Rulebook::new(StatementType::CF, "CF");

    for activity in &ACTIVITIES {
        let split = triangle(activity.total, activity.continuing, activity.discontinued);
        book = book
            .with_column(
                activity.continuing,
                vec![tag(activity.continuing_tag), split.clone()],
            )
            .with_column(
                activity.discontinued,
                vec![tag(activity.discontinued_tag), split.clone()],
            )
            .with_column(activity.total, vec![tag(activity.total_tag), split]);
    }

    book = book
        .with_column(
            C::EffectOfExchangeRateChanges,
            vec![alias(&[
                "EffectOfExchangeRateOnCashCashEquivalentsRestrictedCashAndRestrictedCashEquivalents",
                "EffectOfExchangeRateOnCashAndCashEquivalents",
            ])],
        )
        .with_column(
            C::NetChangeInCash,
            vec![
                alias(&[
                    "CashCashEquivalentsRestrictedCashAndRestrictedCashEquivalentsPeriodIncreaseDecreaseIncludingExchangeRateEffect",
                    "CashAndCashEquivalentsPeriodIncreaseDecrease",
                    "CashPeriodIncreaseDecrease",
                ]),
                sum(&NET_CHANGE_ADDENDS),
            ],
        )
        .with_column(
            C::DepreciationDepletionAndAmortization,
            vec![alias(&[
                "DepreciationDepletionAndAmortization",
                "DepreciationAmortizationAndAccretionNet",
                "DepreciationAndAmortization",
            ])],
        )
        .with_column(
            C::DeferredIncomeTaxExpenseBenefit,
            vec![alias(&[
                "DeferredIncomeTaxExpenseBenefit",
                "DeferredIncomeTaxesAndTaxCredits",
            ])],
        )
        .with_column(
            C::ShareBasedCompensation,
            vec![alias(&[
                "ShareBasedCompensation",
                "AllocatedShareBasedCompensationExpense",
            ])],
        )
        .with_column(
            C::PaymentsToAcquirePropertyPlantAndEquipment,
            vec![tag("PaymentsToAcquirePropertyPlantAndEquipment")],
        )
        .with_column(
            C::ProceedsFromSaleOfPropertyPlantAndEquipment,
            vec![tag("ProceedsFromSaleOfPropertyPlantAndEquipment")],
        )
        .with_column(
            C::PaymentsToAcquireBusinessesNetOfCashAcquired,
            vec![tag("PaymentsToAcquireBusinessesNetOfCashAcquired")],
        )
        .with_column(
            C::PaymentsOfDividends,
            vec![alias(&["PaymentsOfDividends", "PaymentsOfDividendsCommonStock"])],
        )
        .with_column(
            C::PaymentsForRepurchaseOfEquity,
            vec![alias(&[
                "PaymentsForRepurchaseOfCommonStock",
                "PaymentsForRepurchaseOfEquity",
            ])],
        )
        .with_column(
            C::ProceedsFromIssuanceOfLongTermDebt,
            vec![tag("ProceedsFromIssuanceOfLongTermDebt")],
        )
        .with_column(
            C::RepaymentsOfLongTermDebt,
            vec![tag("RepaymentsOfLongTermDebt")],
        );

    // A reported total without a discontinued split means no discontinued operations.
    for activity in &ACTIVITIES {
        book = book
            .with_post_rules(activity.discontinued, vec![zero_if_any(&[activity.total])])
            .with_post_rules(
                activity.continuing,
                vec![triangle(activity.total, activity.continuing, activity.discontinued)],
            );
    }

    book = book
        .with_post_rules(
            C::EffectOfExchangeRateChanges,
            vec![zero_if_all(&NET_CHANGE_ADDENDS[..3])],
        )
        .with_post_rules(C::NetChangeInCash, vec![sum(&NET_CHANGE_ADDENDS)]);

    for activity in &ACTIVITIES {
        book = book.with_identity(Identity::new(
            activity.check,
            activity.total,
            plus(&[activity.continuing, activity.discontinued]),
        ));
    }

    book = book
        .with_identity(Identity::new(
            "CashChangeCheck",
            C::NetChangeInCash,
            plus(&NET_CHANGE_ADDENDS),
        ))
        .with_dedup_family(&[
            "CashCashEquivalentsRestrictedCashAndRestrictedCashEquivalentsPeriodIncreaseDecreaseIncludingExchangeRateEffect",
            "CashAndCashEquivalentsPeriodIncreaseDecrease",
            "CashPeriodIncreaseDecrease",
        ])
        .with_dedup_family(&[
            "DepreciationDepletionAndAmortization",
            "DepreciationAmortizationAndAccretionNet",
            "DepreciationAndAmortization",
        ])
        .with_dedup_family(&[
            "ShareBasedCompensation",
            "AllocatedShareBasedCompensationExpense",
        ])
        .with_dedup_family(&["PaymentsOfDividends", "PaymentsOfDividendsCommonStock"])
        .with_dedup_family(&[
            "PaymentsForRepurchaseOfCommonStock",
            "PaymentsForRepurchaseOfEquity",
        ]);

    PAYMENT_TAGS.iter().fold(book, |book, name| {
        book.with_sign_correction(SignCorrection::positive(*name))
    })
}
