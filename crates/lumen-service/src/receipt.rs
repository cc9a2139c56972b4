//! # Receipt Projection
//!
//! The receipt-shaped structure handed to the document/receipt renderer.
//! This module only defines the shape and fills it from a persisted
//! sale; HTML/PDF formatting lives outside this workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lumen_core::{BusinessSettings, Payment, Sale, SaleItem, TenderMethod};

/// One rendered line on the receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub description: String,
    pub sku: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub tax_cents: i64,
}

/// One tender entry on the receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptTender {
    pub method: TenderMethod,
    pub amount_cents: i64,
}

/// The full receipt projection: business header, ordered lines, totals,
/// tenders, and the computed change amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    // Business header, injected from BusinessSettings.
    pub store_name: String,
    pub currency_code: String,
    pub receipt_footer: Option<String>,

    pub sale_id: String,
    pub timestamp: DateTime<Utc>,

    pub lines: Vec<ReceiptLine>,

    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,

    pub tenders: Vec<ReceiptTender>,
    /// Sum of positive tenders (what the customer handed over).
    pub tendered_cents: i64,
    /// Change given back, recorded as negative tenders on the sale.
    pub change_cents: i64,
}

impl Receipt {
    /// Assembles a receipt from a persisted sale and the store header.
    pub fn build(
        settings: &BusinessSettings,
        sale: &Sale,
        items: &[SaleItem],
        payments: &[Payment],
    ) -> Self {
        let tendered_cents: i64 = payments
            .iter()
            .map(|p| p.amount_cents)
            .filter(|a| *a > 0)
            .sum();
        let change_cents: i64 = -payments
            .iter()
            .map(|p| p.amount_cents)
            .filter(|a| *a < 0)
            .sum::<i64>();

        Receipt {
            store_name: settings.store_name.clone(),
            currency_code: settings.currency_code.clone(),
            receipt_footer: settings.receipt_footer.clone(),
            sale_id: sale.id.clone(),
            timestamp: sale.completed_at.unwrap_or(sale.created_at),
            lines: items
                .iter()
                .map(|i| ReceiptLine {
                    description: i.name_snapshot.clone(),
                    sku: i.sku_snapshot.clone(),
                    quantity: i.quantity,
                    unit_price_cents: i.unit_price_cents,
                    line_total_cents: i.line_total_cents,
                    tax_cents: i.tax_cents,
                })
                .collect(),
            subtotal_cents: sale.subtotal_cents,
            tax_cents: sale.tax_cents,
            discount_cents: sale.discount_cents,
            total_cents: sale.total_cents,
            tenders: payments
                .iter()
                .map(|p| ReceiptTender {
                    method: p.method,
                    amount_cents: p.amount_cents,
                })
                .collect(),
            tendered_cents,
            change_cents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::SaleStatus;

    #[test]
    fn change_is_the_negated_sum_of_negative_tenders() {
        let now = Utc::now();
        let settings = BusinessSettings::defaults(now);
        let sale = Sale {
            id: "s1".to_string(),
            status: SaleStatus::Completed,
            subtotal_cents: 2000,
            tax_cents: 160,
            discount_cents: 0,
            total_cents: 2160,
            cashier_id: None,
            note: None,
            created_at: now,
            completed_at: Some(now),
            cancelled_at: None,
            cancel_reason: None,
        };
        let payments = vec![
            Payment {
                id: "pay1".to_string(),
                sale_id: "s1".to_string(),
                method: TenderMethod::Cash,
                amount_cents: 2500,
                reference: None,
                created_at: now,
            },
            Payment {
                id: "pay2".to_string(),
                sale_id: "s1".to_string(),
                method: TenderMethod::Cash,
                amount_cents: -340,
                reference: None,
                created_at: now,
            },
        ];

        let receipt = Receipt::build(&settings, &sale, &[], &payments);

        assert_eq!(receipt.tendered_cents, 2500);
        assert_eq!(receipt.change_cents, 340);
        assert_eq!(receipt.total_cents, 2160);
        assert_eq!(receipt.tenders.len(), 2);
        assert_eq!(receipt.store_name, "Lumen POS");
    }
}
