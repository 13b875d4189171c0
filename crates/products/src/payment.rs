//! Payments and their line items, as far as catalog statistics need them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopdesk_core::{Money, PaymentId, PaymentItemId, ProductId, UserId};

/// Payment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Form,
    Paid,
    Fail,
    Timeout,
    Refund,
    Imported,
    Prepaid,
}

/// Kind of a payment line item. Only [`PaymentItemType::Product`] items count
/// toward product sales statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentItemType {
    Product,
    SubscriptionType,
    Donation,
}

impl PaymentItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentItemType::Product => "product",
            PaymentItemType::SubscriptionType => "subscription_type",
            PaymentItemType::Donation => "donation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub status: PaymentStatus,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }

    /// Moment the order counts as placed: payment time, or creation time for
    /// rows paid before `paid_at` was recorded.
    pub fn ordered_at(&self) -> DateTime<Utc> {
        self.paid_at.unwrap_or(self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentItem {
    pub id: PaymentItemId,
    pub payment_id: PaymentId,
    pub product_id: Option<ProductId>,
    pub item_type: PaymentItemType,
    /// Quantity.
    pub count: i64,
    /// Unit amount.
    pub amount: Money,
}

impl PaymentItem {
    pub fn is_product_item_of(&self, product_id: ProductId) -> bool {
        self.item_type == PaymentItemType::Product && self.product_id == Some(product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_product_typed_items_belong_to_a_product() {
        let item = PaymentItem {
            id: PaymentItemId::new(1),
            payment_id: PaymentId::new(1),
            product_id: Some(ProductId::new(7)),
            item_type: PaymentItemType::Donation,
            count: 1,
            amount: Money::from_cents(100),
        };
        assert!(!item.is_product_item_of(ProductId::new(7)));

        let item = PaymentItem {
            item_type: PaymentItemType::Product,
            ..item
        };
        assert!(item.is_product_item_of(ProductId::new(7)));
        assert!(!item.is_product_item_of(ProductId::new(8)));
    }
}
