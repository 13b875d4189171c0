//! Per-customer metric extraction over payment records.
//!
//! The in-memory store evaluates distributions with these functions; the
//! Postgres store computes the same values in SQL.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use shopdesk_core::{Money, PaymentId, ProductId, UserId};

use crate::distribution::{DistributionMetric, MetricSample};
use crate::payment::{Payment, PaymentItem, PaymentItemType};

/// Customers with a paid payment containing a product-typed item of `product_id`.
pub fn buyers_of(
    product_id: ProductId,
    payments: &[Payment],
    items: &[PaymentItem],
) -> BTreeSet<UserId> {
    let paid: HashMap<PaymentId, &Payment> = payments
        .iter()
        .filter(|p| p.is_paid())
        .map(|p| (p.id, p))
        .collect();

    items
        .iter()
        .filter(|i| i.is_product_item_of(product_id))
        .filter_map(|i| paid.get(&i.payment_id).map(|p| p.user_id))
        .collect()
}

/// Evaluate `metric` for every buyer of `product_id`.
pub fn metric_samples(
    metric: DistributionMetric,
    product_id: ProductId,
    payments: &[Payment],
    items: &[PaymentItem],
    now: DateTime<Utc>,
) -> Vec<MetricSample> {
    let buyers = buyers_of(product_id, payments, items);

    let mut values: BTreeMap<UserId, f64> = BTreeMap::new();
    for user in buyers {
        let value = match metric {
            DistributionMetric::AmountSpent => {
                paid_of(payments, user).map(|p| p.amount).sum::<Money>().as_decimal()
            }
            DistributionMetric::PaymentCount => paid_of(payments, user).count() as f64,
            DistributionMetric::ShopCount => paid_of(payments, user)
                .filter(|p| {
                    items
                        .iter()
                        .any(|i| i.payment_id == p.id && i.item_type == PaymentItemType::Product)
                })
                .count() as f64,
            DistributionMetric::DaysFromLastOrder => {
                let last = paid_of(payments, user)
                    .filter(|p| {
                        items
                            .iter()
                            .any(|i| i.payment_id == p.id && i.is_product_item_of(product_id))
                    })
                    .map(|p| p.ordered_at())
                    .max();
                match last {
                    Some(last) => (now - last).num_days().max(0) as f64,
                    None => continue,
                }
            }
        };
        values.insert(user, value);
    }

    values
        .into_iter()
        .map(|(user_id, value)| MetricSample { user_id, value })
        .collect()
}

fn paid_of(payments: &[Payment], user: UserId) -> impl Iterator<Item = &Payment> + '_ {
    payments
        .iter()
        .filter(move |p| p.is_paid() && p.user_id == user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PaymentStatus;
    use chrono::{Duration, TimeZone};
    use shopdesk_core::PaymentItemId;

    struct Ledger {
        payments: Vec<Payment>,
        items: Vec<PaymentItem>,
    }

    impl Ledger {
        fn new() -> Self {
            Self { payments: Vec::new(), items: Vec::new() }
        }

        fn pay(
            &mut self,
            user: i64,
            status: PaymentStatus,
            cents: i64,
            at: DateTime<Utc>,
            lines: &[(Option<i64>, PaymentItemType)],
        ) {
            let id = PaymentId::new(self.payments.len() as i64 + 1);
            self.payments.push(Payment {
                id,
                user_id: UserId::new(user),
                status,
                amount: Money::from_cents(cents),
                created_at: at,
                paid_at: (status == PaymentStatus::Paid).then_some(at),
            });
            for (product, item_type) in lines {
                self.items.push(PaymentItem {
                    id: PaymentItemId::new(self.items.len() as i64 + 1),
                    payment_id: id,
                    product_id: product.map(ProductId::new),
                    item_type: *item_type,
                    count: 1,
                    amount: Money::from_cents(cents),
                });
            }
        }

        fn samples(&self, metric: DistributionMetric, now: DateTime<Utc>) -> Vec<(i64, f64)> {
            metric_samples(metric, ProductId::new(1), &self.payments, &self.items, now)
                .into_iter()
                .map(|s| (s.user_id.get(), s.value))
                .collect()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn ledger() -> Ledger {
        use PaymentItemType::*;
        use PaymentStatus::*;
        let mut l = Ledger::new();
        // user 1: bought product 1 twice, plus a subscription
        l.pay(1, Paid, 1000, now() - Duration::days(40), &[(Some(1), Product)]);
        l.pay(1, Paid, 500, now() - Duration::days(3), &[(Some(1), Product)]);
        l.pay(1, Paid, 250, now() - Duration::days(1), &[(None, SubscriptionType)]);
        // user 2: bought product 1 once, and product 2 in another order
        l.pay(2, Paid, 300, now() - Duration::days(10), &[(Some(1), Product)]);
        l.pay(2, Paid, 700, now() - Duration::days(2), &[(Some(2), Product)]);
        // user 3: only an unpaid attempt for product 1
        l.pay(3, Form, 300, now() - Duration::days(1), &[(Some(1), Product)]);
        // user 4: product 1 only as a donation-typed line
        l.pay(4, Paid, 300, now() - Duration::days(1), &[(Some(1), Donation)]);
        l
    }

    #[test]
    fn population_is_paid_product_buyers() {
        let l = ledger();
        let buyers: Vec<i64> = buyers_of(ProductId::new(1), &l.payments, &l.items)
            .into_iter()
            .map(|u| u.get())
            .collect();
        assert_eq!(buyers, vec![1, 2]);
    }

    #[test]
    fn amount_spent_sums_all_paid_payments() {
        assert_eq!(
            ledger().samples(DistributionMetric::AmountSpent, now()),
            vec![(1, 17.5), (2, 10.0)]
        );
    }

    #[test]
    fn payment_count_counts_paid_payments() {
        assert_eq!(
            ledger().samples(DistributionMetric::PaymentCount, now()),
            vec![(1, 3.0), (2, 2.0)]
        );
    }

    #[test]
    fn shop_count_counts_orders_with_products() {
        assert_eq!(
            ledger().samples(DistributionMetric::ShopCount, now()),
            vec![(1, 2.0), (2, 2.0)]
        );
    }

    #[test]
    fn days_from_last_order_uses_latest_order_of_the_product() {
        assert_eq!(
            ledger().samples(DistributionMetric::DaysFromLastOrder, now()),
            vec![(1, 3.0), (2, 10.0)]
        );
    }
}
