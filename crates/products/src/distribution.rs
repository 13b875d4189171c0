//! Customer distributions per product.
//!
//! A distribution groups customers by one numeric metric into consecutive
//! half-open bands `[levels[i], levels[i + 1])`; the last band is open-ended.
//! All four admin distributions share this code and differ only in the
//! [`DistributionMetric`] the store evaluates per customer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use shopdesk_core::{DomainError, DomainResult, UserId, ValueObject};

/// Minimum number of caller-supplied boundaries.
pub const MIN_LEVELS: usize = 3;

/// Ascending bucket boundaries, always starting at zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DistributionLevels(Vec<f64>);

impl ValueObject for DistributionLevels {}

impl DistributionLevels {
    /// Validate and normalise caller-supplied boundaries.
    ///
    /// Requires at least three finite, non-negative values. The result is
    /// sorted, deduplicated and led by `0`. Normalising an already normalised
    /// set returns it unchanged.
    pub fn new(levels: impl Into<Vec<f64>>) -> DomainResult<Self> {
        let mut levels: Vec<f64> = levels.into();
        if levels.len() < MIN_LEVELS {
            return Err(DomainError::configuration(format!(
                "distribution needs at least {MIN_LEVELS} levels, got {}",
                levels.len()
            )));
        }
        if let Some(bad) = levels.iter().find(|l| !l.is_finite() || **l < 0.0) {
            return Err(DomainError::configuration(format!(
                "distribution levels must be finite and non-negative, got {bad}"
            )));
        }

        levels.sort_by(f64::total_cmp);
        levels.dedup();
        if levels[0] != 0.0 {
            levels.insert(0, 0.0);
        }
        Ok(Self(levels))
    }

    // Only for literals that are already sorted and zero-led.
    fn from_normalized(levels: &[f64]) -> Self {
        Self(levels.to_vec())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// `(from, to)` pairs, the last one open-ended.
    pub fn ranges(&self) -> impl Iterator<Item = (f64, Option<f64>)> + '_ {
        self.0
            .iter()
            .enumerate()
            .map(|(i, from)| (*from, self.0.get(i + 1).copied()))
    }

    /// Index of the band containing `value`, if any.
    pub fn bucket_of(&self, value: f64) -> Option<usize> {
        // Number of boundaries <= value; zero means below the first band.
        let idx = self.0.partition_point(|l| *l <= value);
        idx.checked_sub(1)
    }
}

/// Per-customer metric a distribution is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMetric {
    /// Sum of the customer's paid payment amounts.
    AmountSpent,
    /// Number of the customer's paid payments.
    PaymentCount,
    /// Whole days since the customer last ordered the product.
    DaysFromLastOrder,
    /// Number of the customer's paid shop orders.
    ShopCount,
}

impl DistributionMetric {
    pub const ALL: [DistributionMetric; 4] = [
        DistributionMetric::AmountSpent,
        DistributionMetric::PaymentCount,
        DistributionMetric::ShopCount,
        DistributionMetric::DaysFromLastOrder,
    ];

    /// Name of the configurable level set.
    pub fn config_key(&self) -> &'static str {
        match self {
            DistributionMetric::AmountSpent => "user_payment_amount",
            DistributionMetric::PaymentCount => "user_payment_count",
            DistributionMetric::ShopCount => "product_shop_count",
            DistributionMetric::DaysFromLastOrder => "product_days_from_last_order",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.config_key() == key)
    }

    /// Value of the admin drill-down `type` parameter.
    pub fn drilldown_type(&self) -> &'static str {
        match self {
            DistributionMetric::AmountSpent => "amountSpent",
            DistributionMetric::PaymentCount => "paymentCounts",
            DistributionMetric::ShopCount => "shopCounts",
            DistributionMetric::DaysFromLastOrder => "shopDays",
        }
    }

    pub fn from_drilldown_type(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.drilldown_type() == value)
    }

    fn default_levels(&self) -> DistributionLevels {
        match self {
            DistributionMetric::AmountSpent => DistributionLevels::from_normalized(&[
                0.0, 0.01, 3.0, 6.0, 10.0, 20.0, 50.0, 100.0, 200.0, 300.0,
            ]),
            DistributionMetric::PaymentCount | DistributionMetric::ShopCount => {
                DistributionLevels::from_normalized(&[0.0, 1.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0])
            }
            DistributionMetric::DaysFromLastOrder => DistributionLevels::from_normalized(&[
                0.0, 7.0, 14.0, 31.0, 93.0, 186.0, 365.0, 99999.0,
            ]),
        }
    }
}

/// Metric value of one customer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub user_id: UserId,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionBucket {
    pub from: f64,
    /// `None` for the open-ended last band.
    pub to: Option<f64>,
    pub count: u64,
}

/// Count samples per band.
pub fn distribute(
    levels: &DistributionLevels,
    samples: &[MetricSample],
) -> Vec<DistributionBucket> {
    let mut buckets: Vec<DistributionBucket> = levels
        .ranges()
        .map(|(from, to)| DistributionBucket { from, to, count: 0 })
        .collect();

    for sample in samples {
        if let Some(idx) = levels.bucket_of(sample.value) {
            buckets[idx].count += 1;
        }
    }
    buckets
}

/// Samples whose value lies in `[from, to)`, ordered by user id.
pub fn members_in_range(samples: &[MetricSample], from: f64, to: Option<f64>) -> Vec<MetricSample> {
    let mut members: Vec<MetricSample> = samples
        .iter()
        .filter(|s| s.value >= from && to.is_none_or(|to| s.value < to))
        .copied()
        .collect();
    members.sort_by_key(|s| s.user_id);
    members
}

/// A computed distribution, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDistribution {
    pub metric: DistributionMetric,
    pub levels: DistributionLevels,
    pub buckets: Vec<DistributionBucket>,
}

impl ProductDistribution {
    pub fn compute(
        metric: DistributionMetric,
        levels: &DistributionLevels,
        samples: &[MetricSample],
    ) -> Self {
        Self {
            metric,
            levels: levels.clone(),
            buckets: distribute(levels, samples),
        }
    }
}

/// Named level sets, seeded with defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionConfig {
    levels: HashMap<DistributionMetric, DistributionLevels>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        let levels = DistributionMetric::ALL
            .into_iter()
            .map(|m| (m, m.default_levels()))
            .collect();
        Self { levels }
    }
}

impl DistributionConfig {
    /// Override a named level set. Unknown keys and invalid levels are
    /// configuration errors.
    pub fn set(&mut self, key: &str, levels: Vec<f64>) -> DomainResult<()> {
        let metric = DistributionMetric::from_config_key(key).ok_or_else(|| {
            DomainError::configuration(format!("unknown distribution '{key}'"))
        })?;
        let levels = DistributionLevels::new(levels)
            .map_err(|e| DomainError::configuration(format!("{key}: {e}")))?;
        self.levels.insert(metric, levels);
        Ok(())
    }

    pub fn levels(&self, metric: DistributionMetric) -> DistributionLevels {
        self.levels
            .get(&metric)
            .cloned()
            .unwrap_or_else(|| metric.default_levels())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(user: i64, value: f64) -> MetricSample {
        MetricSample { user_id: UserId::new(user), value }
    }

    #[test]
    fn fewer_than_three_levels_is_a_configuration_error() {
        for levels in [vec![], vec![1.0], vec![0.0, 5.0]] {
            assert!(matches!(
                DistributionLevels::new(levels),
                Err(DomainError::Configuration(_))
            ));
        }
    }

    #[test]
    fn normalisation_sorts_and_injects_zero() {
        let levels = DistributionLevels::new(vec![10.0, 1.0, 5.0]).unwrap();
        assert_eq!(levels.as_slice(), &[0.0, 1.0, 5.0, 10.0]);

        let levels = DistributionLevels::new(vec![3.0, 0.0, 1.0]).unwrap();
        assert_eq!(levels.as_slice(), &[0.0, 1.0, 3.0]);
    }

    #[test]
    fn negative_or_non_finite_levels_are_rejected() {
        assert!(DistributionLevels::new(vec![-1.0, 2.0, 3.0]).is_err());
        assert!(DistributionLevels::new(vec![1.0, f64::NAN, 3.0]).is_err());
    }

    #[test]
    fn buckets_are_half_open_and_last_is_open_ended() {
        let levels = DistributionLevels::new(vec![0.0, 1.0, 3.0]).unwrap();
        let samples = [
            sample(1, 0.0),
            sample(2, 0.5),
            sample(3, 1.0),
            sample(4, 2.99),
            sample(5, 3.0),
            sample(6, 1000.0),
        ];
        let buckets = distribute(&levels, &samples);
        assert_eq!(
            buckets,
            vec![
                DistributionBucket { from: 0.0, to: Some(1.0), count: 2 },
                DistributionBucket { from: 1.0, to: Some(3.0), count: 2 },
                DistributionBucket { from: 3.0, to: None, count: 2 },
            ]
        );

        let members = members_in_range(&samples, 1.0, Some(3.0));
        let ids: Vec<i64> = members.iter().map(|m| m.user_id.get()).collect();
        assert_eq!(ids, vec![3, 4]);

        let open = members_in_range(&samples, 3.0, None);
        assert_eq!(open.len(), 2);
    }

    #[test]
    fn drilldown_types_map_to_metrics() {
        assert_eq!(
            DistributionMetric::from_drilldown_type("amountSpent"),
            Some(DistributionMetric::AmountSpent)
        );
        assert_eq!(
            DistributionMetric::from_drilldown_type("shopDays"),
            Some(DistributionMetric::DaysFromLastOrder)
        );
        assert_eq!(DistributionMetric::from_drilldown_type("bogus"), None);
        for m in DistributionMetric::ALL {
            assert_eq!(DistributionMetric::from_drilldown_type(m.drilldown_type()), Some(m));
            assert_eq!(DistributionMetric::from_config_key(m.config_key()), Some(m));
        }
    }

    #[test]
    fn config_defaults_and_overrides() {
        let mut config = DistributionConfig::default();
        assert_eq!(
            config.levels(DistributionMetric::PaymentCount).as_slice(),
            &[0.0, 1.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0]
        );

        config.set("user_payment_count", vec![5.0, 2.0, 1.0]).unwrap();
        assert_eq!(
            config.levels(DistributionMetric::PaymentCount).as_slice(),
            &[0.0, 1.0, 2.0, 5.0]
        );

        assert!(config.set("user_payment_count", vec![1.0, 2.0]).is_err());
        assert!(config.set("nope", vec![1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn default_levels_are_already_normalised() {
        for m in DistributionMetric::ALL {
            let levels = m.default_levels();
            assert_eq!(DistributionLevels::new(levels.as_slice().to_vec()).unwrap(), levels);
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn raw_levels() -> impl Strategy<Value = Vec<f64>> {
            prop::collection::vec(0.0f64..10_000.0, 3..12)
        }

        proptest! {
            /// Property: normalisation is idempotent.
            #[test]
            fn normalisation_is_idempotent(raw in raw_levels()) {
                let once = DistributionLevels::new(raw).unwrap();
                let twice = DistributionLevels::new(once.as_slice().to_vec()).unwrap();
                prop_assert_eq!(once, twice);
            }

            /// Property: normalised levels are strictly ascending and zero-led.
            #[test]
            fn normalised_levels_are_ascending(raw in raw_levels()) {
                let levels = DistributionLevels::new(raw).unwrap();
                prop_assert_eq!(levels.as_slice()[0], 0.0);
                prop_assert!(levels.as_slice().windows(2).all(|w| w[0] < w[1]));
            }

            /// Property: every non-negative sample lands in exactly one bucket,
            /// and each bucket's drill-down returns exactly its members.
            #[test]
            fn buckets_partition_samples(
                raw in raw_levels(),
                values in prop::collection::vec(0.0f64..20_000.0, 0..60),
            ) {
                let levels = DistributionLevels::new(raw).unwrap();
                let samples: Vec<MetricSample> = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| MetricSample { user_id: UserId::new(i as i64 + 1), value: *v })
                    .collect();

                let buckets = distribute(&levels, &samples);
                let total: u64 = buckets.iter().map(|b| b.count).sum();
                prop_assert_eq!(total, samples.len() as u64);

                for pair in buckets.windows(2) {
                    prop_assert_eq!(pair[0].to, Some(pair[1].from));
                }

                let mut seen = Vec::new();
                for b in &buckets {
                    let members = members_in_range(&samples, b.from, b.to);
                    prop_assert_eq!(members.len() as u64, b.count);
                    seen.extend(members.into_iter().map(|m| m.user_id));
                }
                seen.sort();
                let before = seen.len();
                seen.dedup();
                prop_assert_eq!(before, seen.len());
                prop_assert_eq!(seen.len(), samples.len());
            }
        }
    }
}
