//! Sales statistics over paid, product-typed payment items.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shopdesk_core::{Money, ProductId};

use crate::product::Product;

/// Optional `[from, to)` window on payment time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl SalesWindow {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at < to)
    }
}

/// Window for per-product totals: `paid_at BETWEEN from AND to` (inclusive)
/// when `from` is set, unbounded otherwise. `to` defaults to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: DateTime<Utc>,
}

impl StatsWindow {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        Self { from, to: to.unwrap_or(now) }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        match self.from {
            Some(from) => at >= from && at <= self.to,
            None => true,
        }
    }
}

/// Shop product with its sold quantity in a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoldProduct {
    pub product: Product,
    pub sold_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSalesStats {
    pub product_id: ProductId,
    /// Sum of item counts.
    pub product_count: i64,
    /// Sum of `amount * count`.
    pub product_amount: Money,
}

/// Sold quantity on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesPoint {
    pub day: NaiveDate,
    pub sold_count: i64,
}

/// Dense daily series over `[from, to]`; days missing from `points` are zero.
pub fn fill_daily_series(from: NaiveDate, to: NaiveDate, points: &[SalesPoint]) -> Vec<SalesPoint> {
    let mut series = Vec::new();
    let mut day = from;
    while day <= to {
        let sold_count = points
            .iter()
            .filter(|p| p.day == day)
            .map(|p| p.sold_count)
            .sum();
        series.push(SalesPoint { day, sold_count });
        day += Duration::days(1);
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn sales_window_is_half_open() {
        let w = SalesWindow::new(Some(at(2)), Some(at(5)));
        assert!(!w.contains(at(1)));
        assert!(w.contains(at(2)));
        assert!(w.contains(at(4)));
        assert!(!w.contains(at(5)));
        assert!(SalesWindow::default().contains(at(28)));
    }

    #[test]
    fn stats_window_is_inclusive_and_defaults_to_now() {
        let w = StatsWindow::new(Some(at(2)), None, at(5));
        assert!(w.contains(at(5)));
        assert!(!w.contains(at(6)));
        assert!(StatsWindow::new(None, None, at(5)).contains(at(20)));
    }

    #[test]
    fn daily_series_fills_gaps_with_zero() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let series = fill_daily_series(
            d(1),
            d(3),
            &[SalesPoint { day: d(2), sold_count: 4 }],
        );
        let counts: Vec<i64> = series.iter().map(|p| p.sold_count).collect();
        assert_eq!(counts, vec![0, 4, 0]);
    }
}
