//! Merchant and amount breakdowns for the redemption view

use crate::aggregate::{round_to, safe_ratio};
use crate::rows::{fields, value_as_number, Row, RowExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const OTHERS_LABEL: &str = "Others";
const UNKNOWN_MERCHANT: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BreakdownSettings {
    pub heatmap_merchants: usize,
    pub heatmap_amounts: usize,
    pub pie_merchants: usize,
}

impl Default for BreakdownSettings {
    fn default() -> Self {
        Self {
            heatmap_merchants: 6,
            heatmap_amounts: 6,
            pie_merchants: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantSlice {
    pub merchant: String,
    pub redemptions: u64,
    pub redeemed_value: f64,
    /// Fraction of all redemptions, 4 decimals.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountBucket {
    pub amount: f64,
    pub label: String,
    pub redemptions: u64,
    pub redeemed_value: f64,
}

/// `cells[m][a]` counts redemptions of `amounts[a]` at `merchants[m]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Heatmap {
    pub merchants: Vec<String>,
    pub amounts: Vec<String>,
    pub cells: Vec<Vec<u64>>,
    pub max_value: u64,
}

/// Display label of a redeemed amount: whole amounts without decimals.
pub fn amount_label(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{}", amount as i64)
    } else {
        format!("{:.2}", amount)
    }
}

fn merchant_name(row: &Row) -> String {
    row.text(fields::MERCHANT)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string())
}

fn amount_value(row: &Row) -> Option<f64> {
    row.get(fields::AMOUNT).and_then(value_as_number)
}

/// Amount buckets in ascending amount order; rows without an amount are dropped.
pub fn amount_distribution(rows: &[Row]) -> Vec<AmountBucket> {
    let mut buckets: Vec<AmountBucket> = Vec::new();
    for row in rows {
        let Some(amount) = amount_value(row) else { continue };
        let label = amount_label(amount);
        let redemptions = row.count(fields::REDEMPTIONS);
        let value = row.number(fields::REDEEMED_VALUE);
        match buckets.iter_mut().find(|b| b.label == label) {
            Some(bucket) => {
                bucket.redemptions += redemptions;
                bucket.redeemed_value += value;
            }
            None => buckets.push(AmountBucket {
                amount,
                label,
                redemptions,
                redeemed_value: value,
            }),
        }
    }
    buckets.sort_by(|a, b| a.amount.total_cmp(&b.amount));
    for bucket in &mut buckets {
        bucket.redeemed_value = round_to(bucket.redeemed_value, 2);
    }
    buckets
}

/// Top merchants by redemptions plus one "Others" slice for the remainder.
pub fn merchant_pie(rows: &[Row], top: usize) -> Vec<MerchantSlice> {
    let mut merchants: Vec<(String, u64, f64)> = Vec::new();
    for row in rows {
        let name = merchant_name(row);
        let redemptions = row.count(fields::REDEMPTIONS);
        let value = row.number(fields::REDEEMED_VALUE);
        match merchants.iter_mut().find(|m| m.0 == name) {
            Some(entry) => {
                entry.1 += redemptions;
                entry.2 += value;
            }
            None => merchants.push((name, redemptions, value)),
        }
    }
    merchants.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let total: u64 = merchants.iter().map(|m| m.1).sum();
    let slice = |merchant: String, redemptions: u64, value: f64| MerchantSlice {
        merchant,
        redemptions,
        redeemed_value: round_to(value, 2),
        share: round_to(safe_ratio(redemptions as f64, total as f64), 4),
    };

    let rest = if merchants.len() > top {
        merchants.split_off(top)
    } else {
        Vec::new()
    };
    let mut slices: Vec<MerchantSlice> = merchants
        .into_iter()
        .map(|(name, redemptions, value)| slice(name, redemptions, value))
        .collect();

    if !rest.is_empty() {
        let redemptions = rest.iter().map(|m| m.1).sum();
        let value = rest.iter().map(|m| m.2).sum();
        slices.push(slice(OTHERS_LABEL.to_string(), redemptions, value));
    }
    slices
}

/// Cross the top merchants with the top amounts of a `merchant, amount, redemptions` matrix.
///
/// Merchants are ordered by redemptions, amounts ascending; pairs absent
/// from the matrix are 0.
pub fn merchant_amount_heatmap(rows: &[Row], settings: &BreakdownSettings) -> Heatmap {
    let mut merchant_totals: HashMap<String, u64> = HashMap::new();
    let mut amount_totals: HashMap<String, (f64, u64)> = HashMap::new();
    let mut pairs: HashMap<(String, String), u64> = HashMap::new();

    for row in rows {
        let Some(amount) = amount_value(row) else { continue };
        let merchant = merchant_name(row);
        let label = amount_label(amount);
        let count = row.count(fields::REDEMPTIONS);

        *merchant_totals.entry(merchant.clone()).or_default() += count;
        amount_totals.entry(label.clone()).or_insert((amount, 0)).1 += count;
        *pairs.entry((merchant, label)).or_default() += count;
    }

    let mut merchants: Vec<(String, u64)> = merchant_totals.into_iter().collect();
    merchants.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    merchants.truncate(settings.heatmap_merchants);

    let mut amounts: Vec<(String, (f64, u64))> = amount_totals.into_iter().collect();
    amounts.sort_by(|a, b| {
        b.1 .1
            .cmp(&a.1 .1)
            .then_with(|| a.1 .0.total_cmp(&b.1 .0))
    });
    amounts.truncate(settings.heatmap_amounts);
    amounts.sort_by(|a, b| a.1 .0.total_cmp(&b.1 .0));

    let cells: Vec<Vec<u64>> = merchants
        .iter()
        .map(|(merchant, _)| {
            amounts
                .iter()
                .map(|(label, _)| {
                    pairs
                        .get(&(merchant.clone(), label.clone()))
                        .copied()
                        .unwrap_or(0)
                })
                .collect()
        })
        .collect();
    let max_value = cells.iter().flatten().copied().max().unwrap_or(0);

    Heatmap {
        merchants: merchants.into_iter().map(|(m, _)| m).collect(),
        amounts: amounts.into_iter().map(|(label, _)| label).collect(),
        cells,
        max_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: Vec<serde_json::Value>) -> Vec<Row> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_amount_label() {
        assert_eq!(amount_label(50.0), "50");
        assert_eq!(amount_label(12.5), "12.50");
        assert_eq!(amount_label(0.0), "0");
    }

    #[test]
    fn test_pie_groups_tail_into_others() {
        let data: Vec<serde_json::Value> = (0..12)
            .map(|i| json!({"merchant": format!("m{:02}", i), "redemptions": 20 - i, "redeemed_value": 10}))
            .collect();
        let slices = merchant_pie(&rows(data), 10);

        assert_eq!(slices.len(), 11);
        assert_eq!(slices[0].merchant, "m00");
        assert_eq!(slices[10].merchant, OTHERS_LABEL);
        // m10 and m11
        assert_eq!(slices[10].redemptions, 10 + 9);
        assert_eq!(slices[10].redeemed_value, 20.0);
        let share_sum: f64 = slices.iter().map(|s| s.share).sum();
        assert!((share_sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_pie_without_remainder_has_no_others() {
        let slices = merchant_pie(
            &rows(vec![
                json!({"merchant": "a", "redemptions": 1}),
                json!({"merchant": null, "redemptions": 3}),
            ]),
            10,
        );
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].merchant, UNKNOWN_MERCHANT);
        assert_eq!(slices[0].share, 0.75);
    }

    #[test]
    fn test_heatmap_axes_and_missing_cells() {
        let mut data = vec![
            json!({"merchant": "cafe", "amount": 10, "redemptions": 5}),
            json!({"merchant": "cafe", "amount": "25.00", "redemptions": 2}),
            json!({"merchant": "books", "amount": 25, "redemptions": 7}),
        ];
        for i in 0..8 {
            data.push(json!({"merchant": format!("tail{}", i), "amount": 100 + i, "redemptions": 1}));
        }
        let heatmap = merchant_amount_heatmap(&rows(data), &BreakdownSettings::default());

        assert_eq!(heatmap.merchants.len(), 6);
        assert_eq!(heatmap.merchants[0], "books");
        assert_eq!(heatmap.merchants[1], "cafe");
        assert_eq!(heatmap.amounts.len(), 6);
        assert_eq!(heatmap.amounts[0], "10");
        assert_eq!(heatmap.amounts[1], "25");

        assert_eq!(heatmap.cells.len(), 6);
        assert!(heatmap.cells.iter().all(|row| row.len() == 6));
        assert_eq!(heatmap.cells[0], vec![0, 7, 0, 0, 0, 0]);
        assert_eq!(heatmap.cells[1][0], 5);
        assert_eq!(heatmap.cells[1][1], 2);
        assert_eq!(heatmap.max_value, 7);
    }

    #[test]
    fn test_amount_distribution_sorted() {
        let buckets = amount_distribution(&rows(vec![
            json!({"amount": 50, "redemptions": 2, "redeemed_value": 100}),
            json!({"amount": "10.5", "redemptions": 4, "redeemed_value": "42"}),
            json!({"amount": null, "redemptions": 9}),
        ]));
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].label, "10.50");
        assert_eq!(buckets[1].redeemed_value, 100.0);
    }
}
