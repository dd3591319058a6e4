//! Series Normalizer - Day aggregates into chart series
//!
//! Produces the liquidity and volume series drawn by the dashboard charts.
//! Both series are index-aligned and ordered oldest first.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::types::{DayAggregate, SeriesPoint};

/// Liquidity marker the subgraph uses for days without data
const NO_DATA_LIQUIDITY: &str = "0";

/// Liquidity and volume series, same length, same dates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub liquidity: Vec<SeriesPoint>,
    pub volume: Vec<SeriesPoint>,
}

impl ChartSeries {
    pub fn len(&self) -> usize {
        self.liquidity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.liquidity.is_empty()
    }
}

/// Convert day aggregates (any order) into ascending liquidity/volume series.
///
/// Days whose liquidity is exactly `"0"` are dropped. Volume is not
/// filtered. An unparsable amount fails the whole call.
pub fn normalize(records: &[DayAggregate]) -> Result<ChartSeries> {
    let mut points = records
        .iter()
        .filter(|d| d.liquidity_usd != NO_DATA_LIQUIDITY)
        .map(|d| {
            let liquidity = parse_amount(d.date, "liquidityUSD", &d.liquidity_usd)?;
            let volume = parse_amount(d.date, "volumeUSD", &d.volume_usd)?;
            Ok((d.date, liquidity, volume))
        })
        .collect::<Result<Vec<_>>>()?;

    // Reverse first so equal dates keep newest-accumulated-first order
    points.reverse();
    points.sort_by_key(|(date, _, _)| *date);

    let (liquidity, volume): (Vec<_>, Vec<_>) = points
        .into_iter()
        .map(|(date, liq, vol)| {
            (
                SeriesPoint { date, value: liq },
                SeriesPoint { date, value: vol },
            )
        })
        .unzip();

    Ok(ChartSeries { liquidity, volume })
}

fn parse_amount(date: i64, field: &'static str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AnalyticsError::DataIntegrity {
            date,
            field,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(date: i64, liq: &str, vol: &str) -> DayAggregate {
        DayAggregate {
            date,
            liquidity_usd: liq.to_string(),
            volume_usd: vol.to_string(),
        }
    }

    fn dates(points: &[SeriesPoint]) -> Vec<i64> {
        points.iter().map(|p| p.date).collect()
    }

    #[test]
    fn drops_placeholder_days_and_orders_by_date() {
        let input = vec![day(3, "100", "10"), day(1, "0", "5"), day(2, "50", "20")];
        let series = normalize(&input).unwrap();

        assert_eq!(
            series.liquidity,
            vec![
                SeriesPoint { date: 2, value: 50.0 },
                SeriesPoint { date: 3, value: 100.0 }
            ]
        );
        assert_eq!(
            series.volume,
            vec![
                SeriesPoint { date: 2, value: 20.0 },
                SeriesPoint { date: 3, value: 10.0 }
            ]
        );
    }

    #[test]
    fn empty_input_gives_empty_series() {
        let series = normalize(&[]).unwrap();
        assert!(series.is_empty());
        assert!(series.volume.is_empty());
    }

    #[test]
    fn all_placeholder_input_gives_empty_series() {
        let input = vec![day(1, "0", "1"), day(2, "0", "0")];
        let series = normalize(&input).unwrap();
        assert!(series.is_empty());
        assert!(series.volume.is_empty());
    }

    #[test]
    fn only_exact_zero_string_is_filtered() {
        let input = vec![day(1, "0.0", "1"), day(2, "0", "1"), day(3, "00", "1")];
        let series = normalize(&input).unwrap();
        assert_eq!(dates(&series.liquidity), vec![1, 3]);
        assert_eq!(series.liquidity[0].value, 0.0);
    }

    #[test]
    fn zero_volume_is_kept() {
        let series = normalize(&[day(7, "12.5", "0")]).unwrap();
        assert_eq!(series.volume, vec![SeriesPoint { date: 7, value: 0.0 }]);
    }

    #[test]
    fn newest_first_input_comes_out_oldest_first() {
        let input: Vec<_> = (1..=30)
            .rev()
            .map(|d| day(d * 86_400, &format!("{}", d * 10), "1"))
            .collect();
        let series = normalize(&input).unwrap();

        assert_eq!(series.len(), 30);
        assert!(series.liquidity.windows(2).all(|w| w[0].date <= w[1].date));
        assert_eq!(series.liquidity.first().unwrap().date, 86_400);
    }

    #[test]
    fn shuffled_input_is_sorted_and_aligned() {
        let input = vec![
            day(50, "5", "0.5"),
            day(10, "1", "0.1"),
            day(40, "0", "9"),
            day(30, "3", "0.3"),
            day(20, "2", "0.2"),
        ];
        let series = normalize(&input).unwrap();

        assert_eq!(dates(&series.liquidity), vec![10, 20, 30, 50]);
        assert_eq!(dates(&series.liquidity), dates(&series.volume));
        for (liq, vol) in series.liquidity.iter().zip(&series.volume) {
            assert!((liq.value / 10.0 - vol.value).abs() < 1e-12);
        }
    }

    #[test]
    fn unparsable_liquidity_reports_date() {
        let err = normalize(&[day(1, "10", "1"), day(99, "abc", "1")]).unwrap_err();
        match err {
            AnalyticsError::DataIntegrity { date, field, value } => {
                assert_eq!(date, 99);
                assert_eq!(field, "liquidityUSD");
                assert_eq!(value, "abc");
            }
            other => panic!("expected DataIntegrity, got {:?}", other),
        }
    }

    #[test]
    fn unparsable_volume_on_placeholder_day_is_ignored() {
        let series = normalize(&[day(1, "0", "garbage"), day(2, "4", "1")]).unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn non_finite_amount_is_rejected() {
        assert!(normalize(&[day(5, "10", "NaN")]).is_err());
        assert!(normalize(&[day(5, "inf", "1")]).is_err());
    }

    #[test]
    fn high_precision_subgraph_decimals_parse() {
        let series =
            normalize(&[day(1, "1234567890.123456789012345678", "0.000000000000000001")])
                .unwrap();
        assert!((series.liquidity[0].value - 1_234_567_890.123_456_7).abs() < 1e-3);
        assert!(series.volume[0].value > 0.0);
    }
}
