//! Tests for return / risk estimation

#[cfg(test)]
mod tests {
    use super::super::*;
    use chrono::{Duration, NaiveDate};

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    }

    fn points(coin: &str, prices: &[Option<f64>]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(t, p)| PricePoint::new(day(t as i64), coin, *p))
            .collect()
    }

    fn trending(n: usize, start: f64, step: f64) -> Vec<Option<f64>> {
        (0..n).map(|t| Some(start + step * t as f64)).collect()
    }

    #[test]
    fn test_pct_change_uses_current_price_denominator() {
        let prices = [100.0, 110.0, 121.0];
        let pct = pct_change(&prices, 1);
        assert!(pct[0].is_nan());
        assert!((pct[1] - 10.0 / 110.0).abs() < 1e-12);
        assert!((pct[2] - 11.0 / 121.0).abs() < 1e-12);
    }

    #[test]
    fn test_pct_change_propagates_gaps() {
        let prices = [100.0, f64::NAN, 120.0, 130.0, 0.0];
        let pct = pct_change(&prices, 2);
        assert!(pct[2].is_finite());
        assert!(pct[3].is_nan()); // lagged price missing
        assert!(pct[4].is_nan()); // divide by zero
    }

    #[test]
    fn test_pivot_aligns_dates_and_sorts_assets() {
        let mut rows = points("ethereum", &[Some(10.0), Some(11.0)]);
        rows.push(PricePoint::new(day(5), "bitcoin", Some(100.0)));
        let table = PriceTable::from_long(rows).unwrap();

        assert_eq!(table.assets(), &["bitcoin".to_string(), "ethereum".to_string()]);
        assert_eq!(table.n_periods(), 3);
        let btc = table.series("bitcoin").unwrap();
        assert!(btc[0].is_nan() && btc[1].is_nan());
        assert_eq!(btc[2], 100.0);
        let nulls = table.null_counts();
        assert_eq!(nulls[0], ("bitcoin".to_string(), 2));
        assert_eq!(nulls[1], ("ethereum".to_string(), 1));
    }

    #[test]
    fn test_pivot_rejects_duplicates() {
        let mut rows = points("bitcoin", &[Some(1.0)]);
        rows.push(PricePoint::new(day(0), "bitcoin", Some(2.0)));
        assert!(matches!(
            PriceTable::from_long(rows),
            Err(Error::DataFormat { .. })
        ));
    }

    #[test]
    fn test_asset_with_too_many_missing_prices_is_dropped() {
        let mut rows = points("A", &trending(60, 100.0, 1.0));
        rows.extend(points("B", &trending(60, 50.0, -0.2)));
        let sparse: Vec<Option<f64>> = (0..60)
            .map(|t| if t < 5 { Some(10.0 + t as f64) } else { None })
            .collect();
        rows.extend(points("C", &sparse));

        let table = PriceTable::from_long(rows).unwrap();
        let est = ReturnEstimates::estimate(&table, &EstimatorSettings::default()).unwrap();

        assert_eq!(est.assets(), &["A".to_string(), "B".to_string()]);
        assert_eq!(est.mu().len(), 2);
        assert_eq!(est.sigma().len(), 2);
        assert_eq!(est.dropped().len(), 1);
        assert_eq!(est.dropped()[0].asset, "C");
        assert_eq!(
            est.dropped()[0].reason,
            DropReason::MissingPrices {
                missing: 55,
                threshold: 50
            }
        );
    }

    #[test]
    fn test_short_history_is_dropped_not_nan() {
        let mut rows = points("A", &trending(20, 100.0, 1.0));
        // 8 observations with window 7 gives a single defined return
        let short: Vec<Option<f64>> = (0..20)
            .map(|t| if t >= 12 { Some(5.0 + t as f64) } else { None })
            .collect();
        rows.extend(points("B", &short));

        let table = PriceTable::from_long(rows).unwrap();
        let est = ReturnEstimates::estimate(&table, &EstimatorSettings::default()).unwrap();

        assert_eq!(est.assets(), &["A".to_string()]);
        assert!(est.mu().iter().all(|m| m.is_finite()));
        assert!(matches!(
            est.dropped()[0].reason,
            DropReason::InsufficientHistory { observations: 1, .. }
        ));
    }

    #[test]
    fn test_mean_and_covariance_match_hand_computation() {
        let a = [100.0, 110.0, 99.0, 120.0];
        let b = [10.0, 9.0, 9.5, 11.0];
        let mut rows = points("a", &a.map(Some));
        rows.extend(points("b", &b.map(Some)));

        let table = PriceTable::from_long(rows).unwrap();
        let settings = EstimatorSettings {
            window: 1,
            max_null_prices: 50,
        };
        let est = ReturnEstimates::estimate(&table, &settings).unwrap();

        let ra = pct_change(&a, 1);
        let rb = pct_change(&b, 1);
        let ma = (ra[1] + ra[2] + ra[3]) / 3.0;
        let mb = (rb[1] + rb[2] + rb[3]) / 3.0;
        let cov_ab = ((ra[1] - ma) * (rb[1] - mb)
            + (ra[2] - ma) * (rb[2] - mb)
            + (ra[3] - ma) * (rb[3] - mb))
            / 2.0;

        assert!((est.mu()[0] - ma).abs() < 1e-12);
        assert!((est.mu()[1] - mb).abs() < 1e-12);
        assert!((est.sigma()[0][1] - cov_ab).abs() < 1e-12);
        assert_eq!(est.sigma()[0][1], est.sigma()[1][0]);
        assert!(est.sigma()[0][0] > 0.0);
    }

    #[test]
    fn test_zero_window_rejected() {
        let table = PriceTable::from_long(points("A", &trending(10, 1.0, 1.0))).unwrap();
        let settings = EstimatorSettings {
            window: 0,
            max_null_prices: 50,
        };
        assert!(matches!(
            ReturnEstimates::estimate(&table, &settings),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_restrict_reorders_and_reports_gaps() {
        let est = ReturnEstimates::from_statistics(
            vec!["a".into(), "b".into(), "c".into()],
            vec![0.1, 0.2, 0.3],
            vec![
                vec![1.0, 0.1, 0.2],
                vec![0.1, 2.0, 0.3],
                vec![0.2, 0.3, 3.0],
            ],
        )
        .unwrap();

        let (mu, sigma) = est.restrict(&["c".into(), "a".into()]).unwrap();
        assert_eq!(mu, vec![0.3, 0.1]);
        assert_eq!(sigma, vec![vec![3.0, 0.2], vec![0.2, 1.0]]);

        match est.restrict(&["zzz".into()]) {
            Err(Error::DataGap { asset }) => assert_eq!(asset, "zzz"),
            other => panic!("Expected DataGap, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_from_statistics_dimension_mismatch() {
        let result = ReturnEstimates::from_statistics(
            vec!["a".into(), "b".into()],
            vec![0.1],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        );
        assert!(result.is_err());
    }
}
