//! End-to-end tests from raw documents to a truncated allocation

#[cfg(test)]
mod tests {
    use crate::category::MarketCapTiers;
    use crate::data::{read_groupings, read_metadata, read_prices};
    use crate::estimator::{EstimatorSettings, PriceTable};
    use crate::portfolio::{AllocationRequest, PortfolioOptimizer};
    use crate::profile::{InvestorProfile, MarketCapSelection};
    use crate::snapshot::{MarketSnapshot, Selection, SnapshotCache};
    use crate::types::{AssetBounds, CategoryBounds, RiskBudget, WeightBound};
    use chrono::{Duration, NaiveDate};
    use std::fmt::Write;
    use std::path::PathBuf;

    const PERIODS: i64 = 60;

    /// A trends up, B trends up faster with more noise, C is mostly missing,
    /// D is a flat-ish stablecoin.
    fn prices_csv() -> String {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut csv = String::from("date,coin,prices\n");
        for t in 0..PERIODS {
            let date = start + Duration::days(t);
            let tf = t as f64;
            let a = 100.0 + 0.5 * tf + 2.0 * ((t % 5) as f64);
            let b = 50.0 + 0.8 * tf + 6.0 * ((t % 7) as f64);
            let d = 1.0 + 0.001 * ((t % 3) as f64);
            writeln!(csv, "{},alpha,{}", date, a).unwrap();
            writeln!(csv, "{},beta,{}", date, b).unwrap();
            if t % 12 == 0 {
                writeln!(csv, "{},gamma,{}", date, 10.0 + tf).unwrap();
            } else {
                writeln!(csv, "{},gamma,", date).unwrap();
            }
            writeln!(csv, "{},delta,{}", date, d).unwrap();
        }
        csv
    }

    fn metadata_csv() -> &'static str {
        r#"id,name,market_caps,categories
alpha,Alpha,8e10,"['Smart Contract Platform']"
beta,Beta,3e9,"['Meme', 'Decentralized Finance (DeFi)']"
gamma,Gamma,1e10,"['Meme']"
delta,Delta,1.2e11,"['Stablecoins']"
"#
    }

    fn groupings_json() -> &'static str {
        r#"{
  "Category": ["Meme", "Decentralized Finance (DeFi)", "Stablecoins", "Smart Contract Platform", "NFT"],
  "Ecosystem": ["Solana Ecosystem"]
}"#
    }

    fn table() -> PriceTable {
        let rows = read_prices(prices_csv().as_bytes(), "prices.csv").unwrap();
        PriceTable::from_long(rows).unwrap()
    }

    fn selection(market_caps: MarketCapSelection, profile: InvestorProfile) -> Selection {
        Selection {
            groupings_path: PathBuf::from("category_groupings.json"),
            market_caps,
            profile,
        }
    }

    fn default_selection() -> Selection {
        selection(MarketCapSelection::Any, InvestorProfile::SelfDirected)
    }

    fn build(selection: &Selection) -> crate::Result<MarketSnapshot> {
        let metadata = read_metadata(metadata_csv().as_bytes(), "meta.csv")?;
        let groupings = read_groupings(groupings_json().as_bytes(), "groupings.json")?;
        MarketSnapshot::build(
            &table(),
            &metadata,
            &groupings,
            &MarketCapTiers::default(),
            &EstimatorSettings::default(),
            selection,
        )
    }

    #[test]
    fn test_sparse_asset_dropped_from_universe() {
        let snapshot = build(&default_selection()).unwrap();
        // gamma has 55 of 60 prices missing
        assert_eq!(snapshot.assets(), &["alpha", "beta", "delta"]);
        assert_eq!(snapshot.estimates().dropped().len(), 1);
        assert_eq!(snapshot.estimates().dropped()[0].asset, "gamma");
        assert!(snapshot.index().members("Meme").iter().all(|a| a != "gamma"));
        assert_eq!(snapshot.index().empty_groupings(), vec!["Ecosystem"]);
    }

    #[test]
    fn test_end_to_end_allocation() {
        let snapshot = build(&default_selection()).unwrap();
        let request = AllocationRequest::from_snapshot(&snapshot).with_n_max_assets(3);
        let portfolio = PortfolioOptimizer::default()
            .optimize(&snapshot, &request)
            .unwrap();

        let total: f64 = portfolio.continuous.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(portfolio.continuous.iter().all(|(_, w)| *w >= -1e-6));
        assert!(portfolio.continuous.iter().all(|(_, w)| *w <= 1.0 - 0.5 / 3.0 + 1e-6));

        assert!(!portfolio.allocation.is_empty());
        assert!(portfolio.allocation.len() <= 3);
        assert!((portfolio.allocation.total_weight() - 1.0).abs() < 1e-9);
        assert_eq!(portfolio.allocation.truncate(3), portfolio.allocation);
    }

    #[test]
    fn test_user_bounds_respected() {
        let snapshot = build(&default_selection()).unwrap();
        let mut assets = AssetBounds::new();
        assets.insert("delta".into(), WeightBound::new(0.2, 0.3));
        let mut cats = CategoryBounds::new();
        cats.entry("Category".to_string())
            .or_default()
            .insert("Meme".to_string(), WeightBound::new(0.0, 0.25));
        let request = AllocationRequest::from_snapshot(&snapshot).with_overrides(&assets, &cats);

        let portfolio = PortfolioOptimizer::default()
            .optimize(&snapshot, &request)
            .unwrap();
        let weight = |asset: &str| {
            portfolio
                .continuous
                .iter()
                .find(|(a, _)| a == asset)
                .map(|(_, w)| *w)
                .unwrap()
        };
        assert!(weight("delta") >= 0.2 - 1e-6 && weight("delta") <= 0.3 + 1e-6);
        assert!(weight("beta") <= 0.25 + 1e-6);
    }

    #[test]
    fn test_large_caps_only_excludes_small_assets() {
        let sel = selection(MarketCapSelection::LargeOnly, InvestorProfile::SelfDirected);
        let snapshot = build(&sel).unwrap();
        // beta is a small cap
        assert_eq!(snapshot.assets(), &["alpha", "delta"]);
        assert_eq!(snapshot.sigma().len(), 2);
    }

    #[test]
    fn test_impossible_risk_budget_is_infeasible() {
        let snapshot = build(&default_selection()).unwrap();
        // far below the variance of any fully invested mix
        let request = AllocationRequest::from_snapshot(&snapshot)
            .with_risk_budget(Some(RiskBudget::new(1e-9).unwrap()));
        let result = PortfolioOptimizer::default().optimize(&snapshot, &request);
        assert!(matches!(result, Err(crate::Error::Infeasible)));
    }

    #[test]
    fn test_cache_serves_same_snapshot_per_selection() {
        let cache = SnapshotCache::new();
        let sel = selection(MarketCapSelection::Any, InvestorProfile::Adventurous);
        let first = cache.get_or_build(sel.key(), || build(&sel)).unwrap();
        let second = cache.get_or_build(sel.key(), || build(&sel)).unwrap();
        assert!(std::sync::Arc::ptr_eq(&first, &second));
    }
}
