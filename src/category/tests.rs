//! Tests for the category index

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn meta(id: &str, market_cap: f64, categories: &[&str]) -> AssetMetadata {
        AssetMetadata {
            id: id.to_string(),
            name: id.to_uppercase(),
            market_cap,
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn groupings(entries: &[(&str, &[&str])]) -> CategoryGroupings {
        CategoryGroupings(
            entries
                .iter()
                .map(|(g, cats)| (g.to_string(), cats.iter().map(|c| c.to_string()).collect()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn universe() -> Vec<AssetMetadata> {
        vec![
            meta("bitcoin", 1.2e12, &["Cryptocurrency", "Proof of Work (PoW)"]),
            meta("ethereum", 4e11, &["Smart Contract Platform", "Layer 1 (L1)"]),
            meta("uniswap", 6e9, &["Decentralized Finance (DeFi)", "Governance"]),
            meta("dogecoin", 2e10, &["Meme", "Dog-Themed Coins"]),
            meta("tinycoin", 2e8, &["Meme"]),
        ]
    }

    #[test]
    fn test_membership_includes_tags_and_tier() {
        let g = groupings(&[("Category", &["Meme", "Decentralized Finance (DeFi)"])]);
        let index = CategoryIndex::build(
            &universe(),
            &g,
            &MarketCapTiers::default(),
            &UniverseFilter::default(),
        );

        assert_eq!(index.members("Meme"), &["dogecoin".to_string(), "tinycoin".to_string()]);
        assert_eq!(index.members(XL_MARKET_CAP), &["bitcoin".to_string(), "ethereum".to_string()]);
        assert_eq!(index.members(XS_MARKET_CAP), &["tinycoin".to_string()]);
        assert_eq!(index.tier_of("uniswap"), Some(MEDIUM_MARKET_CAP));
        // tags not named by any grouping are not indexed
        assert!(index.members("Governance").is_empty());
        assert_eq!(index.categories_of("dogecoin"), vec![LARGE_MARKET_CAP, "Meme"]);
    }

    #[test]
    fn test_assets_sorted_and_named() {
        let index = CategoryIndex::build(
            &universe(),
            &CategoryGroupings::default(),
            &MarketCapTiers::default(),
            &UniverseFilter::default(),
        );
        let ids: Vec<&str> = index.assets().iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["bitcoin", "dogecoin", "ethereum", "tinycoin", "uniswap"]);
        assert_eq!(index.display_name("bitcoin"), "BITCOIN");
        assert_eq!(index.display_name("unknown"), "unknown");
    }

    #[test]
    fn test_groupings_drop_unpopulated_categories() {
        let g = groupings(&[
            ("Category", &["Meme", "NFT", "Stablecoins"]),
            ("Ecosystem", &["Solana Ecosystem"]),
        ]);
        let index = CategoryIndex::build(
            &universe(),
            &g,
            &MarketCapTiers::default(),
            &UniverseFilter::default(),
        );

        assert_eq!(index.grouping("Category").unwrap(), &["Meme".to_string()]);
        assert_eq!(index.grouping("Ecosystem").unwrap().len(), 0);
        assert_eq!(index.empty_groupings(), vec!["Ecosystem"]);
    }

    #[test]
    fn test_filter_by_estimates_and_tiers() {
        let g = groupings(&[("Category", &["Meme", "Cryptocurrency"])]);
        let filter = UniverseFilter {
            estimated: Some(
                ["bitcoin", "dogecoin", "tinycoin", "uniswap"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            allowed_tiers: Some(
                [XL_MARKET_CAP, LARGE_MARKET_CAP]
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<BTreeSet<_>>(),
            ),
        };
        let index = CategoryIndex::build(&universe(), &g, &MarketCapTiers::default(), &filter);

        let ids: Vec<&str> = index.assets().iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["bitcoin", "dogecoin"]);
        assert!(!index.contains_asset("ethereum"));
        assert_eq!(index.members("Meme"), &["dogecoin".to_string()]);
        assert!(index.members(XS_MARKET_CAP).is_empty());
    }

    #[test]
    fn test_groupings_document_roundtrip() {
        let json = r#"{"Category": ["Meme", "NFT"], "Ecosystem": []}"#;
        let g: CategoryGroupings = serde_json::from_str(json).unwrap();
        assert_eq!(g.0.len(), 2);
        assert!(g.all_categories().contains("NFT"));
    }
}
