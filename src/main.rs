//! Crypto Portfolio Optimiser
//!
//! Command-line front end: load data, build a market snapshot and solve for
//! a constrained allocation.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use crypto_portfolio::{
    config::{Config, GroupingMode},
    data,
    portfolio::{AllocationRequest, PortfolioOptimizer},
    profile::{InvestorProfile, MarketCapSelection},
    snapshot::{MarketSnapshot, Selection},
    validation::{validate_bounds, validate_category_bounds},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "crypto-portfolio")]
#[command(about = "Constrained return-maximizing crypto portfolio allocation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve for an allocation
    Solve {
        /// Maximum number of holdings
        #[arg(short, long)]
        n_max: Option<usize>,
        /// Variance ceiling for the portfolio
        #[arg(short, long)]
        risk_budget: Option<f64>,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Show the active universe, dropped assets and groupings
    Universe {
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Check the configured bounds merged with the profile defaults
    Validate {
        #[command(flatten)]
        selection: SelectionArgs,
    },
}

#[derive(clap::Args)]
struct SelectionArgs {
    /// Investor profile preset
    #[arg(short, long, value_enum)]
    profile: Option<ProfileArg>,
    /// Market-cap tiers to admit
    #[arg(short, long, value_enum)]
    market_caps: Option<MarketCapArg>,
    /// Groupings document to use
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileArg {
    SelfDirected,
    Conservative,
    Adventurous,
    Degen,
}

impl From<ProfileArg> for InvestorProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::SelfDirected => InvestorProfile::SelfDirected,
            ProfileArg::Conservative => InvestorProfile::Conservative,
            ProfileArg::Adventurous => InvestorProfile::Adventurous,
            ProfileArg::Degen => InvestorProfile::Degen,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum MarketCapArg {
    LargeOnly,
    MediumAndUp,
    SmallAndUp,
    Any,
}

impl From<MarketCapArg> for MarketCapSelection {
    fn from(arg: MarketCapArg) -> Self {
        match arg {
            MarketCapArg::LargeOnly => MarketCapSelection::LargeOnly,
            MarketCapArg::MediumAndUp => MarketCapSelection::MediumAndUp,
            MarketCapArg::SmallAndUp => MarketCapSelection::SmallAndUp,
            MarketCapArg::Any => MarketCapSelection::Any,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Simple,
    Full,
}

impl From<ModeArg> for GroupingMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Simple => GroupingMode::Simple,
            ModeArg::Full => GroupingMode::Full,
        }
    }
}

impl SelectionArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(profile) = self.profile {
            config.selection.profile = profile.into();
        }
        if let Some(market_caps) = self.market_caps {
            config.selection.market_caps = market_caps.into();
        }
        if let Some(mode) = self.mode {
            config.selection.mode = mode.into();
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config))?;

    match cli.command {
        Commands::Solve {
            n_max,
            risk_budget,
            selection,
        } => {
            selection.apply(&mut config);
            if let Some(n) = n_max {
                config.solver.n_max_assets = n;
            }
            if risk_budget.is_some() {
                config.solver.risk_budget = risk_budget;
            }
            solve(&config)
        }
        Commands::Universe { selection } => {
            selection.apply(&mut config);
            show_universe(&config)
        }
        Commands::Validate { selection } => {
            selection.apply(&mut config);
            validate(&config)
        }
    }
}

fn load_snapshot(config: &Config, selection: &Selection) -> anyhow::Result<MarketSnapshot> {
    let prices = data::load_prices(&config.data.prices())?;
    let metadata = data::load_metadata(&config.data.metadata())?;
    let groupings = data::load_groupings(&selection.groupings_path)?;

    Ok(MarketSnapshot::build(
        &prices,
        &metadata,
        &groupings,
        &config.market_cap,
        &config.estimator,
        selection,
    )?)
}

fn solve(config: &Config) -> anyhow::Result<()> {
    let selection = config.selection();
    let snapshot = load_snapshot(config, &selection)?;

    let request = AllocationRequest::from_snapshot(&snapshot)
        .with_overrides(
            &config.selection.asset_bounds,
            &config.selection.category_bounds,
        )
        .with_n_max_assets(config.solver.n_max_assets)
        .with_risk_budget(config.solver.risk_budget()?);

    let optimizer = PortfolioOptimizer::new(config.solver.settings());
    let portfolio = optimizer.optimize(&snapshot, &request)?;

    println!(
        "\nOptimal allocation ({} of {} assets, {} solve):\n",
        portfolio.allocation.len(),
        snapshot.assets().len(),
        portfolio.strategy
    );
    println!("{:<32} {:<20} {:>8}", "Asset", "Tier", "Weight");
    println!("{}", "-".repeat(62));

    for (asset, weight) in portfolio.allocation.weights() {
        let index = snapshot.index();
        println!(
            "{:<32} {:<20} {:>7.1}%",
            index.display_name(&asset),
            index.tier_of(&asset).unwrap_or("-"),
            weight * 100.0
        );
    }

    println!("\nExpected return: {:.4}", portfolio.expected_return);
    println!("Volatility:      {:.4}", portfolio.volatility);
    println!("Effective N:     {:.2}", portfolio.effective_n);

    Ok(())
}

fn show_universe(config: &Config) -> anyhow::Result<()> {
    let selection = config.selection();
    let snapshot = load_snapshot(config, &selection)?;
    let index = snapshot.index();
    let estimates = snapshot.estimates();

    println!("\nActive universe ({} assets):\n", snapshot.assets().len());
    println!("{:<32} {:<20} {:>12}", "Asset", "Tier", "Exp. return");
    println!("{}", "-".repeat(66));
    for (asset, mu) in snapshot.assets().iter().zip(snapshot.mu()) {
        println!(
            "{:<32} {:<20} {:>12.4}",
            index.display_name(asset),
            index.tier_of(asset).unwrap_or("-"),
            mu
        );
    }

    if !estimates.dropped().is_empty() {
        println!("\nDropped ({}):", estimates.dropped().len());
        for dropped in estimates.dropped() {
            println!("  {:<30} {}", dropped.asset, dropped.reason);
        }
    }

    println!("\nGroupings:");
    for (grouping, categories) in index.groupings() {
        if categories.is_empty() {
            println!("  {} (no active categories, unconstrained)", grouping);
            continue;
        }
        println!("  {}:", grouping);
        for category in categories {
            println!("    {:<40} {:>4} assets", category, index.members(category).len());
        }
    }

    Ok(())
}

fn validate(config: &Config) -> anyhow::Result<()> {
    validate_bounds(&config.selection.asset_bounds).context("asset bounds")?;
    validate_category_bounds(&config.selection.category_bounds).context("category bounds")?;

    let selection = config.selection();
    let snapshot = load_snapshot(config, &selection)?;
    let request = AllocationRequest::from_snapshot(&snapshot).with_overrides(
        &config.selection.asset_bounds,
        &config.selection.category_bounds,
    );
    request
        .validate()
        .with_context(|| format!("bounds under the {:?} profile", selection.profile))?;

    println!(
        "Bounds OK: {} asset bounds, {} grouping(s) of category bounds",
        request.asset_bounds.len(),
        request.category_bounds.len()
    );
    Ok(())
}
