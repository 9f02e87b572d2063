//! Illustrative market projections.
//!
//! Everything here is generated from a seeded RNG over a synthetic history;
//! the numbers are placeholders for charts and prompts, not a statistical model.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const HISTORY_MONTHS: usize = 24;
const SALES_MONTHS: usize = 12;
const GROWTH_PERIODS: usize = 36;
const PRICE_MONTHS: usize = 12;

const STRATEGY_TYPES: &[&str] = &[
    "Price Reduction",
    "Product Innovation",
    "Market Expansion",
    "Partnership Formation",
    "Marketing Campaign",
    "Supply Chain Optimization",
];
const TIMELINES: &[&str] = &["Immediate", "3 months", "6 months", "12 months"];
const IMPACTS: &[&str] = &["Low", "Medium", "High"];
const RESPONSES: &[&str] = &[
    "Monitor closely and prepare counter-strategy",
    "Accelerate our own innovation pipeline",
    "Strengthen customer relationships",
    "Consider strategic partnerships",
    "Optimize pricing strategy",
    "Enhance marketing efforts",
];
const SEASONS: &[&str] = &["Q1 (Jan-Mar)", "Q2 (Apr-Jun)", "Q3 (Jul-Sep)", "Q4 (Oct-Dec)"];
const DEMAND_TRENDS: &[&str] = &["Increasing", "Stable", "Decreasing"];
const PLACEHOLDER_COMPETITORS: &[&str] = &["Competitor A", "Competitor B", "Competitor C"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesPoint {
    pub month: String,
    pub predicted_sales: u64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthPoint {
    pub period: String,
    pub predicted_growth: f64,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPrediction {
    pub strategy: String,
    pub probability: f64,
    pub timeline: String,
    pub impact: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Classify by mean strategy probability.
    pub fn from_mean_probability(p: f64) -> Self {
        if p > 0.7 {
            Self::High
        } else if p > 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorOutlook {
    pub competitor: String,
    pub predicted_strategies: Vec<StrategyPrediction>,
    pub risk_level: RiskLevel,
    pub recommended_response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub month: String,
    pub predicted_price: f64,
    /// Percent change against the base price.
    pub price_change: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalDemand {
    pub season: String,
    pub demand_level: f64,
    pub trend: String,
    pub recommendation: String,
}

/// All projections for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub subject: String,
    pub generated_at: DateTime<Utc>,
    pub sales_forecast: Vec<SalesPoint>,
    pub market_growth: Vec<GrowthPoint>,
    pub competitor_strategies: Vec<CompetitorOutlook>,
    pub price_trends: Vec<PricePoint>,
    pub seasonal_analysis: Vec<SeasonalDemand>,
}

/// Seeded generator; the same seed and inputs give the same bundle.
pub struct Forecaster {
    seed: u64,
}

impl Forecaster {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn generate(
        &self,
        subject: &str,
        competitors: &[String],
        now: DateTime<Utc>,
    ) -> ForecastBundle {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let competitors: Vec<String> = if competitors.is_empty() {
            PLACEHOLDER_COMPETITORS.iter().map(|s| s.to_string()).collect()
        } else {
            competitors.to_vec()
        };

        ForecastBundle {
            subject: subject.to_string(),
            generated_at: now,
            sales_forecast: sales_forecast(&mut rng, now),
            market_growth: market_growth(&mut rng, now),
            competitor_strategies: competitor_strategies(&mut rng, &competitors),
            price_trends: price_trends(&mut rng, now),
            seasonal_analysis: seasonal_analysis(&mut rng),
        }
    }
}

fn month_label(now: DateTime<Utc>, months_ahead: usize) -> String {
    (now + Duration::days(30 * months_ahead as i64))
        .format("%Y-%m")
        .to_string()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Least-squares slope of `ys` against their indices.
pub(crate) fn linear_slope(ys: &[f64]) -> f64 {
    let n = ys.len() as f64;
    if ys.len() < 2 {
        return 0.0;
    }
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

fn sales_forecast(rng: &mut StdRng, now: DateTime<Utc>) -> Vec<SalesPoint> {
    let history: Vec<f64> = (0..HISTORY_MONTHS)
        .map(|_| rng.gen_range(1000..=5000) as f64)
        .collect();
    let mean = history.iter().sum::<f64>() / history.len() as f64;
    let slope = linear_slope(&history);

    (1..=SALES_MONTHS)
        .map(|i| {
            let x = (history.len() + i) as f64;
            let predicted = mean + slope * x + rng.gen_range(-200.0..200.0);
            SalesPoint {
                month: month_label(now, i),
                predicted_sales: predicted.max(0.0) as u64,
                confidence: round2(rng.gen_range(0.7..0.95)),
            }
        })
        .collect()
}

fn market_growth(rng: &mut StdRng, now: DateTime<Utc>) -> Vec<GrowthPoint> {
    (0..GROWTH_PERIODS)
        .map(|i| {
            let seasonal = 0.02 * (2.0 * std::f64::consts::PI * i as f64 / 12.0).sin();
            let noise = rng.gen_range(-0.01..0.01);
            GrowthPoint {
                period: format!("Period {}", i + 1),
                predicted_growth: (0.05 + seasonal + noise).clamp(-0.1, 0.2),
                date: month_label(now, i),
            }
        })
        .collect()
}

fn competitor_strategies(rng: &mut StdRng, competitors: &[String]) -> Vec<CompetitorOutlook> {
    competitors
        .iter()
        .map(|competitor| {
            let count = rng.gen_range(2..=4);
            let chosen: Vec<&str> = STRATEGY_TYPES
                .choose_multiple(rng, count)
                .copied()
                .collect();

            let predicted_strategies: Vec<StrategyPrediction> = chosen
                .into_iter()
                .map(|strategy| StrategyPrediction {
                    strategy: strategy.to_string(),
                    probability: round2(rng.gen_range(0.3..0.9)),
                    timeline: pick(rng, TIMELINES),
                    impact: pick(rng, IMPACTS),
                })
                .collect();

            let mean = predicted_strategies.iter().map(|s| s.probability).sum::<f64>()
                / predicted_strategies.len() as f64;

            CompetitorOutlook {
                competitor: competitor.clone(),
                predicted_strategies,
                risk_level: RiskLevel::from_mean_probability(mean),
                recommended_response: pick(rng, RESPONSES),
            }
        })
        .collect()
}

fn price_trends(rng: &mut StdRng, now: DateTime<Utc>) -> Vec<PricePoint> {
    let base = rng.gen_range(100.0..150.0);
    (0..PRICE_MONTHS)
        .map(|i| {
            let inflation = 0.002 * i as f64;
            let market = rng.gen_range(-0.01..0.01);
            let seasonal = 0.005 * (2.0 * std::f64::consts::PI * i as f64 / 12.0).sin();
            let change = inflation + market + seasonal;
            PricePoint {
                month: month_label(now, i),
                predicted_price: round2((base * (1.0 + change)).max(50.0)),
                price_change: round2(change * 100.0),
                confidence: round2(rng.gen_range(0.6..0.9)),
            }
        })
        .collect()
}

/// Advice for a quarter's relative demand level.
pub fn seasonal_recommendation(demand_level: f64) -> &'static str {
    if demand_level > 1.1 {
        "Increase inventory and marketing efforts"
    } else if demand_level > 0.9 {
        "Maintain current strategy"
    } else {
        "Consider promotional activities to boost demand"
    }
}

fn seasonal_analysis(rng: &mut StdRng) -> Vec<SeasonalDemand> {
    SEASONS
        .iter()
        .enumerate()
        .map(|(i, season)| {
            let base = rng.gen_range(0.8..1.2);
            let factor = 1.0 + 0.3 * (2.0 * std::f64::consts::PI * i as f64 / 4.0).sin();
            let demand_level = round2(base * factor);
            SeasonalDemand {
                season: season.to_string(),
                demand_level,
                trend: pick(rng, DEMAND_TRENDS),
                recommendation: seasonal_recommendation(demand_level).to_string(),
            }
        })
        .collect()
}

fn pick(rng: &mut StdRng, options: &[&str]) -> String {
    options.choose(rng).copied().unwrap_or_default().to_string()
}
