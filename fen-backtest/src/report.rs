//! Run reporting: latency distributions, slippage analysis, and the
//! aggregate performance metrics.
//!
//! Spread capture is computed per fill from the recorded decision-time
//! and fill-time mids. Effective spread is what the quote earned
//! against the mid at decision time; realized spread marks the same
//! fill against the mid at fill time, so the difference between the
//! two is the adverse selection paid to faster flow.

use fen_core::core::types::Side;
use fen_core::quote::TRADING_SECONDS_PER_YEAR;
use std::fmt;

/// Sample collector for one latency measure.
#[derive(Debug, Clone, Default)]
pub struct LatencyDistribution {
    samples: Vec<i64>,
}

/// Summary statistics over a latency distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyStats {
    pub count: usize,
    pub mean_ns: f64,
    pub median_ns: f64,
    pub p99_ns: f64,
    pub min_ns: i64,
    pub max_ns: i64,
}

impl LatencyDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_sample(&mut self, nanos: i64) {
        self.samples.push(nanos);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[i64] {
        &self.samples
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn stats(&self) -> LatencyStats {
        if self.samples.is_empty() {
            return LatencyStats::default();
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: i64 = sorted.iter().sum();
        let p99_idx = ((count as f64 * 0.99) as usize).min(count - 1);

        LatencyStats {
            count,
            mean_ns: sum as f64 / count as f64,
            median_ns: sorted[count / 2] as f64,
            p99_ns: sorted[p99_idx] as f64,
            min_ns: sorted[0],
            max_ns: sorted[count - 1],
        }
    }
}

/// One recorded fill for slippage accounting.
#[derive(Debug, Clone, Copy)]
pub struct FillRecord {
    pub ts_ns: i64,
    pub side: Side,
    pub fill_price: f64,
    pub decision_mid: f64,
    pub fill_mid: f64,
    pub quantity: u64,
}

impl FillRecord {
    /// Signed capture against a reference mid, in bps: positive when
    /// the fill beat the mid (bought below / sold above it).
    fn capture_bps(&self, reference_mid: f64) -> f64 {
        if reference_mid <= 0.0 {
            return 0.0;
        }
        let edge = match self.side {
            Side::Buy => reference_mid - self.fill_price,
            Side::Sell => self.fill_price - reference_mid,
        };
        edge / reference_mid * 10_000.0
    }

    /// Effective spread: twice the capture against the decision mid.
    pub fn effective_spread_bps(&self) -> f64 {
        2.0 * self.capture_bps(self.decision_mid)
    }

    /// Realized spread: twice the capture against the fill-time mid.
    pub fn realized_spread_bps(&self) -> f64 {
        2.0 * self.capture_bps(self.fill_mid)
    }
}

/// Per-fill slippage aggregation.
#[derive(Debug, Clone, Default)]
pub struct SlippageAnalyzer {
    fills: Vec<FillRecord>,
}

/// Aggregated slippage view.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlippageReport {
    pub fills: usize,
    /// Mean signed capture vs. decision-time mid (bps).
    pub avg_capture_vs_decision_bps: f64,
    /// Mean signed capture vs. fill-time mid (bps).
    pub avg_capture_vs_fill_bps: f64,
    pub avg_effective_spread_bps: f64,
    pub avg_realized_spread_bps: f64,
}

impl SlippageAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_fill(&mut self, record: FillRecord) {
        self.fills.push(record);
    }

    pub fn fills(&self) -> &[FillRecord] {
        &self.fills
    }

    pub fn clear(&mut self) {
        self.fills.clear();
    }

    pub fn report(&self) -> SlippageReport {
        if self.fills.is_empty() {
            return SlippageReport::default();
        }
        let n = self.fills.len() as f64;
        let mut vs_decision = 0.0;
        let mut vs_fill = 0.0;
        let mut effective = 0.0;
        let mut realized = 0.0;
        for fill in &self.fills {
            vs_decision += fill.capture_bps(fill.decision_mid);
            vs_fill += fill.capture_bps(fill.fill_mid);
            effective += fill.effective_spread_bps();
            realized += fill.realized_spread_bps();
        }
        SlippageReport {
            fills: self.fills.len(),
            avg_capture_vs_decision_bps: vs_decision / n,
            avg_capture_vs_fill_bps: vs_fill / n,
            avg_effective_spread_bps: effective / n,
            avg_realized_spread_bps: realized / n,
        }
    }
}

/// Aggregate backtest results.
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub total_pnl: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub calmar_ratio: f64,

    pub fill_rate: f64,
    pub win_rate: f64,
    pub profit_factor: f64,

    pub volatility: f64,
    pub downside_deviation: f64,
    pub value_at_risk_95: f64,
    pub conditional_var_95: f64,

    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub avg_trade_pnl: f64,
    pub avg_win: f64,
    pub avg_loss: f64,

    pub quoted_spread_bps: f64,
    pub effective_spread_bps: f64,
    pub realized_spread_bps: f64,
    /// realized / quoted; below 1 is adverse selection paid.
    pub adverse_selection_ratio: f64,

    pub equity_curve: Vec<f64>,
    pub timestamps: Vec<i64>,
}

/// Inputs for metric computation, collected by the driver.
pub struct MetricInputs<'a> {
    pub pnl_history: &'a [f64],
    pub timestamps: &'a [i64],
    pub quoted_spreads_bps: &'a [f64],
    pub fills: &'a [FillRecord],
    pub orders_submitted: u64,
    pub initial_capital: f64,
    pub final_mid: f64,
}

impl PerformanceMetrics {
    pub fn compute(inputs: MetricInputs<'_>) -> Self {
        let mut metrics = PerformanceMetrics::default();
        let pnl = inputs.pnl_history;
        if pnl.is_empty() {
            return metrics;
        }

        metrics.total_pnl = *pnl.last().unwrap();

        // Per-step P&L deltas.
        let returns: Vec<f64> = pnl.windows(2).map(|w| w[1] - w[0]).collect();
        if !returns.is_empty() {
            let n = returns.len() as f64;
            let mean = returns.iter().sum::<f64>() / n;

            let mut sq_sum = 0.0;
            for r in &returns {
                sq_sum += (r - mean) * (r - mean);
            }
            metrics.volatility = (sq_sum / n).sqrt();

            let annualization = TRADING_SECONDS_PER_YEAR.sqrt();
            if metrics.volatility > 1e-10 {
                metrics.sharpe_ratio = mean / metrics.volatility * annualization;
            }

            let mut downside_sq = 0.0;
            let mut downside_count = 0usize;
            for r in &returns {
                if *r < 0.0 {
                    downside_sq += r * r;
                    downside_count += 1;
                }
            }
            if downside_count > 0 {
                metrics.downside_deviation = (downside_sq / downside_count as f64).sqrt();
                if metrics.downside_deviation > 1e-10 {
                    metrics.sortino_ratio = mean / metrics.downside_deviation * annualization;
                }
            }

            // 95% VaR / CVaR over step deltas.
            let mut sorted = returns.clone();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let var_idx = (sorted.len() as f64 * 0.05) as usize;
            metrics.value_at_risk_95 = -sorted[var_idx.min(sorted.len() - 1)];
            if var_idx > 0 {
                let tail_sum: f64 = sorted[..var_idx].iter().sum();
                metrics.conditional_var_95 = -tail_sum / var_idx as f64;
            }
        }

        // Max drawdown over the equity curve.
        let mut peak = pnl[0];
        let mut max_dd = 0.0f64;
        for &value in pnl {
            peak = peak.max(value);
            let dd = (peak - value) / (peak.abs() + 1e-10);
            max_dd = max_dd.max(dd);
        }
        metrics.max_drawdown = max_dd;
        if max_dd > 1e-10 {
            metrics.calmar_ratio = (metrics.total_pnl / inputs.initial_capital) / max_dd;
        }

        // Trade statistics, marked against the final mid.
        metrics.total_trades = inputs.fills.len() as u64;
        let mut gross_profit = 0.0;
        let mut gross_loss = 0.0;
        for fill in inputs.fills {
            let edge = match fill.side {
                Side::Buy => inputs.final_mid - fill.fill_price,
                Side::Sell => fill.fill_price - inputs.final_mid,
            };
            let trade_pnl = edge * fill.quantity as f64;
            if trade_pnl > 0.0 {
                metrics.winning_trades += 1;
                gross_profit += trade_pnl;
            } else {
                metrics.losing_trades += 1;
                gross_loss += trade_pnl.abs();
            }
        }
        if metrics.total_trades > 0 {
            metrics.win_rate = metrics.winning_trades as f64 / metrics.total_trades as f64;
            metrics.avg_trade_pnl = metrics.total_pnl / metrics.total_trades as f64;
        }
        if gross_loss > 1e-10 {
            metrics.profit_factor = gross_profit / gross_loss;
        }
        if metrics.winning_trades > 0 {
            metrics.avg_win = gross_profit / metrics.winning_trades as f64;
        }
        if metrics.losing_trades > 0 {
            metrics.avg_loss = gross_loss / metrics.losing_trades as f64;
        }
        if inputs.orders_submitted > 0 {
            metrics.fill_rate = metrics.total_trades as f64 / inputs.orders_submitted as f64;
        }

        // Spread analysis: quoted from the tape, effective/realized per
        // fill against the recorded mids.
        if !inputs.quoted_spreads_bps.is_empty() {
            metrics.quoted_spread_bps = inputs.quoted_spreads_bps.iter().sum::<f64>()
                / inputs.quoted_spreads_bps.len() as f64;
        }
        if !inputs.fills.is_empty() {
            let n = inputs.fills.len() as f64;
            metrics.effective_spread_bps = inputs
                .fills
                .iter()
                .map(|f| f.effective_spread_bps())
                .sum::<f64>()
                / n;
            metrics.realized_spread_bps = inputs
                .fills
                .iter()
                .map(|f| f.realized_spread_bps())
                .sum::<f64>()
                / n;
        }
        if metrics.quoted_spread_bps > 1e-10 {
            metrics.adverse_selection_ratio =
                metrics.realized_spread_bps / metrics.quoted_spread_bps;
        }

        metrics.equity_curve = pnl.to_vec();
        metrics.timestamps = inputs.timestamps.to_vec();
        metrics
    }
}

impl fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "total_pnl:            {:>12.2}", self.total_pnl)?;
        writeln!(f, "sharpe_ratio:         {:>12.3}", self.sharpe_ratio)?;
        writeln!(f, "sortino_ratio:        {:>12.3}", self.sortino_ratio)?;
        writeln!(f, "max_drawdown:         {:>11.2}%", self.max_drawdown * 100.0)?;
        writeln!(f, "calmar_ratio:         {:>12.3}", self.calmar_ratio)?;
        writeln!(f, "fill_rate:            {:>11.1}%", self.fill_rate * 100.0)?;
        writeln!(f, "win_rate:             {:>11.1}%", self.win_rate * 100.0)?;
        writeln!(f, "profit_factor:        {:>12.2}", self.profit_factor)?;
        writeln!(f, "total_trades:         {:>12}", self.total_trades)?;
        writeln!(f, "quoted_spread_bps:    {:>12.2}", self.quoted_spread_bps)?;
        writeln!(f, "effective_spread_bps: {:>12.2}", self.effective_spread_bps)?;
        writeln!(f, "realized_spread_bps:  {:>12.2}", self.realized_spread_bps)?;
        write!(
            f,
            "adverse_selection:    {:>12.4}",
            self.adverse_selection_ratio
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_stats() {
        let mut dist = LatencyDistribution::new();
        for v in [100, 200, 300, 400, 500] {
            dist.add_sample(v);
        }
        let stats = dist.stats();
        assert_eq!(stats.count, 5);
        assert_eq!(stats.mean_ns, 300.0);
        assert_eq!(stats.median_ns, 300.0);
        assert_eq!(stats.min_ns, 100);
        assert_eq!(stats.max_ns, 500);
    }

    #[test]
    fn test_empty_distribution() {
        let dist = LatencyDistribution::new();
        assert_eq!(dist.stats(), LatencyStats::default());
    }

    #[test]
    fn test_fill_record_spreads() {
        // Bought a dime under the decision mid; the mid then dropped a
        // nickel by fill time.
        let fill = FillRecord {
            ts_ns: 0,
            side: Side::Buy,
            fill_price: 99.90,
            decision_mid: 100.00,
            fill_mid: 99.95,
            quantity: 100,
        };
        // Effective: 2·(100.00-99.90)/100.00 = 20 bps.
        assert!((fill.effective_spread_bps() - 20.0).abs() < 1e-9);
        // Realized: 2·(99.95-99.90)/99.95 ≈ 10 bps.
        assert!((fill.realized_spread_bps() - 2.0 * 0.05 / 99.95 * 10_000.0).abs() < 1e-9);
        // Realized < effective: adverse selection was paid.
        assert!(fill.realized_spread_bps() < fill.effective_spread_bps());
    }

    #[test]
    fn test_slippage_report_averages() {
        let mut analyzer = SlippageAnalyzer::new();
        analyzer.add_fill(FillRecord {
            ts_ns: 0,
            side: Side::Buy,
            fill_price: 99.90,
            decision_mid: 100.00,
            fill_mid: 100.00,
            quantity: 100,
        });
        analyzer.add_fill(FillRecord {
            ts_ns: 1,
            side: Side::Sell,
            fill_price: 100.10,
            decision_mid: 100.00,
            fill_mid: 100.00,
            quantity: 100,
        });
        let report = analyzer.report();
        assert_eq!(report.fills, 2);
        // Both fills captured 10 bps against both mids.
        assert!((report.avg_capture_vs_decision_bps - 10.0).abs() < 1e-9);
        assert!((report.avg_effective_spread_bps - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_monotone_equity() {
        let pnl: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let timestamps: Vec<i64> = (0..100).collect();
        let metrics = PerformanceMetrics::compute(MetricInputs {
            pnl_history: &pnl,
            timestamps: &timestamps,
            quoted_spreads_bps: &[2.0; 100],
            fills: &[],
            orders_submitted: 0,
            initial_capital: 100_000.0,
            final_mid: 100.0,
        });

        assert_eq!(metrics.total_pnl, 99.0);
        // Strictly rising curve: zero volatility in deltas, no drawdown.
        assert_eq!(metrics.max_drawdown, 0.0);
        assert_eq!(metrics.volatility, 0.0);
        assert_eq!(metrics.quoted_spread_bps, 2.0);
    }

    #[test]
    fn test_metrics_drawdown() {
        let pnl = vec![0.0, 100.0, 50.0, 120.0];
        let metrics = PerformanceMetrics::compute(MetricInputs {
            pnl_history: &pnl,
            timestamps: &[0, 1, 2, 3],
            quoted_spreads_bps: &[],
            fills: &[],
            orders_submitted: 0,
            initial_capital: 100_000.0,
            final_mid: 100.0,
        });
        // Peak 100 → trough 50.
        assert!((metrics.max_drawdown - 50.0 / 100.0).abs() < 1e-6);
        assert!(metrics.total_pnl == 120.0);
    }

    #[test]
    fn test_fill_rate_and_win_rate() {
        let fills = vec![
            FillRecord {
                ts_ns: 0,
                side: Side::Buy,
                fill_price: 99.0, // final mid 100: winner
                decision_mid: 100.0,
                fill_mid: 100.0,
                quantity: 10,
            },
            FillRecord {
                ts_ns: 1,
                side: Side::Sell,
                fill_price: 99.0, // sold under the final mid: loser
                decision_mid: 100.0,
                fill_mid: 100.0,
                quantity: 10,
            },
        ];
        let metrics = PerformanceMetrics::compute(MetricInputs {
            pnl_history: &[0.0, 10.0],
            timestamps: &[0, 1],
            quoted_spreads_bps: &[2.0],
            fills: &fills,
            orders_submitted: 4,
            initial_capital: 100_000.0,
            final_mid: 100.0,
        });
        assert_eq!(metrics.total_trades, 2);
        assert_eq!(metrics.winning_trades, 1);
        assert_eq!(metrics.losing_trades, 1);
        assert_eq!(metrics.fill_rate, 0.5);
        assert_eq!(metrics.win_rate, 0.5);
    }
}
