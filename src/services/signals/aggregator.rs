//! Signal aggregation: vote list to decision, plus the LONG entry gate.

use super::snapshot::IndicatorSnapshot;
use crate::config::AggregationConfig;
use crate::types::{AggregationMode, Decision, Direction, GateCondition, TieBreak, Vote, WeightTable};

/// Outcome of reducing a vote list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregation {
    pub decision: Decision,
    pub long_votes: usize,
    pub short_votes: usize,
    /// Weighted score; only set in weighted mode.
    pub score: Option<f64>,
}

fn count(votes: &[Vote], direction: Direction) -> usize {
    votes.iter().filter(|v| v.vote == direction).count()
}

/// Reduces votes to a LONG/SHORT/NEUTRAL decision.
#[derive(Debug, Clone)]
pub struct Aggregator {
    mode: AggregationMode,
    weights: WeightTable,
    tie_break: TieBreak,
    threshold: f64,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(&AggregationConfig::default())
    }
}

impl Aggregator {
    pub fn new(config: &AggregationConfig) -> Self {
        Self {
            mode: config.mode,
            weights: config.weights.clone(),
            tie_break: config.tie_break,
            threshold: config.weighted_threshold,
        }
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Simple majority. Equal counts, including no votes at all, are NEUTRAL.
    pub fn majority(votes: &[Vote]) -> Decision {
        let long = count(votes, Direction::Long);
        let short = count(votes, Direction::Short);
        if long > short {
            Decision::Long
        } else if short > long {
            Decision::Short
        } else {
            Decision::Neutral
        }
    }

    /// Sum of weight * sign over the cast votes.
    pub fn weighted_score(&self, votes: &[Vote]) -> f64 {
        votes
            .iter()
            .map(|v| self.weights.weight(v.indicator) * v.vote.sign())
            .sum()
    }

    fn weighted_decision(&self, score: f64) -> Decision {
        if score > self.threshold {
            Decision::Long
        } else if score < -self.threshold {
            Decision::Short
        } else if score == 0.0 {
            self.tie_break.decision()
        } else {
            Decision::Neutral
        }
    }

    pub fn aggregate(&self, votes: &[Vote]) -> Aggregation {
        let long_votes = count(votes, Direction::Long);
        let short_votes = count(votes, Direction::Short);

        let (decision, score) = match self.mode {
            AggregationMode::Majority => (Self::majority(votes), None),
            AggregationMode::Weighted => {
                let score = self.weighted_score(votes);
                (self.weighted_decision(score), Some(score))
            }
        };

        Aggregation {
            decision,
            long_votes,
            short_votes,
            score,
        }
    }
}

/// Strong-LONG-consensus alert.
///
/// Fires when LONG votes outnumber SHORT votes, the LONG share of cast votes reaches
/// `min_long_ratio` and every required snapshot condition holds. A ratio of 1.0 with no
/// conditions means unanimity.
#[derive(Debug, Clone)]
pub struct EntryGate {
    min_long_ratio: f64,
    conditions: Vec<GateCondition>,
    rsi_oversold: f64,
}

impl Default for EntryGate {
    fn default() -> Self {
        Self::unanimous()
    }
}

impl EntryGate {
    pub fn new(min_long_ratio: f64, conditions: Vec<GateCondition>, rsi_oversold: f64) -> Self {
        Self {
            min_long_ratio,
            conditions,
            rsi_oversold,
        }
    }

    /// Every cast vote must be LONG.
    pub fn unanimous() -> Self {
        Self::new(1.0, Vec::new(), 30.0)
    }

    fn condition_holds(&self, condition: GateCondition, snap: &IndicatorSnapshot) -> bool {
        match condition {
            GateCondition::RsiOversold => snap.rsi.is_finite() && snap.rsi < self.rsi_oversold,
            GateCondition::PriceBelowEma => {
                snap.close.is_finite() && snap.ema.is_finite() && snap.close < snap.ema
            }
        }
    }

    pub fn fires(&self, votes: &[Vote], snap: &IndicatorSnapshot) -> bool {
        if votes.is_empty() {
            return false;
        }
        let long = count(votes, Direction::Long);
        // A LONG share at or below one half is not consensus, whatever the ratio.
        if long <= count(votes, Direction::Short) {
            return false;
        }
        let long_ratio = long as f64 / votes.len() as f64;
        long_ratio >= self.min_long_ratio
            && self
                .conditions
                .iter()
                .all(|c| self.condition_holds(*c, snap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndicatorName;

    fn votes(pairs: &[(IndicatorName, Direction)]) -> Vec<Vote> {
        pairs.iter().map(|(n, d)| Vote::new(*n, *d)).collect()
    }

    fn negate(votes: &[Vote]) -> Vec<Vote> {
        votes
            .iter()
            .map(|v| Vote::new(v.indicator, v.vote.opposite()))
            .collect()
    }

    fn weighted(weights: WeightTable, tie_break: TieBreak, threshold: f64) -> Aggregator {
        Aggregator::new(&AggregationConfig {
            mode: AggregationMode::Weighted,
            weights,
            weighted_threshold: threshold,
            tie_break,
            ..AggregationConfig::default()
        })
    }

    #[test]
    fn test_majority_basic() {
        use Direction::*;
        use IndicatorName::*;
        let v = votes(&[(Rsi, Long), (Ema, Short), (Adx, Long)]);
        assert_eq!(Aggregator::majority(&v), Decision::Long);
        assert_eq!(Aggregator::majority(&negate(&v)), Decision::Short);
        assert_eq!(Aggregator::majority(&[]), Decision::Neutral);
    }

    #[test]
    fn test_majority_tie_is_neutral() {
        use Direction::*;
        use IndicatorName::*;
        let v = votes(&[(Rsi, Long), (Ema, Short)]);
        assert_eq!(Aggregator::majority(&v), Decision::Neutral);
        assert_eq!(Aggregator::majority(&negate(&v)), Decision::Neutral);
    }

    #[test]
    fn test_majority_symmetry_all_combinations() {
        // Every LONG/SHORT/abstain assignment over four indicators.
        let names = [
            IndicatorName::Rsi,
            IndicatorName::Ema,
            IndicatorName::Cci,
            IndicatorName::Macd,
        ];
        for mask in 0..81u32 {
            let mut m = mask;
            let mut v = Vec::new();
            for name in names {
                match m % 3 {
                    0 => v.push(Vote::new(name, Direction::Long)),
                    1 => v.push(Vote::new(name, Direction::Short)),
                    _ => {}
                }
                m /= 3;
            }
            let decision = Aggregator::majority(&v);
            assert_eq!(Aggregator::majority(&negate(&v)), decision.negate());
        }
    }

    #[test]
    fn test_weighted_equal_weights_matches_majority() {
        use Direction::*;
        use IndicatorName::*;
        let agg = weighted(WeightTable::uniform(&IndicatorName::ALL), TieBreak::Neutral, 0.0);
        let cases = [
            votes(&[(Rsi, Long), (Ema, Short), (Adx, Long)]),
            votes(&[(Rsi, Short), (Ema, Short), (Macd, Long)]),
            votes(&[(Rsi, Long), (Ema, Short)]),
            vec![],
        ];
        for v in cases {
            assert_eq!(agg.aggregate(&v).decision, Aggregator::majority(&v));
        }
    }

    #[test]
    fn test_weighted_score_and_tie_break() {
        use Direction::*;
        use IndicatorName::*;
        let table = WeightTable::from_pairs([(Rsi, 2.0), (Ema, 1.0), (Macd, 1.0)]);

        let v = votes(&[(Rsi, Long), (Ema, Short), (Macd, Short)]);
        let neutral = weighted(table.clone(), TieBreak::Neutral, 0.0);
        let out = neutral.aggregate(&v);
        assert_eq!(out.score, Some(0.0));
        assert_eq!(out.decision, Decision::Neutral);

        let short = weighted(table.clone(), TieBreak::Short, 0.0);
        assert_eq!(short.aggregate(&v).decision, Decision::Short);

        let v = votes(&[(Rsi, Long), (Ema, Short)]);
        assert_eq!(neutral.aggregate(&v).decision, Decision::Long);
    }

    #[test]
    fn test_weighted_threshold_band() {
        use Direction::*;
        use IndicatorName::*;
        let table = WeightTable::from_pairs([(Rsi, 1.5), (Ema, 1.0)]);
        let agg = weighted(table, TieBreak::Short, 1.0);

        // 1.5 - 1.0 = 0.5 sits inside the band
        let out = agg.aggregate(&votes(&[(Rsi, Long), (Ema, Short)]));
        assert_eq!(out.decision, Decision::Neutral);

        let out = agg.aggregate(&votes(&[(Rsi, Long), (Ema, Long)]));
        assert_eq!(out.decision, Decision::Long);

        let out = agg.aggregate(&votes(&[(Rsi, Short)]));
        assert_eq!(out.decision, Decision::Short);
    }

    #[test]
    fn test_zero_weight_votes_are_counted_not_scored() {
        use Direction::*;
        use IndicatorName::*;
        let table = WeightTable::from_pairs([(Rsi, 0.0), (Ema, 1.0)]);
        let out = weighted(table, TieBreak::Neutral, 0.0)
            .aggregate(&votes(&[(Rsi, Long), (Ema, Short)]));
        assert_eq!(out.long_votes, 1);
        assert_eq!(out.short_votes, 1);
        assert_eq!(out.decision, Decision::Short);
    }

    #[test]
    fn test_unanimous_gate() {
        use Direction::*;
        use IndicatorName::*;
        let snap = IndicatorSnapshot::unavailable(100.0, 100.0);
        let gate = EntryGate::unanimous();
        assert!(gate.fires(&votes(&[(Rsi, Long), (Macd, Long)]), &snap));
        assert!(!gate.fires(&votes(&[(Rsi, Long), (Macd, Short)]), &snap));
        assert!(!gate.fires(&[], &snap));
    }

    #[test]
    fn test_ratio_gate_with_conditions() {
        let mut v: Vec<Vote> = IndicatorName::ALL[..9]
            .iter()
            .map(|n| Vote::new(*n, Direction::Long))
            .collect();
        v.push(Vote::new(IndicatorName::WilliamsR, Direction::Short));

        let gate = EntryGate::new(
            0.9,
            vec![GateCondition::RsiOversold, GateCondition::PriceBelowEma],
            30.0,
        );
        let mut snap = IndicatorSnapshot::unavailable(95.0, 96.0);
        snap.rsi = 25.0;
        snap.ema = 100.0;
        assert!(gate.fires(&v, &snap));

        snap.ema = 90.0;
        assert!(!gate.fires(&v, &snap));

        snap.ema = 100.0;
        snap.rsi = f64::NAN;
        assert!(!gate.fires(&v, &snap));

        v.push(Vote::new(IndicatorName::Obv, Direction::Short));
        snap.rsi = 25.0;
        assert!(!gate.fires(&v, &snap));
    }

    #[test]
    fn test_half_ratio_gate_needs_long_majority() {
        use Direction::*;
        use IndicatorName::*;
        let snap = IndicatorSnapshot::unavailable(100.0, 100.0);
        let gate = EntryGate::new(0.5, Vec::new(), 30.0);

        let tied = votes(&[(Rsi, Long), (Ema, Short)]);
        assert_eq!(Aggregator::majority(&tied), Decision::Neutral);
        assert!(!gate.fires(&tied, &snap));

        assert!(gate.fires(&votes(&[(Rsi, Long), (Ema, Short), (Macd, Long)]), &snap));
    }
}
