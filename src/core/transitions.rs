/// N-gram transition table — counting, probability intervals, and sampling.

use log::debug;
use rand::Rng;
use rustc_hash::FxHashMap;

use crate::core::markov::SlmError;

/// Sentinel token marking the start of a line. The tokenizer drops
/// whitespace, so it never collides with a corpus token.
pub const LINE_START: &str = "\n";

/// A half-open probability interval `[lo, hi)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lo <= value && value < self.hi
    }
}

/// Tokens that may follow a context, with their share of `[0, 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Continuation {
    pub tokens: Vec<String>,
    pub interval: Interval,
}

/// Observed counts: context → [(continuation, count)] in first-seen order.
type Counts = FxHashMap<Vec<String>, Vec<(Vec<String>, u32)>>;

/// Context window → weighted continuations.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    order: usize,
    entries: FxHashMap<Vec<String>, Vec<Continuation>>,
}

impl TransitionTable {
    /// Build a table from the first `train_percent`% of `tokens`.
    ///
    /// A [`LINE_START`] sentinel is prepended. Whenever a window begins with
    /// the sentinel, the rest of the window plus the following token is also
    /// recorded under the one-token sentinel context, so sampling can always
    /// start from a line boundary.
    pub fn build(
        tokens: &[String],
        order: usize,
        train_percent: f64,
    ) -> Result<TransitionTable, SlmError> {
        if order == 0 {
            return Err(SlmError::InvalidOrder);
        }
        if !(0.0..=100.0).contains(&train_percent) {
            return Err(SlmError::InvalidPercent(train_percent));
        }
        if tokens.len() < order {
            return Err(SlmError::CorpusTooSmall {
                len: tokens.len(),
                order,
            });
        }

        let mut seq: Vec<&str> = Vec::with_capacity(tokens.len() + 1);
        seq.push(LINE_START);
        seq.extend(tokens.iter().map(String::as_str));

        let train_till = (seq.len() as f64 * train_percent / 100.0) as usize;
        let mut counts = Counts::default();

        for i in order..train_till.min(seq.len()) {
            let window = &seq[i - order..i];
            let next = seq[i];

            // At order 1 this repeats the ordinary count below; doubling every
            // sentinel observation leaves the intervals unchanged.
            if window[0] == LINE_START {
                let mut rest = owned(&window[1..]);
                rest.push(next.to_string());
                add_transition(&mut counts, vec![LINE_START.to_string()], rest);
            }

            add_transition(&mut counts, owned(window), vec![next.to_string()]);
        }

        let entries: FxHashMap<_, _> = counts
            .into_iter()
            .map(|(context, observed)| (context, to_intervals(observed)))
            .collect();

        debug!(
            "built {}-gram table: {} contexts from {} of {} positions",
            order,
            entries.len(),
            train_till.saturating_sub(order),
            seq.len()
        );

        Ok(TransitionTable { order, entries })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of distinct contexts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of (context, continuation) pairs.
    pub fn transition_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn get(&self, context: &[String]) -> Option<&[Continuation]> {
        self.entries.get(context).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[String], &[Continuation])> {
        self.entries
            .iter()
            .map(|(context, options)| (context.as_slice(), options.as_slice()))
    }

    /// Draw a continuation for `context`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        context: &[String],
        rng: &mut R,
    ) -> Result<&[String], SlmError> {
        let options = self
            .get(context)
            .ok_or_else(|| SlmError::UnknownContext(describe(context)))?;
        let draw: f64 = rng.gen();
        // Rounding can leave the last bound a hair under 1.0.
        let chosen = options
            .iter()
            .find(|c| draw < c.interval.hi)
            .or_else(|| options.last())
            .ok_or_else(|| SlmError::UnknownContext(describe(context)))?;
        Ok(&chosen.tokens)
    }
}

/// Human-readable form of a context for error messages.
pub fn describe(context: &[String]) -> String {
    context
        .iter()
        .map(|tok| if tok == LINE_START { "<line start>" } else { tok.as_str() })
        .collect::<Vec<_>>()
        .join(" ")
}

fn owned(window: &[&str]) -> Vec<String> {
    window.iter().map(|s| s.to_string()).collect()
}

/// Add a transition to the count table, incrementing its count.
fn add_transition(counts: &mut Counts, context: Vec<String>, next: Vec<String>) {
    let entries = counts.entry(context).or_default();
    if let Some(entry) = entries.iter_mut().find(|(tok, _)| tok == &next) {
        entry.1 += 1;
    } else {
        entries.push((next, 1));
    }
}

/// Convert counts into contiguous intervals partitioning `[0, 1)`.
fn to_intervals(observed: Vec<(Vec<String>, u32)>) -> Vec<Continuation> {
    let total: u32 = observed.iter().map(|(_, count)| count).sum();
    let mut lo = 0.0;
    observed
        .into_iter()
        .map(|(tokens, count)| {
            let hi = lo + count as f64 / total as f64;
            let interval = Interval { lo, hi };
            lo = hi;
            Continuation { tokens, interval }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn continuation_intervals_follow_first_seen_order() {
        let tokens = toks(&["the", "cat", "sat", "the", "cat", "ran"]);
        let table = TransitionTable::build(&tokens, 2, 100.0).unwrap();

        let options = table.get(&toks(&["the", "cat"])).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].tokens, toks(&["sat"]));
        assert_eq!(options[0].interval, Interval { lo: 0.0, hi: 0.5 });
        assert_eq!(options[1].tokens, toks(&["ran"]));
        assert_eq!(options[1].interval, Interval { lo: 0.5, hi: 1.0 });
    }

    #[test]
    fn line_start_context_holds_full_window() {
        let tokens = toks(&["the", "cat", "sat", "the", "cat", "ran"]);
        let table = TransitionTable::build(&tokens, 2, 100.0).unwrap();

        let start = table.get(&[LINE_START.to_string()]).unwrap();
        assert_eq!(start.len(), 1);
        assert_eq!(start[0].tokens, toks(&["the", "cat"]));
        assert_eq!(start[0].interval.width(), 1.0);

        let first = table.get(&[LINE_START.to_string(), "the".to_string()]).unwrap();
        assert_eq!(first[0].tokens, toks(&["cat"]));
    }

    #[test]
    fn unigram_line_starts_keep_even_shares() {
        let tokens = toks(&["a", "b", LINE_START, "c", "d"]);
        let table = TransitionTable::build(&tokens, 1, 100.0).unwrap();

        let start = table.get(&[LINE_START.to_string()]).unwrap();
        assert_eq!(start.len(), 2);
        assert_eq!(start[0].tokens, toks(&["a"]));
        assert_eq!(start[1].tokens, toks(&["c"]));
        assert!((start[0].interval.width() - 0.5).abs() < 1e-12);
        assert!((start[1].interval.width() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn interval_widths_sum_to_one() {
        let text = "a b a c a b b c a a b c c a b a";
        let tokens: Vec<String> = text.split(' ').map(String::from).collect();
        for order in 1..=3 {
            let table = TransitionTable::build(&tokens, order, 100.0).unwrap();
            for (context, options) in table.iter() {
                let total: f64 = options.iter().map(|c| c.interval.width()).sum();
                assert!(
                    (total - 1.0).abs() < 1e-9,
                    "context {:?} sums to {}",
                    context,
                    total
                );
                for pair in options.windows(2) {
                    assert_eq!(pair[0].interval.hi, pair[1].interval.lo);
                }
            }
        }
    }

    #[test]
    fn corpus_smaller_than_order_is_error() {
        let tokens = toks(&["only", "two"]);
        assert!(matches!(
            TransitionTable::build(&tokens, 3, 100.0).unwrap_err(),
            SlmError::CorpusTooSmall { len: 2, order: 3 }
        ));
    }

    #[test]
    fn zero_order_is_error() {
        let tokens = toks(&["a", "b"]);
        assert!(matches!(
            TransitionTable::build(&tokens, 0, 100.0).unwrap_err(),
            SlmError::InvalidOrder
        ));
    }

    #[test]
    fn train_percent_limits_observed_windows() {
        // With the sentinel there are 9 positions; 50% trains on the first 4.
        let tokens = toks(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        let table = TransitionTable::build(&tokens, 1, 50.0).unwrap();
        assert!(table.get(&toks(&["a"])).is_some());
        assert!(table.get(&toks(&["b"])).is_some());
        assert!(table.get(&toks(&["c"])).is_none());
        assert!(table.get(&toks(&["g"])).is_none());
    }

    #[test]
    fn out_of_range_percent_is_error() {
        let tokens = toks(&["a", "b"]);
        assert!(matches!(
            TransitionTable::build(&tokens, 1, 120.0).unwrap_err(),
            SlmError::InvalidPercent(_)
        ));
    }

    #[test]
    fn sample_follows_draw() {
        let tokens = toks(&["x", "y", "x", "y", "x", "z"]);
        let table = TransitionTable::build(&tokens, 1, 100.0).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            let next = table.sample(&toks(&["x"]), &mut rng).unwrap();
            assert!(next == toks(&["y"]).as_slice() || next == toks(&["z"]).as_slice());
        }
    }

    #[test]
    fn sample_unknown_context_is_error() {
        let tokens = toks(&["x", "y"]);
        let table = TransitionTable::build(&tokens, 1, 100.0).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let err = table.sample(&toks(&["nope"]), &mut rng).unwrap_err();
        assert!(matches!(err, SlmError::UnknownContext(ctx) if ctx == "nope"));
    }
}
