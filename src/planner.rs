//! Greedy chunk planning.
//!
//! Packs an ordered run of paragraph-sized [`TextUnit`]s into [`Chunk`]s that
//! fit a downstream service's input budget. Units are never split: a unit that
//! is larger than the whole budget travels alone in its own chunk.
//!
//! The packing is a single pass with no backtracking, so identical input
//! always yields identical chunk boundaries. Translation cost estimates and
//! cached synthesis output both depend on that.

use crate::error::{BookcastError, Result};
use crate::tokens;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Share of the theoretical input limit actually handed to a model.
pub const BUDGET_SAFETY_FACTOR: f64 = 0.8;

/// An indivisible span of source text with a precomputed size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    pub id: usize,
    pub text: String,
    pub size: usize,
}

impl TextUnit {
    pub fn new(id: usize, text: impl Into<String>, size: usize) -> Self {
        Self {
            id,
            text: text.into(),
            size,
        }
    }

    /// Build a unit whose size is computed with `measure`.
    pub fn measured(id: usize, text: impl Into<String>, measure: SizeMeasure) -> Self {
        let text = text.into();
        let size = measure.measure(&text);
        Self { id, text, size }
    }
}

/// How a unit's size is counted. Budget and units must use the same measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeMeasure {
    Chars,
    Tokens,
}

impl SizeMeasure {
    pub fn measure(&self, text: &str) -> usize {
        match self {
            SizeMeasure::Chars => text.chars().count(),
            SizeMeasure::Tokens => tokens::estimate_tokens(text),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeMeasure::Chars => "chars",
            SizeMeasure::Tokens => "tokens",
        }
    }
}

impl std::str::FromStr for SizeMeasure {
    type Err = BookcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "chars" | "characters" => Ok(SizeMeasure::Chars),
            "tokens" => Ok(SizeMeasure::Tokens),
            other => Err(BookcastError::invalid_config(format!(
                "unknown size measure '{}', expected 'chars' or 'tokens'",
                other
            ))),
        }
    }
}

/// Maximum size of one chunk. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ChunkBudget(NonZeroUsize);

impl ChunkBudget {
    pub fn new(max: i64) -> Result<Self> {
        usize::try_from(max)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Self)
            .ok_or_else(|| {
                BookcastError::invalid_config(format!("chunk budget must be positive, got {}", max))
            })
    }

    /// Input budget for a model whose output is `ratio` times its input,
    /// kept at 80% of the theoretical maximum.
    pub fn from_model(max_output_tokens: u64, output_input_ratio: f64) -> Result<Self> {
        if !(output_input_ratio.is_finite() && output_input_ratio > 0.0) {
            return Err(BookcastError::invalid_config(format!(
                "output/input token ratio must be positive, got {}",
                output_input_ratio
            )));
        }
        let max_input = max_output_tokens as f64 / output_input_ratio;
        let buffered = (max_input * BUDGET_SAFETY_FACTOR).floor();
        Self::new(buffered as i64)
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

impl TryFrom<i64> for ChunkBudget {
    type Error = BookcastError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ChunkBudget> for i64 {
    fn from(budget: ChunkBudget) -> Self {
        budget.get() as i64
    }
}

/// An ordered group of units delivered to the translator or synthesizer as one request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chunk {
    units: Vec<TextUnit>,
    size: usize,
}

impl Chunk {
    fn push(&mut self, unit: TextUnit) {
        self.size += unit.size;
        self.units.push(unit);
    }

    fn singleton(unit: TextUnit) -> Self {
        let mut chunk = Self::default();
        chunk.push(unit);
        chunk
    }

    pub fn units(&self) -> &[TextUnit] {
        &self.units
    }

    pub fn into_units(self) -> Vec<TextUnit> {
        self.units
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn unit_ids(&self) -> Vec<usize> {
        self.units.iter().map(|u| u.id).collect()
    }

    /// Unit texts joined by a blank line.
    pub fn text(&self) -> String {
        self.join("\n\n")
    }

    pub fn join(&self, separator: &str) -> String {
        self.units
            .iter()
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// True when this chunk is the singleton passthrough for a unit larger than `budget`.
    pub fn is_oversized(&self, budget: ChunkBudget) -> bool {
        self.size > budget.get()
    }
}

/// Stateless planner bound to one budget.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlanner {
    budget: ChunkBudget,
}

impl ChunkPlanner {
    pub fn new(budget: ChunkBudget) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> ChunkBudget {
        self.budget
    }

    /// Pack `units` in order. A running total equal to the budget still fits.
    pub fn plan<I>(&self, units: I) -> Vec<Chunk>
    where
        I: IntoIterator<Item = TextUnit>,
    {
        let budget = self.budget.get();
        let mut chunks = Vec::new();
        let mut current = Chunk::default();

        for unit in units {
            if unit.size > budget {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                log::debug!(
                    "unit {} ({} > budget {}) emitted as its own chunk",
                    unit.id,
                    unit.size,
                    budget
                );
                chunks.push(Chunk::singleton(unit));
                continue;
            }

            if current.size + unit.size > budget {
                chunks.push(std::mem::take(&mut current));
            }
            current.push(unit);
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

/// Plan `units` under `budget`, failing with `InvalidConfiguration` when `budget <= 0`.
pub fn plan(units: Vec<TextUnit>, budget: i64) -> Result<Vec<Chunk>> {
    let budget = ChunkBudget::new(budget)?;
    Ok(ChunkPlanner::new(budget).plan(units))
}

/// One line of a serialized plan: `chunk1 -> [0, 1, 2]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub chunk_id: String,
    pub paragraph_ids: Vec<usize>,
    pub size: usize,
    pub oversized: bool,
}

/// Chunks together with the budget they were planned under.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    budget: ChunkBudget,
    chunks: Vec<Chunk>,
}

impl ChunkPlan {
    pub fn build(units: Vec<TextUnit>, budget: ChunkBudget) -> Self {
        let chunks = ChunkPlanner::new(budget).plan(units);
        Self { budget, chunks }
    }

    pub fn budget(&self) -> ChunkBudget {
        self.budget
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    pub fn total_size(&self) -> usize {
        self.chunks.iter().map(Chunk::size).sum()
    }

    /// 1-based chunk name, matching the keys in monitoring output.
    pub fn chunk_id(index: usize) -> String {
        format!("chunk{}", index + 1)
    }

    pub fn summaries(&self) -> Vec<ChunkSummary> {
        self.chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| ChunkSummary {
                chunk_id: Self::chunk_id(i),
                paragraph_ids: chunk.unit_ids(),
                size: chunk.size(),
                oversized: chunk.is_oversized(self.budget),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(sizes: &[usize]) -> Vec<TextUnit> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &s)| TextUnit::new(i, format!("p{}", i), s))
            .collect()
    }

    fn sizes(chunks: &[Chunk]) -> Vec<Vec<usize>> {
        chunks
            .iter()
            .map(|c| c.units().iter().map(|u| u.size).collect())
            .collect()
    }

    #[test]
    fn test_mixed_sizes_with_exact_fit() {
        let chunks = plan(units(&[100, 100, 100, 250, 50]), 250).unwrap();
        assert_eq!(
            sizes(&chunks),
            vec![vec![100, 100], vec![100], vec![250], vec![50]]
        );
    }

    #[test]
    fn test_running_total_equal_to_budget_fits() {
        let chunks = plan(units(&[100, 150, 10]), 250).unwrap();
        assert_eq!(sizes(&chunks), vec![vec![100, 150], vec![10]]);
    }

    #[test]
    fn test_oversized_singleton_passthrough() {
        let chunks = plan(units(&[300]), 100).unwrap();
        assert_eq!(sizes(&chunks), vec![vec![300]]);
        assert!(chunks[0].is_oversized(ChunkBudget::new(100).unwrap()));
    }

    #[test]
    fn test_oversized_unit_closes_open_chunk() {
        let chunks = plan(units(&[40, 30, 500, 20, 20]), 100).unwrap();
        assert_eq!(sizes(&chunks), vec![vec![40, 30], vec![500], vec![20, 20]]);
    }

    #[test]
    fn test_empty_input() {
        assert!(plan(Vec::new(), 10).unwrap().is_empty());
    }

    #[test]
    fn test_non_positive_budget_rejected() {
        assert!(matches!(
            plan(units(&[1]), 0),
            Err(BookcastError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            plan(units(&[1]), -5),
            Err(BookcastError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            plan(Vec::new(), -1),
            Err(BookcastError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_sized_units_stay_with_neighbours() {
        let chunks = plan(units(&[5, 0, 5, 0]), 10).unwrap();
        assert_eq!(sizes(&chunks), vec![vec![5, 0, 5, 0]]);
    }

    #[test]
    fn test_budget_from_model() {
        // 65536 / 1.22 * 0.8 = 42974.0...
        let budget = ChunkBudget::from_model(65536, 1.22).unwrap();
        assert_eq!(budget.get(), 42974);

        let budget = ChunkBudget::from_model(8192, 1.0).unwrap();
        assert_eq!(budget.get(), 6553);
    }

    #[test]
    fn test_budget_from_model_rejects_bad_ratio() {
        assert!(ChunkBudget::from_model(8192, 0.0).is_err());
        assert!(ChunkBudget::from_model(8192, -1.0).is_err());
        assert!(ChunkBudget::from_model(8192, f64::NAN).is_err());
        assert!(ChunkBudget::from_model(0, 1.0).is_err());
    }

    #[test]
    fn test_chunk_text_joins_with_blank_line() {
        let chunks = plan(
            vec![
                TextUnit::new(0, "First paragraph.", 16),
                TextUnit::new(1, "Second paragraph.", 17),
            ],
            100,
        )
        .unwrap();
        assert_eq!(chunks[0].text(), "First paragraph.\n\nSecond paragraph.");
        assert_eq!(chunks[0].unit_ids(), vec![0, 1]);
        assert_eq!(chunks[0].size(), 33);
    }

    #[test]
    fn test_plan_summaries() {
        let plan = ChunkPlan::build(units(&[60, 60, 200]), ChunkBudget::new(100).unwrap());
        let summaries = plan.summaries();
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].chunk_id, "chunk1");
        assert_eq!(summaries[1].paragraph_ids, vec![1]);
        assert!(summaries[2].oversized);
        assert!(!summaries[0].oversized);
        assert_eq!(plan.total_size(), 320);
    }

    #[test]
    fn test_measure_parsing() {
        assert_eq!("chars".parse::<SizeMeasure>().unwrap(), SizeMeasure::Chars);
        assert_eq!("tokens".parse::<SizeMeasure>().unwrap(), SizeMeasure::Tokens);
        assert!("words".parse::<SizeMeasure>().is_err());
    }

    #[test]
    fn test_measured_unit_counts_chars_not_bytes() {
        let unit = TextUnit::measured(0, "perché", SizeMeasure::Chars);
        assert_eq!(unit.size, 6);
    }

    #[test]
    fn test_budget_serde_rejects_zero() {
        let budget: ChunkBudget = serde_json::from_str("250").unwrap();
        assert_eq!(budget.get(), 250);
        assert!(serde_json::from_str::<ChunkBudget>("0").is_err());
    }
}
