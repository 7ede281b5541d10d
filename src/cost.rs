//! Translation cost estimates.

use crate::config::ModelInfo;
use crate::error::Result;
use crate::planner::ChunkPlan;
use crate::text::Paragraph;
use crate::tokens::TokenCounter;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub output_cost: f64,
    pub thinking_cost: f64,
    pub total_cost: f64,
}

/// Prices are USD per million tokens.
#[derive(Debug, Clone, Copy)]
pub struct CostCalculator {
    pub input_price: f64,
    pub output_price: f64,
    pub thinking_price: f64,
}

impl CostCalculator {
    pub fn for_model(info: &ModelInfo) -> Self {
        Self {
            input_price: info.input_price,
            output_price: info.output_price,
            thinking_price: info.thinking_price,
        }
    }

    pub fn calculate(&self, input: u64, output: u64, thinking: u64) -> CostBreakdown {
        let per_million = |tokens: u64, price: f64| tokens as f64 / 1_000_000.0 * price;
        let input_cost = per_million(input, self.input_price);
        let output_cost = per_million(output, self.output_price);
        let thinking_cost = per_million(thinking, self.thinking_price);
        CostBreakdown {
            input_cost,
            output_cost,
            thinking_cost,
            total_cost: input_cost + output_cost + thinking_cost,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookEstimate {
    pub model: String,
    pub chunks: usize,
    /// Instruction tokens repeated with each chunk.
    pub prompt_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub thinking_tokens: u64,
    pub cost: CostBreakdown,
}

/// Estimate what translating `paragraphs` with `model` would cost. Chunks are
/// planned with `counter`, and every chunk is charged the tokens of `prompt`
/// on top of its text. Output and thinking follow from that total input.
pub fn estimate_book(
    model: &str,
    info: &ModelInfo,
    paragraphs: &[Paragraph],
    counter: &TokenCounter,
    prompt: &str,
) -> Result<BookEstimate> {
    let budget = info.input_budget()?;
    let plan = ChunkPlan::build(counter.paragraph_units(paragraphs), budget);
    let chunks = plan.chunks().len();

    let prompt_tokens = if prompt.trim().is_empty() {
        0
    } else {
        counter.count_tokens(prompt) as u64
    };
    let input_tokens = plan.total_size() as u64 + prompt_tokens * chunks as u64;
    let output_tokens = (input_tokens as f64 * info.output_input_token_ratio).round() as u64;
    let thinking_tokens = info
        .thinking_input_ratio
        .map(|r| (input_tokens as f64 * r).round() as u64)
        .unwrap_or(0);

    let cost =
        CostCalculator::for_model(info).calculate(input_tokens, output_tokens, thinking_tokens);
    Ok(BookEstimate {
        model: model.to_string(),
        chunks,
        prompt_tokens,
        input_tokens,
        output_tokens,
        thinking_tokens,
        cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_calculate() {
        let calc = CostCalculator {
            input_price: 0.5,
            output_price: 1.2,
            thinking_price: 0.6,
        };
        let cost = calc.calculate(100_000, 150_000, 80_000);
        assert!(approx(cost.input_cost, 0.05));
        assert!(approx(cost.output_cost, 0.18));
        assert!(approx(cost.thinking_cost, 0.048));
        assert!(approx(cost.total_cost, 0.278));
    }

    fn tiny_model() -> ModelInfo {
        ModelInfo {
            provider: Provider::DeepSeek,
            max_output_tokens: 100,
            output_input_token_ratio: 2.0,
            thinking_input_ratio: Some(1.0),
            input_price: 1.0,
            output_price: 2.0,
            thinking_price: 3.0,
        }
    }

    // budget = 100 / 2 * 0.8 = 40 tokens; each paragraph is 100 chars = 25 tokens
    fn paragraphs() -> Vec<Paragraph> {
        (0..4)
            .map(|i| Paragraph {
                par_id: i,
                sentences: vec!["x".repeat(100)],
                token_counts: vec![1],
            })
            .collect()
    }

    #[test]
    fn test_estimate_book() {
        let estimate = estimate_book(
            "tiny",
            &tiny_model(),
            &paragraphs(),
            &TokenCounter::estimating(),
            "",
        )
        .unwrap();
        assert_eq!(estimate.chunks, 4);
        assert_eq!(estimate.prompt_tokens, 0);
        assert_eq!(estimate.input_tokens, 100);
        assert_eq!(estimate.output_tokens, 200);
        assert_eq!(estimate.thinking_tokens, 100);
        assert!(approx(estimate.cost.total_cost, (100.0 + 400.0 + 300.0) / 1_000_000.0));
    }

    #[test]
    fn test_estimate_book_charges_prompt_per_chunk() {
        // 40 chars = 10 tokens of instructions with each of the 4 chunks
        let prompt = "y".repeat(40);
        let estimate = estimate_book(
            "tiny",
            &tiny_model(),
            &paragraphs(),
            &TokenCounter::estimating(),
            &prompt,
        )
        .unwrap();
        assert_eq!(estimate.prompt_tokens, 10);
        assert_eq!(estimate.input_tokens, 140);
        assert_eq!(estimate.output_tokens, 280);
        assert_eq!(estimate.thinking_tokens, 140);
        assert!(approx(estimate.cost.total_cost, (140.0 + 560.0 + 420.0) / 1_000_000.0));
    }
}
