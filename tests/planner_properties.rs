/// Behavioural tests for chunk planning through the public API
use anyhow::Result;
use bookcast::pipeline::plan_paragraphs;
use bookcast::text::TextProcessor;
use bookcast::{
    plan, BookcastError, Chunk, ChunkBudget, ChunkPlan, ChunkPlanner, SizeMeasure, TextUnit,
};
use rayon::prelude::*;

fn units(sizes: &[usize]) -> Vec<TextUnit> {
    sizes
        .iter()
        .enumerate()
        .map(|(id, &size)| TextUnit::new(id, format!("unit {}", id), size))
        .collect()
}

fn sizes(chunks: &[Chunk]) -> Vec<Vec<usize>> {
    chunks
        .iter()
        .map(|c| c.units().iter().map(|u| u.size).collect())
        .collect()
}

/// Deterministic pseudo-random size sequences covering small, exact-fit and oversized units.
fn size_cases() -> Vec<(Vec<usize>, i64)> {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut cases = Vec::new();
    for _ in 0..200 {
        let budget = (next() % 500 + 1) as i64;
        let len = (next() % 40) as usize;
        let sizes = (0..len)
            .map(|_| match next() % 10 {
                0 => budget as usize,
                1 => budget as usize + (next() % 300) as usize + 1,
                2 => 0,
                _ => (next() % budget as u64) as usize + 1,
            })
            .collect();
        cases.push((sizes, budget));
    }
    cases
}

#[test]
fn test_concrete_scenario_with_exact_fit() -> Result<()> {
    let chunks = plan(units(&[100, 100, 100, 250, 50]), 250)?;
    assert_eq!(
        sizes(&chunks),
        vec![vec![100, 100], vec![100], vec![250], vec![50]]
    );
    Ok(())
}

#[test]
fn test_running_total_equal_to_budget_shares_a_chunk() -> Result<()> {
    let chunks = plan(units(&[100, 150, 1]), 250)?;
    assert_eq!(sizes(&chunks), vec![vec![100, 150], vec![1]]);
    Ok(())
}

#[test]
fn test_single_oversized_unit_passes_through() -> Result<()> {
    let chunks = plan(units(&[300]), 100)?;
    assert_eq!(sizes(&chunks), vec![vec![300]]);
    Ok(())
}

#[test]
fn test_oversized_unit_closes_open_chunk() -> Result<()> {
    let chunks = plan(units(&[40, 40, 500, 40]), 100)?;
    assert_eq!(sizes(&chunks), vec![vec![40, 40], vec![500], vec![40]]);
    Ok(())
}

#[test]
fn test_empty_input_gives_no_chunks() -> Result<()> {
    assert!(plan(Vec::new(), 1)?.is_empty());
    assert!(plan(Vec::new(), 10_000)?.is_empty());
    Ok(())
}

#[test]
fn test_non_positive_budgets_are_rejected() {
    for budget in [0, -5, i64::MIN] {
        match plan(units(&[1, 2, 3]), budget) {
            Err(BookcastError::InvalidConfiguration(_)) => {}
            other => panic!("budget {} gave {:?}", budget, other.map(|c| c.len())),
        }
    }
}

#[test]
fn test_concatenation_reproduces_input() -> Result<()> {
    for (case, budget) in size_cases() {
        let input = units(&case);
        let chunks = plan(input.clone(), budget)?;
        let flattened: Vec<TextUnit> = chunks.into_iter().flat_map(Chunk::into_units).collect();
        assert_eq!(flattened, input, "budget {}", budget);
    }
    Ok(())
}

#[test]
fn test_chunks_respect_budget_unless_oversized_singleton() -> Result<()> {
    for (case, budget) in size_cases() {
        let limit = budget as usize;
        for chunk in plan(units(&case), budget)? {
            assert!(!chunk.is_empty());
            if chunk.size() > limit {
                assert_eq!(chunk.len(), 1, "sizes {:?} budget {}", case, budget);
            }
        }
    }
    Ok(())
}

#[test]
fn test_every_oversized_unit_is_alone() -> Result<()> {
    for (case, budget) in size_cases() {
        let limit = budget as usize;
        for chunk in plan(units(&case), budget)? {
            if chunk.units().iter().any(|u| u.size > limit) {
                assert_eq!(chunk.len(), 1);
            }
        }
    }
    Ok(())
}

#[test]
fn test_no_adjacent_chunks_could_have_been_merged_greedily() -> Result<()> {
    // Greedy packing closes a chunk only when the next unit does not fit.
    for (case, budget) in size_cases() {
        let limit = budget as usize;
        let chunks = plan(units(&case), budget)?;
        for pair in chunks.windows(2) {
            let first_of_next = pair[1].units()[0].size;
            if pair[0].size() <= limit && first_of_next <= limit {
                assert!(pair[0].size() + first_of_next > limit);
            }
        }
    }
    Ok(())
}

#[test]
fn test_planning_is_deterministic_across_threads() -> Result<()> {
    let input = units(&[120, 80, 45, 300, 10, 10, 200, 60, 60, 60]);
    let planner = ChunkPlanner::new(ChunkBudget::new(200)?);
    let expected = planner.plan(input.clone());

    let runs: Vec<Vec<Chunk>> = (0..32)
        .into_par_iter()
        .map(|_| planner.plan(input.clone()))
        .collect();
    assert!(runs.iter().all(|run| *run == expected));
    Ok(())
}

#[test]
fn test_plan_summaries_name_chunks_in_order() -> Result<()> {
    let plan = ChunkPlan::build(units(&[5, 5, 20, 5]), ChunkBudget::new(10)?);
    let summaries = plan.summaries();

    let ids: Vec<&str> = summaries.iter().map(|s| s.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["chunk1", "chunk2", "chunk3"]);
    assert_eq!(summaries[0].paragraph_ids, vec![0, 1]);
    assert!(summaries[1].oversized);
    assert_eq!(plan.total_size(), 35);
    Ok(())
}

#[test]
fn test_segmented_book_plans_by_paragraph() -> Result<()> {
    let text = "Call me Ishmael. Some years ago I went to sea.\n\n\
                It is a way I have of driving off the spleen.\n\n\
                Whenever I find myself growing grim about the mouth, I account it high time to get to sea.";
    let paragraphs = TextProcessor::new().segment(text);
    assert_eq!(paragraphs.len(), 3);

    let report = plan_paragraphs(&paragraphs, ChunkBudget::new(100)?, SizeMeasure::Chars);
    let grouped: Vec<Vec<usize>> = report.chunks.iter().map(|c| c.paragraph_ids.clone()).collect();
    assert_eq!(grouped, vec![vec![0, 1], vec![2]]);
    assert!(report.chunks.iter().all(|c| c.size <= 100));
    Ok(())
}
