//! Ebook to translated PDF and audiobook pipeline.
//!
//! The core is [`planner`]: a greedy packer that groups ordered text units
//! (paragraphs for translation, sentences for narration) into chunks that
//! respect a size budget. The other modules load books, talk to translation
//! models and TTS engines, and assemble the outputs around it.

pub mod audio;
pub mod book;
pub mod config;
pub mod cost;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod render;
pub mod text;
pub mod tokens;
pub mod translate;
pub mod tts;

pub use config::Config;
pub use error::{BookcastError, Result};
pub use pipeline::Pipeline;
pub use planner::{plan, Chunk, ChunkBudget, ChunkPlan, ChunkPlanner, SizeMeasure, TextUnit};
pub use text::Paragraph;
