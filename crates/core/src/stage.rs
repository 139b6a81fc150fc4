//! The ordered pipeline stage table.
//!
//! Each stage wraps exactly one capability call. The progress ceiling is
//! what the job's progress is set to once the stage finishes; ceilings
//! are strictly increasing and stage 4 lands on 100.

use serde::{Deserialize, Serialize};

/// One ordered step of the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AnalyzeIntent,
    DesignIdeation,
    PromptOptimization,
    ImageRendering,
    Composition,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::AnalyzeIntent,
        Stage::DesignIdeation,
        Stage::PromptOptimization,
        Stage::ImageRendering,
        Stage::Composition,
    ];

    /// Zero-based index in the execution order.
    pub fn index(self) -> u8 {
        match self {
            Stage::AnalyzeIntent => 0,
            Stage::DesignIdeation => 1,
            Stage::PromptOptimization => 2,
            Stage::ImageRendering => 3,
            Stage::Composition => 4,
        }
    }

    /// Human-readable stage name, used in progress messages and in the
    /// detail text of stage failures.
    pub fn name(self) -> &'static str {
        match self {
            Stage::AnalyzeIntent => "Intent analysis",
            Stage::DesignIdeation => "Design ideation",
            Stage::PromptOptimization => "Prompt optimization",
            Stage::ImageRendering => "Image rendering",
            Stage::Composition => "Composition & storage",
        }
    }

    /// Progress percentage the job reaches once this stage completes.
    pub fn progress_ceiling(self) -> u8 {
        match self {
            Stage::AnalyzeIntent => 20,
            Stage::DesignIdeation => 40,
            Stage::PromptOptimization => 60,
            Stage::ImageRendering => 85,
            Stage::Composition => 100,
        }
    }

    /// Status message written to the registry when this stage completes.
    pub fn completion_message(self) -> &'static str {
        match self {
            Stage::AnalyzeIntent => "Intent analysed, drafting design proposals",
            Stage::DesignIdeation => "Design selected, optimizing render prompt",
            Stage::PromptOptimization => "Prompt ready, rendering image",
            Stage::ImageRendering => "Image rendered, composing final output",
            Stage::Composition => "Image generation complete",
        }
    }

    /// The stage that follows this one, if any.
    pub fn next(self) -> Option<Stage> {
        let idx = self.index() as usize + 1;
        Stage::ALL.get(idx).copied()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_in_execution_order() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index() as usize, i);
        }
    }

    #[test]
    fn ceilings_are_strictly_increasing_and_end_at_100() {
        let ceilings: Vec<u8> = Stage::ALL.iter().map(|s| s.progress_ceiling()).collect();
        assert_eq!(ceilings, vec![20, 40, 60, 85, 100]);
        assert!(ceilings.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn next_walks_the_full_sequence() {
        let mut stage = Stage::AnalyzeIntent;
        let mut visited = vec![stage];
        while let Some(next) = stage.next() {
            visited.push(next);
            stage = next;
        }
        assert_eq!(visited, Stage::ALL);
        assert_eq!(Stage::Composition.next(), None);
    }
}
