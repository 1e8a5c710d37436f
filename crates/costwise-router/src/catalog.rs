// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static task profiles.
//!
//! Maps each [`TaskCategory`] to the capabilities its preferred model must
//! offer and the branch of the selection cascade it enters. No network, no
//! heuristics: the caller names the category.

use costwise_core::{Capability, CostUnit, TaskCategory};

/// What a task category needs from a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskProfile {
    /// Capabilities the preferred model must have.
    pub required: &'static [Capability],
    /// Prefers a premium model for reasoning quality.
    pub complex: bool,
    /// Needs fresh information from a search model.
    pub current_info: bool,
    /// Unit the task is billed in.
    pub unit: CostUnit,
}

impl TaskProfile {
    pub fn needs_vision(&self) -> bool {
        self.required.contains(&Capability::Multimodal)
    }
}

const VISION: TaskProfile = TaskProfile {
    required: &[Capability::Multimodal],
    complex: false,
    current_info: false,
    unit: CostUnit::PerImage,
};

const REASONING: TaskProfile = TaskProfile {
    required: &[Capability::ComplexReasoning],
    complex: true,
    current_info: false,
    unit: CostUnit::PerRequest,
};

const RICH_CONTENT: TaskProfile = TaskProfile {
    required: &[Capability::HighQualityText, Capability::ImageGeneration],
    complex: true,
    current_info: false,
    unit: CostUnit::PerRequest,
};

const CURRENT_INFO: TaskProfile = TaskProfile {
    required: &[Capability::CurrentInfo],
    complex: false,
    current_info: true,
    unit: CostUnit::PerSearch,
};

const PRODUCT_RESEARCH: TaskProfile = TaskProfile {
    required: &[Capability::WebSearch, Capability::Research],
    complex: false,
    current_info: true,
    unit: CostUnit::PerSearch,
};

const BASIC: TaskProfile = TaskProfile {
    required: &[Capability::BasicText],
    complex: false,
    current_info: false,
    unit: CostUnit::PerRequest,
};

/// Category lookup table.
pub struct TaskCatalog;

impl TaskCatalog {
    pub const fn profile(category: TaskCategory) -> TaskProfile {
        match category {
            TaskCategory::VisionAnalysis => VISION,
            TaskCategory::ComplexPlanning | TaskCategory::DataAnalysis => REASONING,
            TaskCategory::RichContent => RICH_CONTENT,
            TaskCategory::CurrentInfoResearch => CURRENT_INFO,
            TaskCategory::ProductResearch => PRODUCT_RESEARCH,
            TaskCategory::SimpleText
            | TaskCategory::Coaching
            | TaskCategory::StructuredExtraction
            | TaskCategory::General => BASIC,
        }
    }
}
