//! Optimizer configuration shared by the preprocessor and the memo.

use enumset::EnumSet;

use crate::error::OptResult;
use crate::plan::Plan;
use crate::rules::RuleId;

/// An optimizer turns an input plan into a better one.
pub trait Optimizer {
    fn context(&self) -> &OptimizerContext;

    fn find_best_plan(self) -> OptResult<Plan>;
}

/// Match order of plan tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MatchOrder {
    BottomUp,
    TopDown,
}

#[derive(Clone, Debug)]
pub struct OptimizerContext {
    /// Order in which the heuristic preprocessor visits plan nodes.
    pub match_order: MatchOrder,
    /// Max number of preprocessor iterations.
    pub max_iter_times: usize,
    /// Preprocessing rules enabled.
    pub rules: EnumSet<RuleId>,
    /// Max operator depth of an extracted plan.
    pub max_plan_depth: usize,
    /// Upper bound of merge passes in one `rehash_and_merge` call. Unbounded when `None`.
    pub max_merge_passes: Option<usize>,
}

impl Default for OptimizerContext {
    fn default() -> Self {
        Self {
            match_order: MatchOrder::TopDown,
            max_iter_times: 1000,
            rules: EnumSet::all(),
            max_plan_depth: 1024,
            max_merge_passes: None,
        }
    }
}

impl OptimizerContext {
    pub fn with_match_order(mut self, match_order: MatchOrder) -> Self {
        self.match_order = match_order;
        self
    }

    pub fn with_max_iter_times(mut self, max_iter_times: usize) -> Self {
        self.max_iter_times = max_iter_times;
        self
    }

    pub fn with_rules(mut self, rules: EnumSet<RuleId>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_max_plan_depth(mut self, max_plan_depth: usize) -> Self {
        self.max_plan_depth = max_plan_depth;
        self
    }

    pub fn with_max_merge_passes(mut self, max_merge_passes: usize) -> Self {
        self.max_merge_passes = Some(max_merge_passes);
        self
    }
}
