//! The two built-in scenarios: a prep/cook/pack line run serially and with
//! replicated stages.

use std::time::Duration;

use crate::pipeline::{Pipeline, PipelineConfig, StageSpec};
use crate::stage::Pace;

/// Total run time of each scenario
pub const RUN_FOR: Duration = Duration::from_secs(5 * 60 + 10);
/// Interval between progress lines
pub const TICK: Duration = Duration::from_secs(60);

/// Bounds of the prep stage's self-paced timer
pub const PREP_MIN: Duration = Duration::from_secs(5);
pub const PREP_MAX: Duration = Duration::from_secs(8);
pub const COOK: Duration = Duration::from_secs(10);
pub const PACK: Duration = Duration::from_secs(2);

/// Replica counts for the parallel scenario
pub const PREP_REPLICAS: usize = 3;
pub const COOK_REPLICAS: usize = 5;
pub const PACK_REPLICAS: usize = 2;

fn config() -> PipelineConfig {
    PipelineConfig {
        run_for: RUN_FOR,
        tick: TICK,
    }
}

fn line(prep: usize, cook: usize, pack: usize) -> Pipeline {
    Pipeline::new()
        .config(config())
        .stage(
            StageSpec::new("prep", Pace::between(PREP_MIN, PREP_MAX))
                .label("prepped")
                .replicas(prep),
        )
        .stage(
            StageSpec::new("cook", Pace::fixed(COOK))
                .label("cooked")
                .replicas(cook),
        )
        .stage(
            StageSpec::new("pack", Pace::fixed(PACK))
                .label("packed")
                .replicas(pack),
        )
}

/// One replica per stage.
pub fn serial() -> Pipeline {
    line(1, 1, 1)
}

/// 3 preps, 5 cooks and 2 packers.
pub fn parallel() -> Pipeline {
    line(PREP_REPLICAS, COOK_REPLICAS, PACK_REPLICAS)
}
