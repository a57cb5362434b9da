//! SSA analysis utilities.

pub mod cfg;
pub mod dataflow;
pub mod dom;
pub mod liveness;
pub mod suspend;

#[cfg(test)]
#[path = "../../tests/ssa/analysis/t_cfg.rs"]
mod t_cfg;
#[cfg(test)]
#[path = "../../tests/ssa/analysis/t_dom.rs"]
mod t_dom;
#[cfg(test)]
#[path = "../../tests/ssa/analysis/t_liveness.rs"]
mod t_liveness;
#[cfg(test)]
#[path = "../../tests/ssa/analysis/t_suspend.rs"]
mod t_suspend;
