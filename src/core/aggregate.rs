//! Aggregate status computation

use crate::core::{state::{PipelineStatus, StepStatus}, step::Step};

/// Compute the aggregate counts over a set of steps.
///
/// Pure and order independent: `total` is the number of steps, the other
/// fields count steps by status.
pub fn compute_status<'a, I>(steps: I) -> PipelineStatus
where
    I: IntoIterator<Item = &'a Step>,
{
    steps
        .into_iter()
        .fold(PipelineStatus::default(), |mut acc, step| {
            acc.total += 1;
            match step.status {
                StepStatus::Running => acc.running += 1,
                StepStatus::Error => acc.error += 1,
                StepStatus::Done => acc.done += 1,
                StepStatus::NotStarted => {}
            }
            acc
        })
}
