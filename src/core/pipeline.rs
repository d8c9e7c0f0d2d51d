//! Ordered step execution with an early-exit skip signal.
//!
//! A pipeline is a fixed list of named steps. Each step consumes the context
//! and returns the (possibly extended) context, so state flows only through
//! explicit returns. A step may end the whole run successfully early by
//! returning the skip signal (`Error::pipeline_skipped`).

use crate::error::{ErrorCode, Result};

pub struct Step<C> {
    name: &'static str,
    run: Box<dyn FnOnce(C) -> Result<C>>,
}

impl<C> Step<C> {
    pub fn new(name: &'static str, run: impl FnOnce(C) -> Result<C> + 'static) -> Self {
        Self {
            name,
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug)]
pub enum RunOutcome<C> {
    /// Every step ran; the final context is returned.
    Completed(C),
    /// A step requested to skip the remaining steps. This is a success.
    Skipped { reason: String },
}

/// Run steps strictly in order, feeding each step's returned context into the
/// next. Stops on the first ordinary error (labeled with the step's name) or
/// on the skip signal (logged, returned as success).
///
/// Side effects of already-completed steps are never rolled back; recovery
/// across runs relies on artifact markers, not undo logic.
pub fn run_steps<C>(ctx: C, steps: Vec<Step<C>>) -> Result<RunOutcome<C>> {
    let mut ctx = ctx;
    for step in steps {
        let name = step.name;
        match (step.run)(ctx) {
            Ok(next) => ctx = next,
            Err(err) if err.code == ErrorCode::PipelineSkipped => {
                crate::log_status!("pipeline", "{}", err.message);
                return Ok(RunOutcome::Skipped {
                    reason: err.message,
                });
            }
            Err(err) => return Err(err.in_step(name)),
        }
    }
    Ok(RunOutcome::Completed(ctx))
}
