//! Evaluation on a worker thread.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use molar_eval::{evaluate, EvalError, EvaluationResult, ToothParameters};
use molar_grid::DensityField;

use crate::{MolarError, Result};

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;

/// Where an [`EvaluationTask`] stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationStatus {
    /// Not started; can still be cancelled.
    Pending,
    /// Running or finished but not yet collected.
    Running,
    /// Result available.
    Done,
    /// Cancelled before it started. Produces no result.
    Cancelled,
}

struct Job {
    initial: Arc<DensityField>,
    current: Arc<DensityField>,
    params: ToothParameters,
    voxel_size: f32,
}

type Outcome = std::result::Result<EvaluationResult, EvalError>;

/// One evaluation of a tooth.
///
/// The task is cancellable until its worker begins; after that it always
/// runs to completion. The result is cached and handed out by reference.
pub struct EvaluationTask {
    state: Arc<AtomicU8>,
    job: Option<Job>,
    handle: Option<JoinHandle<Option<Outcome>>>,
    result: Option<EvaluationResult>,
    current: Arc<DensityField>,
}

impl EvaluationTask {
    /// Prepare a task without starting it.
    pub fn new(
        initial: Arc<DensityField>,
        current: Arc<DensityField>,
        params: ToothParameters,
        voxel_size: f32,
    ) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PENDING)),
            job: Some(Job {
                initial,
                current: current.clone(),
                params,
                voxel_size,
            }),
            handle: None,
            result: None,
            current,
        }
    }

    /// Prepare and start a task.
    pub fn spawn(
        initial: Arc<DensityField>,
        current: Arc<DensityField>,
        params: ToothParameters,
        voxel_size: f32,
    ) -> Self {
        let mut task = Self::new(initial, current, params, voxel_size);
        task.start();
        task
    }

    /// Hand the job to a worker thread. Does nothing if already started.
    pub fn start(&mut self) {
        let Some(job) = self.job.take() else {
            return;
        };
        let state = self.state.clone();
        self.handle = Some(std::thread::spawn(move || {
            if state
                .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return None;
            }
            let result = evaluate(&job.initial, &job.current, &job.params, job.voxel_size);
            if let Ok(r) = &result {
                log::info!(
                    "evaluation: score {:.0}, {} undercuts, {} carved voxels",
                    r.score,
                    r.undercut_count,
                    r.carved_voxels()
                );
            }
            Some(result)
        }));
    }

    /// Cancel the task if its worker has not begun. Returns true if the
    /// task will produce no result.
    pub fn cancel(&self) -> bool {
        match self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(s) => s == CANCELLED,
        }
    }

    /// Current status, without blocking.
    pub fn status(&self) -> EvaluationStatus {
        if self.result.is_some() {
            return EvaluationStatus::Done;
        }
        match self.state.load(Ordering::Acquire) {
            PENDING => EvaluationStatus::Pending,
            CANCELLED => EvaluationStatus::Cancelled,
            _ => EvaluationStatus::Running,
        }
    }

    /// The density the task evaluates.
    pub fn current_density(&self) -> &DensityField {
        &self.current
    }

    /// The collected result, if any.
    pub fn result(&self) -> Option<&EvaluationResult> {
        self.result.as_ref()
    }

    /// The result if the worker has finished. Never blocks.
    pub fn poll(&mut self) -> Result<Option<&EvaluationResult>> {
        if self.handle.as_ref().is_some_and(|h| h.is_finished()) {
            self.collect()?;
        }
        Ok(self.result.as_ref())
    }

    /// Block until the worker finishes. `None` if the task was cancelled
    /// or never started.
    pub fn wait(&mut self) -> Result<Option<&EvaluationResult>> {
        self.collect()?;
        Ok(self.result.as_ref())
    }

    fn collect(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(Some(outcome)) => {
                self.result = Some(outcome?);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(_) => Err(MolarError::WorkerPanicked("evaluation")),
        }
    }
}
