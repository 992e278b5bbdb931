//! Per-stage timing collected during `Solver::update`, so a host application
//! can watch frame budget without this crate depending on a particular
//! metrics backend.

use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct SolverDiagnostics {
    pub partition: Duration,
    pub broad_and_narrow_phase: Duration,
    pub warm_start: Duration,
    pub sleep: Duration,
    pub solve: Duration,
    pub integrate: Duration,
    pub active_contact_count: usize,
    pub awake_body_count: usize,
}

impl SolverDiagnostics {
    pub fn total(&self) -> Duration {
        self.partition
            + self.broad_and_narrow_phase
            + self.warm_start
            + self.sleep
            + self.solve
            + self.integrate
    }
}
