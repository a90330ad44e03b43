use std::time::Duration;
use tracing::{info, instrument};

use crate::model::CycleReport;
use crate::notify::Notifier;
use crate::reconcile::Reconciler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Running,
    Idle,
}

/// Status notification text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyText {
    pub title: String,
    pub subtitle: String,
}

/// Runs reconciliation passes back to back, sleeping a fixed interval in between.
pub struct CycleDriver<'a> {
    reconciler: &'a Reconciler<'a>,
    notifier: &'a dyn Notifier,
    text: NotifyText,
    interval: Duration,
    state: CycleState,
    cycles: u64,
}

impl<'a> CycleDriver<'a> {
    pub fn new(
        reconciler: &'a Reconciler<'a>,
        notifier: &'a dyn Notifier,
        text: NotifyText,
        interval: Duration,
    ) -> Self {
        Self {
            reconciler,
            notifier,
            text,
            interval,
            state: CycleState::Running,
            cycles: 0,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Advance one transition. Returns the report when a pass ran.
    pub async fn step(&mut self) -> Option<CycleReport> {
        match self.state {
            CycleState::Running => {
                let report = self.run_once().await;
                self.state = CycleState::Idle;
                Some(report)
            }
            CycleState::Idle => {
                info!(interval_secs = self.interval.as_secs(), "waiting for next sync cycle");
                tokio::time::sleep(self.interval).await;
                self.state = CycleState::Running;
                None
            }
        }
    }

    /// One pass followed by exactly one notification, whatever the outcome.
    #[instrument(skip_all, fields(cycle = self.cycles + 1))]
    pub async fn run_once(&mut self) -> CycleReport {
        let report = self.reconciler.run_pass().await;
        self.cycles += 1;
        self.notifier
            .notify(&self.text.title, &self.text.subtitle, &report.status_line())
            .await;
        report
    }

    pub async fn run_forever(&mut self) {
        loop {
            self.step().await;
        }
    }
}
