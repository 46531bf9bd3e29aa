//! Ctrl-C during a batch: first press skips, a quick second press cancels,
//! anything after that exits.

use anyhow::Context;
use colored::*;
use easyapk_core::BatchControl;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const DOUBLE_PRESS_WINDOW: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlCAction {
    SkipCurrent,
    CancelBatch,
    Exit,
}

#[derive(Debug, Default)]
struct PressState {
    last: Option<Instant>,
    cancelled: bool,
}

impl PressState {
    fn on_press(&mut self, now: Instant) -> CtrlCAction {
        if self.cancelled {
            return CtrlCAction::Exit;
        }
        let quick = self
            .last
            .is_some_and(|last| now.saturating_duration_since(last) <= DOUBLE_PRESS_WINDOW);
        self.last = Some(now);
        if quick {
            self.cancelled = true;
            CtrlCAction::CancelBatch
        } else {
            CtrlCAction::SkipCurrent
        }
    }
}

#[derive(Debug, Default)]
struct HubInner {
    active: Option<BatchControl>,
    presses: PressState,
}

/// Routes the process-wide Ctrl-C handler to whichever batch is running.
#[derive(Debug, Clone, Default)]
pub struct InterruptHub {
    inner: Arc<Mutex<HubInner>>,
}

impl InterruptHub {
    pub fn install() -> anyhow::Result<Self> {
        let hub = Self::default();
        let handler = hub.clone();
        ctrlc::set_handler(move || {
            if handler.dispatch(Instant::now()) == CtrlCAction::Exit {
                eprintln!("{}", "\n>> Interrupted, exiting".yellow().bold());
                std::process::exit(130);
            }
        })
        .context("cannot install Ctrl-C handler")?;
        Ok(hub)
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn attach(&self, control: BatchControl) {
        let mut inner = self.lock();
        inner.active = Some(control);
        inner.presses = PressState::default();
    }

    pub fn detach(&self) {
        self.lock().active = None;
    }

    /// With no batch attached every press exits.
    pub fn dispatch(&self, now: Instant) -> CtrlCAction {
        let mut inner = self.lock();
        let Some(control) = inner.active.clone() else {
            return CtrlCAction::Exit;
        };
        let action = inner.presses.on_press(now);
        match action {
            CtrlCAction::SkipCurrent => {
                control.skip_current_all();
                eprintln!(
                    "{}",
                    "\n>> Skipping current APK on every device (Ctrl+C again to cancel all)"
                        .yellow()
                        .bold()
                );
            }
            CtrlCAction::CancelBatch => {
                control.cancel_all();
                eprintln!("{}", "\n>> Cancelling the batch".red().bold());
            }
            CtrlCAction::Exit => {}
        }
        action
    }
}
