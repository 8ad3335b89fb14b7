//! Repeating timers with cancellable handles

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// Runs a task repeatedly until its handle is cancelled or dropped
pub trait Scheduler {
    fn every(&self, period: Duration, task: Box<dyn FnMut()>) -> TimerHandle;
}

/// Cancels a scheduled task. Cancelling twice is a no-op; dropping cancels.
pub struct TimerHandle {
    cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: RefCell::new(Some(Box::new(cancel))),
        }
    }

    pub fn cancel(&self) {
        let cancel = self.cancel.borrow_mut().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.borrow().is_some()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// `setInterval`-backed scheduler
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserScheduler;

#[cfg(target_arch = "wasm32")]
impl Scheduler for BrowserScheduler {
    fn every(&self, period: Duration, mut task: Box<dyn FnMut()>) -> TimerHandle {
        let millis = period.as_millis().min(u32::MAX as u128) as u32;
        let interval = gloo_timers::callback::Interval::new(millis, move || task());
        TimerHandle::new(move || {
            interval.cancel();
        })
    }
}

type SharedTask = Rc<RefCell<Box<dyn FnMut()>>>;

struct ManualTask {
    period_ms: u64,
    elapsed_ms: u64,
    active: Rc<Cell<bool>>,
    task: SharedTask,
}

/// Scheduler driven by [`ManualScheduler::advance`]
#[derive(Clone, Default)]
pub struct ManualScheduler {
    tasks: Rc<RefCell<Vec<ManualTask>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks not yet cancelled
    pub fn active_tasks(&self) -> usize {
        self.tasks
            .borrow()
            .iter()
            .filter(|t| t.active.get())
            .count()
    }

    /// Move time forward, firing every task whose period elapses
    pub fn advance(&self, by: Duration) {
        let by_ms = by.as_millis() as u64;
        let due: Vec<(SharedTask, Rc<Cell<bool>>, u64)> = {
            let mut tasks = self.tasks.borrow_mut();
            tasks.retain(|t| t.active.get());
            tasks
                .iter_mut()
                .filter_map(|t| {
                    t.elapsed_ms += by_ms;
                    let fires = t.elapsed_ms / t.period_ms.max(1);
                    t.elapsed_ms %= t.period_ms.max(1);
                    (fires > 0).then(|| (t.task.clone(), t.active.clone(), fires))
                })
                .collect()
        };

        // Tasks may schedule or cancel while running, so no borrow is held here
        for (task, active, fires) in due {
            for _ in 0..fires {
                if !active.get() {
                    break;
                }
                let mut run = task.borrow_mut();
                (*run)();
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, period: Duration, task: Box<dyn FnMut()>) -> TimerHandle {
        let active = Rc::new(Cell::new(true));
        self.tasks.borrow_mut().push(ManualTask {
            period_ms: period.as_millis() as u64,
            elapsed_ms: 0,
            active: active.clone(),
            task: Rc::new(RefCell::new(task)),
        });
        TimerHandle::new(move || active.set(false))
    }
}
