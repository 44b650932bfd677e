//! One-shot delayed tasks ticked from the character update loop.
//!
//! Each scheduled task is a row with an id and a due time. Rescheduling a task
//! deletes its row and inserts a new one, so a stale handle can never cancel the
//! replacement.

/// Handle of a scheduled task. Ids are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

#[derive(Clone, Debug)]
struct ScheduledRow<T> {
    id: u64,
    due_at: f64,
    task: T,
}

#[derive(Clone, Debug)]
pub struct Scheduler<T> {
    now: f64,
    next_id: u64,
    rows: Vec<ScheduledRow<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: 0.0,
            next_id: 1,
            rows: Vec::new(),
        }
    }
}

impl<T: Clone + PartialEq> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds advanced so far.
    #[inline]
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn schedule_once(&mut self, delay: f32, task: T) -> TaskHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.push(ScheduledRow {
            id,
            due_at: self.now + f64::from(delay.max(0.0)),
            task,
        });
        TaskHandle(id)
    }

    /// Cancel every pending row of the same task, then schedule it again.
    pub fn reschedule(&mut self, delay: f32, task: T) -> TaskHandle {
        self.rows.retain(|row| row.task != task);
        self.schedule_once(delay, task)
    }

    /// Returns false when the task already ran or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.rows.len();
        self.rows.retain(|row| row.id != handle.0);
        self.rows.len() != before
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.rows.iter().any(|row| row.id == handle.0)
    }

    /// Advance the clock and remove the tasks that fell due, in due order.
    /// Tasks due at the same time come out in scheduling order.
    pub fn advance(&mut self, dt: f32) -> Vec<T> {
        self.now += f64::from(dt.max(0.0));
        let now = self.now;

        let mut due = Vec::new();
        self.rows.retain(|row| {
            if row.due_at <= now {
                due.push(row.clone());
                false
            } else {
                true
            }
        });

        due.sort_by(|a, b| a.due_at.total_cmp(&b.due_at).then(a.id.cmp(&b.id)));
        due.into_iter().map(|row| row.task).collect()
    }
}
