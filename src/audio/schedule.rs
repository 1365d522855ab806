//! Delayed continuations on the audio graph clock.
//!
//! Fades are scheduled on the graph itself; the work that must happen once a
//! fade finishes (stopping a voice, completing a master fade-out) is queued
//! here and executed by [`crate::audio::PlaybackEngine::poll`].

use std::cell::Cell;
use std::rc::Rc;

use crate::catalog::SoundId;

/// Tolerance applied when comparing due times against the graph clock.
const DUE_EPSILON: f64 = 1e-9;

/// Identifies one master fade-out request; only the newest may complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FadeToken(u64);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ScheduledTask {
    /// Stop `id` if it is still the voice generation that was faded.
    StopVoice { id: SoundId, generation: u64 },
    /// Finish the master fade identified by `token`.
    CompleteMasterFade { token: FadeToken },
}

#[derive(Debug)]
struct Pending {
    due_at: f64,
    seq: u64,
    task: ScheduledTask,
}

#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    pending: Vec<Pending>,
    next_seq: u64,
    next_token: u64,
}

impl Scheduler {
    pub(crate) fn issue_token(&mut self) -> FadeToken {
        self.next_token += 1;
        FadeToken(self.next_token)
    }

    pub(crate) fn schedule(&mut self, due_at: f64, task: ScheduledTask) {
        self.next_seq += 1;
        self.pending.push(Pending {
            due_at,
            seq: self.next_seq,
            task,
        });
    }

    /// Remove and return every task due at `now`, earliest first.
    pub(crate) fn take_due(&mut self, now: f64) -> Vec<ScheduledTask> {
        let mut due = Vec::new();
        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].due_at <= now + DUE_EPSILON {
                due.push(self.pending.swap_remove(index));
            } else {
                index += 1;
            }
        }
        due.sort_by(|a, b| a.due_at.total_cmp(&b.due_at).then(a.seq.cmp(&b.seq)));
        due.into_iter().map(|pending| pending.task).collect()
    }

    pub(crate) fn cancel_master_fade(&mut self, token: FadeToken) {
        self.pending.retain(|pending| {
            !matches!(pending.task, ScheduledTask::CompleteMasterFade { token: queued } if queued == token)
        });
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Outcome of a master fade-out request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeStatus {
    /// The fade is ramping; voices still exist.
    Pending,
    /// Voices were stopped and the master bus restored to full gain.
    Completed,
    /// A later `fade_out_all` or `stop_all` cancelled this fade before it finished.
    Superseded,
}

/// Completion handle returned by [`crate::audio::PlaybackEngine::fade_out_all`].
#[derive(Debug, Clone)]
pub struct MasterFade {
    status: Rc<Cell<FadeStatus>>,
}

impl MasterFade {
    pub(crate) fn pending() -> Self {
        Self {
            status: Rc::new(Cell::new(FadeStatus::Pending)),
        }
    }

    pub(crate) fn resolved() -> Self {
        Self {
            status: Rc::new(Cell::new(FadeStatus::Completed)),
        }
    }

    pub(crate) fn finish(&self, status: FadeStatus) {
        self.status.set(status);
    }

    /// Current status.
    pub fn status(&self) -> FadeStatus {
        self.status.get()
    }

    /// True once the fade resolved, either way.
    pub fn is_done(&self) -> bool {
        self.status() != FadeStatus::Pending
    }

    /// True if the fade ran to completion.
    pub fn is_completed(&self) -> bool {
        self.status() == FadeStatus::Completed
    }
}

#[derive(Debug)]
pub(crate) struct PendingMasterFade {
    pub(crate) token: FadeToken,
    pub(crate) handle: MasterFade,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str, generation: u64) -> ScheduledTask {
        ScheduledTask::StopVoice {
            id: SoundId::from(id),
            generation,
        }
    }

    #[test]
    fn take_due_returns_tasks_in_due_order() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(2.0, stop("b", 1));
        scheduler.schedule(1.0, stop("a", 1));
        scheduler.schedule(5.0, stop("c", 1));
        let due = scheduler.take_due(2.0);
        assert_eq!(due, vec![stop("a", 1), stop("b", 1)]);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn equal_due_times_keep_schedule_order() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(1.0, stop("first", 1));
        scheduler.schedule(1.0, stop("second", 1));
        assert_eq!(
            scheduler.take_due(1.0),
            vec![stop("first", 1), stop("second", 1)]
        );
    }

    #[test]
    fn cancel_removes_only_matching_master_fade() {
        let mut scheduler = Scheduler::default();
        let old = scheduler.issue_token();
        let new = scheduler.issue_token();
        scheduler.schedule(1.0, ScheduledTask::CompleteMasterFade { token: old });
        scheduler.schedule(2.0, ScheduledTask::CompleteMasterFade { token: new });
        scheduler.schedule(1.0, stop("a", 3));
        scheduler.cancel_master_fade(old);
        assert_eq!(
            scheduler.take_due(10.0),
            vec![stop("a", 3), ScheduledTask::CompleteMasterFade { token: new }]
        );
    }

    #[test]
    fn master_fade_handles_share_status() {
        let handle = MasterFade::pending();
        let observer = handle.clone();
        assert!(!observer.is_done());
        handle.finish(FadeStatus::Superseded);
        assert!(observer.is_done());
        assert!(!observer.is_completed());
        assert!(MasterFade::resolved().is_completed());
    }
}
