// The tick multiplexer: one Periodic per recurring activity.
//
// Every timer wake the main loop calls `schedule(now, ..)`; each
// activity whose interval has elapsed is queued as a Job. Nothing here
// runs the work itself, so a slow job only delays the jobs behind it
// and never corrupts another activity's timing.
//
// SaveConfig is not periodic; it is pushed directly by the menu.

use crate::clock::Millis;
use crate::periodic::Periodic;
use crate::poll::PollRate;
use crate::scheduler::{Job, Scheduler};

pub const MUX_DISPLAY_MS: u32 = 2;
pub const STEP_MOTOR_MS: u32 = 1;
pub const SAMPLE_RANGE_MS: u32 = 60;
pub const UPDATE_ALARM_MS: u32 = 20;
pub const UPDATE_INDICATORS_MS: u32 = 10;
pub const SECURITY_TICK_MS: u32 = 100;
pub const READ_LIGHT_MS: u32 = 500;
pub const REFRESH_LCD_MS: u32 = 250;

const NUM_TASKS: usize = 9;

struct Entry {
    job: Job,
    timer: Periodic,
    enabled: bool,
}

pub struct TaskTable {
    entries: [Entry; NUM_TASKS],
    dropped: u32,
}

impl TaskTable {
    pub const fn new() -> Self {
        Self {
            entries: [
                Entry::new(Job::MuxDisplay, MUX_DISPLAY_MS),
                Entry::new(Job::StepMotor, STEP_MOTOR_MS),
                Entry::new(Job::ScanInputs, PollRate::Fast.interval_ms()),
                Entry::new(Job::SampleRange, SAMPLE_RANGE_MS),
                Entry::new(Job::UpdateAlarm, UPDATE_ALARM_MS),
                Entry::new(Job::UpdateIndicators, UPDATE_INDICATORS_MS),
                Entry::new(Job::SecurityTick, SECURITY_TICK_MS),
                Entry::new(Job::ReadLight, READ_LIGHT_MS),
                Entry::new(Job::RefreshLcd, REFRESH_LCD_MS),
            ],
            dropped: 0,
        }
    }

    /// Queue every activity that is due at `now`. Returns how many
    /// jobs were queued.
    pub fn schedule(&mut self, now: Millis, sched: &mut Scheduler) -> usize {
        let mut queued = 0;
        for entry in self.entries.iter_mut() {
            if !entry.enabled || !entry.timer.is_due(now) {
                continue;
            }
            match sched.push_unique(entry.job) {
                Ok(()) => queued += 1,
                Err(e) => {
                    // skip and retry next tick
                    self.dropped = self.dropped.wrapping_add(1);
                    log::warn!("tasks: {}", e);
                }
            }
        }
        queued
    }

    pub fn set_interval(&mut self, job: Job, interval_ms: u32) {
        if let Some(entry) = self.entry_mut(job) {
            entry.timer.set_interval(interval_ms);
        }
    }

    pub fn interval(&self, job: Job) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.job == job)
            .map(|e| e.timer.interval())
    }

    pub fn set_enabled(&mut self, job: Job, enabled: bool, now: Millis) {
        if let Some(entry) = self.entry_mut(job) {
            if enabled && !entry.enabled {
                entry.timer.reset(now);
            }
            entry.enabled = enabled;
        }
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    fn entry_mut(&mut self, job: Job) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.job == job)
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Entry {
    const fn new(job: Job, interval_ms: u32) -> Self {
        Self {
            job,
            timer: Periodic::new(interval_ms),
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(sched: &mut Scheduler) -> Vec<Job> {
        core::iter::from_fn(|| sched.pop()).collect()
    }

    #[test]
    fn nothing_due_before_first_interval() {
        let mut t = TaskTable::new();
        let mut s = Scheduler::new();
        assert_eq!(t.schedule(Millis(0), &mut s), 0);
        assert_eq!(t.schedule(Millis(1), &mut s), 1);
        assert_eq!(drain(&mut s), vec![Job::StepMotor]);
    }

    #[test]
    fn cadences_interleave_over_one_second() {
        let mut t = TaskTable::new();
        let mut s = Scheduler::new();
        let mut counts = [0u32; NUM_TASKS];
        for ms in 1..=1000 {
            t.schedule(Millis(ms), &mut s);
            for job in drain(&mut s) {
                let idx = t.entries.iter().position(|e| e.job == job).unwrap();
                counts[idx] += 1;
            }
        }
        assert_eq!(counts[0], 500); // mux
        assert_eq!(counts[1], 1000); // step
        assert_eq!(counts[2], 200); // inputs at fast rate
        assert_eq!(counts[3], 16); // range
        assert_eq!(counts[6], 10); // security
        assert_eq!(counts[7], 2); // light
        assert_eq!(counts[8], 4); // lcd
    }

    #[test]
    fn queued_job_is_not_queued_twice() {
        let mut t = TaskTable::new();
        let mut s = Scheduler::new();
        t.schedule(Millis(2), &mut s);
        t.schedule(Millis(4), &mut s);
        let jobs = drain(&mut s);
        assert_eq!(jobs.iter().filter(|j| **j == Job::MuxDisplay).count(), 1);
    }

    #[test]
    fn retuned_and_disabled_tasks() {
        let mut t = TaskTable::new();
        let mut s = Scheduler::new();
        t.set_interval(Job::ScanInputs, 50);
        assert_eq!(t.interval(Job::ScanInputs), Some(50));
        t.set_enabled(Job::StepMotor, false, Millis(0));
        t.set_enabled(Job::MuxDisplay, false, Millis(0));
        t.schedule(Millis(5), &mut s);
        assert!(drain(&mut s).is_empty());
        t.schedule(Millis(50), &mut s);
        assert!(drain(&mut s).contains(&Job::ScanInputs));
    }

    #[test]
    fn reenabled_task_restarts_its_phase() {
        let mut t = TaskTable::new();
        let mut s = Scheduler::new();
        t.set_enabled(Job::SampleRange, false, Millis(0));
        t.schedule(Millis(60), &mut s);
        assert!(!drain(&mut s).contains(&Job::SampleRange));

        t.set_enabled(Job::SampleRange, true, Millis(100));
        // already enabled: the phase set at 100 stands
        t.set_enabled(Job::SampleRange, true, Millis(130));
        t.schedule(Millis(159), &mut s);
        assert!(!drain(&mut s).contains(&Job::SampleRange));
        t.schedule(Millis(160), &mut s);
        assert!(drain(&mut s).contains(&Job::SampleRange));
    }
}
