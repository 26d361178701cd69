// Priority job queues for the main loop
// Fixed-size rings, no allocation. High drains before Normal before Low.
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    // timing-sensitive: a late digit flickers, a late step stalls the motor
    MuxDisplay,
    StepMotor,

    ScanInputs,
    SampleRange,
    UpdateAlarm,
    UpdateIndicators,
    SecurityTick,

    ReadLight,
    RefreshLcd,
    SaveConfig,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Job::MuxDisplay => "MuxDisplay",
            Job::StepMotor => "StepMotor",
            Job::ScanInputs => "ScanInputs",
            Job::SampleRange => "SampleRange",
            Job::UpdateAlarm => "UpdateAlarm",
            Job::UpdateIndicators => "UpdateIndicators",
            Job::SecurityTick => "SecurityTick",
            Job::ReadLight => "ReadLight",
            Job::RefreshLcd => "RefreshLcd",
            Job::SaveConfig => "SaveConfig",
        };
        f.write_str(name)
    }
}

/// Job priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High = 0,
    Normal = 1,
    Low = 2,
}

impl Job {
    pub const fn priority(&self) -> Priority {
        match self {
            Job::MuxDisplay | Job::StepMotor => Priority::High,
            Job::ScanInputs
            | Job::SampleRange
            | Job::UpdateAlarm
            | Job::UpdateIndicators
            | Job::SecurityTick => Priority::Normal,
            Job::ReadLight | Job::RefreshLcd | Job::SaveConfig => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// Queue for this priority level is full, contains the rejected job
    Full(Job),
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(job) => write!(f, "queue full, rejected {}", job),
        }
    }
}

/// Fixed-capacity FIFO of jobs for one priority tier.
pub struct JobQueue<const N: usize> {
    slots: [Option<Job>; N],
    head: usize,
    len: usize,
}

impl<const N: usize> JobQueue<N> {
    pub const fn new() -> Self {
        Self {
            slots: [None; N],
            head: 0,
            len: 0,
        }
    }

    fn slot(&self, offset: usize) -> usize {
        (self.head + offset) % N
    }

    pub fn push(&mut self, job: Job) -> Result<(), Job> {
        if self.is_full() {
            return Err(job);
        }
        let at = self.slot(self.len);
        self.slots[at] = Some(job);
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Job> {
        if self.len == 0 {
            return None;
        }
        let job = self.slots[self.head].take();
        self.head = self.slot(1);
        self.len -= 1;
        job
    }

    pub fn peek(&self) -> Option<&Job> {
        match self.len {
            0 => None,
            _ => self.slots[self.head].as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn clear(&mut self) {
        self.slots = [None; N];
        self.head = 0;
        self.len = 0;
    }

    pub fn contains(&self, job: &Job) -> bool {
        (0..self.len).any(|i| self.slots[self.slot(i)].as_ref() == Some(job))
    }
}

impl<const N: usize> Default for JobQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

// Every job kind fits in its tier at once, so push_unique never fails in
// practice; plain push can still overflow.
const TIER_CAPACITY: usize = 6;

/// Three FIFO tiers drained high first.
pub struct Scheduler {
    tiers: [JobQueue<TIER_CAPACITY>; 3],
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            tiers: [JobQueue::new(), JobQueue::new(), JobQueue::new()],
        }
    }

    fn tier(&mut self, priority: Priority) -> &mut JobQueue<TIER_CAPACITY> {
        &mut self.tiers[priority as usize]
    }

    /// Queue a job; a full tier hands the job back in the error.
    pub fn push(&mut self, job: Job) -> Result<(), PushError> {
        self.tier(job.priority()).push(job).map_err(PushError::Full)
    }

    /// Queue a job unless the same job is already waiting.
    pub fn push_unique(&mut self, job: Job) -> Result<(), PushError> {
        let tier = self.tier(job.priority());
        if tier.contains(&job) {
            return Ok(());
        }
        tier.push(job).map_err(PushError::Full)
    }

    pub fn pop(&mut self) -> Option<Job> {
        self.tiers.iter_mut().find_map(JobQueue::pop)
    }

    pub fn peek(&self) -> Option<&Job> {
        self.tiers.iter().find_map(JobQueue::peek)
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(JobQueue::is_empty)
    }

    pub fn pending(&self) -> usize {
        self.tiers.iter().map(JobQueue::len).sum()
    }

    pub fn pending_by_priority(&self, priority: Priority) -> usize {
        self.tiers[priority as usize].len()
    }

    pub fn clear(&mut self) {
        self.tiers.iter_mut().for_each(JobQueue::clear);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_by_priority_then_fifo() {
        let mut s = Scheduler::new();
        s.push(Job::RefreshLcd).unwrap();
        s.push(Job::ScanInputs).unwrap();
        s.push(Job::MuxDisplay).unwrap();
        s.push(Job::SampleRange).unwrap();
        s.push(Job::StepMotor).unwrap();

        assert_eq!(s.peek(), Some(&Job::MuxDisplay));
        assert_eq!(s.pop(), Some(Job::MuxDisplay));
        assert_eq!(s.pop(), Some(Job::StepMotor));
        assert_eq!(s.pop(), Some(Job::ScanInputs));
        assert_eq!(s.pop(), Some(Job::SampleRange));
        assert_eq!(s.pop(), Some(Job::RefreshLcd));
        assert_eq!(s.pop(), None);
        assert!(s.is_empty());
    }

    #[test]
    fn push_unique_dedups_within_tier() {
        let mut s = Scheduler::new();
        s.push_unique(Job::ScanInputs).unwrap();
        s.push_unique(Job::ScanInputs).unwrap();
        s.push_unique(Job::SecurityTick).unwrap();
        assert_eq!(s.pending(), 2);
        assert_eq!(s.pending_by_priority(Priority::Normal), 2);
    }

    #[test]
    fn every_job_fits_once() {
        let all = [
            Job::MuxDisplay,
            Job::StepMotor,
            Job::ScanInputs,
            Job::SampleRange,
            Job::UpdateAlarm,
            Job::UpdateIndicators,
            Job::SecurityTick,
            Job::ReadLight,
            Job::RefreshLcd,
            Job::SaveConfig,
        ];
        let mut s = Scheduler::new();
        for job in all {
            s.push_unique(job).unwrap();
        }
        assert_eq!(s.pending(), all.len());
    }

    #[test]
    fn full_tier_rejects_and_reports_job() {
        let mut s = Scheduler::new();
        for _ in 0..TIER_CAPACITY {
            s.push(Job::MuxDisplay).unwrap();
        }
        assert_eq!(s.push(Job::StepMotor), Err(PushError::Full(Job::StepMotor)));
        // other tiers unaffected
        assert!(s.push(Job::RefreshLcd).is_ok());
        s.clear();
        assert!(s.is_empty());
    }

    #[test]
    fn ring_wraps_and_contains_follows_head() {
        let mut q = JobQueue::<3>::new();
        q.push(Job::ReadLight).unwrap();
        q.push(Job::RefreshLcd).unwrap();
        q.pop();
        q.pop();
        q.push(Job::SaveConfig).unwrap();
        q.push(Job::ReadLight).unwrap();
        q.push(Job::RefreshLcd).unwrap();
        assert!(q.is_full());
        assert!(q.contains(&Job::SaveConfig));
        assert!(!q.contains(&Job::MuxDisplay));
        assert_eq!(q.pop(), Some(Job::SaveConfig));
        assert_eq!(q.capacity(), 3);
    }

    #[test]
    fn push_error_displays_job() {
        let mut out = crate::fmt::StackFmt::<40>::new();
        core::fmt::Write::write_fmt(&mut out, format_args!("{}", PushError::Full(Job::SaveConfig)))
            .unwrap();
        assert_eq!(out.as_str(), "queue full, rejected SaveConfig");
    }
}
