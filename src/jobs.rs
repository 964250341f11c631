//! The background job table.
//!
//! Jobs are numbered from 1 and the numbering has no holes: removing job `k`
//! renumbers every later job down by one. The table does not reap finished
//! processes, so an entry may outlive its process until `fg` or `exit` claims it.

use nix::unistd::Pid;
use std::fmt;

/// One backgrounded process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub pid: Pid,
    pub name: String,
}

/// A job paired with its 1-based position, as shown by `jobs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobEntry<'a> {
    pub number: usize,
    pub job: &'a Job,
}

impl fmt::Display for JobEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.number, self.job.pid, self.job.name)
    }
}

#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a job and return its number, which is also the new job count.
    pub fn append(&mut self, pid: Pid, name: impl Into<String>) -> usize {
        self.jobs.push(Job {
            pid,
            name: name.into(),
        });
        tracing::debug!(pid = pid.as_raw(), number = self.jobs.len(), "job added");
        self.jobs.len()
    }

    /// Remove job `number` (1-based), shifting later jobs down.
    ///
    /// Returns `None` and leaves the table untouched when `number` is out of range.
    pub fn remove(&mut self, number: usize) -> Option<Job> {
        if !(1..=self.jobs.len()).contains(&number) {
            return None;
        }
        let job = self.jobs.remove(number - 1);
        tracing::debug!(pid = job.pid.as_raw(), number, "job removed");
        Some(job)
    }

    pub fn get(&self, number: usize) -> Option<&Job> {
        number.checked_sub(1).and_then(|i| self.jobs.get(i))
    }

    /// Jobs in table order, paired with their numbers.
    pub fn list(&self) -> impl Iterator<Item = JobEntry<'_>> {
        self.jobs
            .iter()
            .enumerate()
            .map(|(i, job)| JobEntry { number: i + 1, job })
    }

    /// Empty the table, handing back every job in order.
    pub fn drain(&mut self) -> Vec<Job> {
        std::mem::take(&mut self.jobs)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
