// This file is part of psh, a POSIX-flavored shell.
// Copyright (C) 2021 WATANABE Yuki

//! Background job bookkeeping.
//!
//! Process spawning and `waitpid` itself live in the executor, which is the
//! only place that needs to talk to the OS; this module only remembers which
//! process groups are outstanding so `$!`, `wait`, and `jobs` have something
//! to report. `pid`/`pgid` are plain `i32`s rather than a libc/nix type so
//! this crate stays independent of how the executor represents a process.

/// Whether a job is still running or has finished.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobState {
    Running,
    /// Stopped by a job-control signal (`SIGTSTP` and friends).
    Stopped,
    /// Finished, with its reported exit status.
    Done(i32),
}

/// One backgrounded pipeline.
#[derive(Clone, Debug)]
pub struct Job {
    /// Process group ID of the pipeline (equal to the leader's pid).
    pub pgid: i32,
    /// Pids of every process in the pipeline, in stage order.
    pub pids: Vec<i32>,
    /// Source text, for `jobs` output.
    pub command: String,
    pub state: JobState,
}

/// Table of background jobs known to the shell.
#[derive(Debug, Default)]
pub struct JobSet {
    jobs: Vec<Job>,
    /// Pid of the most recently started background job (`$!`).
    last_async_pid: Option<i32>,
}

impl JobSet {
    pub fn add(&mut self, job: Job) -> usize {
        self.last_async_pid = job.pids.last().copied();
        self.jobs.push(job);
        self.jobs.len() - 1
    }

    #[must_use]
    pub fn last_async_pid(&self) -> Option<i32> {
        self.last_async_pid
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Job> {
        self.jobs.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Job> {
        self.jobs.get_mut(index)
    }

    #[must_use]
    pub fn find_by_pgid(&self, pgid: i32) -> Option<usize> {
        self.jobs.iter().position(|j| j.pgid == pgid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Marks one process within a job as finished; the job as a whole is
    /// `Done` once every pid in it has reported.
    pub fn report_exit(&mut self, pid: i32, status: i32) {
        for job in &mut self.jobs {
            if job.pids.contains(&pid) {
                job.state = JobState::Done(status);
            }
        }
    }

    /// Removes every job that has finished, returning them (for `wait`
    /// with no operands, which reaps and reports all of them).
    pub fn drain_done(&mut self) -> Vec<Job> {
        let (done, running): (Vec<_>, Vec<_>) = self
            .jobs
            .drain(..)
            .partition(|j| matches!(j.state, JobState::Done(_)));
        self.jobs = running;
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_async_pid_tracks_latest_job() {
        let mut jobs = JobSet::default();
        jobs.add(Job {
            pgid: 100,
            pids: vec![100],
            command: "sleep 1".into(),
            state: JobState::Running,
        });
        assert_eq!(jobs.last_async_pid(), Some(100));
    }

    #[test]
    fn drain_done_only_removes_finished_jobs() {
        let mut jobs = JobSet::default();
        jobs.add(Job {
            pgid: 1,
            pids: vec![1],
            command: "a".into(),
            state: JobState::Done(0),
        });
        jobs.add(Job {
            pgid: 2,
            pids: vec![2],
            command: "b".into(),
            state: JobState::Running,
        });
        let done = jobs.drain_done();
        assert_eq!(done.len(), 1);
        assert_eq!(jobs.iter().count(), 1);
    }
}
