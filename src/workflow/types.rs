use dashmap::DashSet;
use std::sync::Arc;

// ────────────────────────────────────────────────────────────────
// InFlightGuard - Rejects a second delivery of a job still running
// ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InFlightJobs(Arc<DashSet<String>>);

pub struct InFlightGuard {
    jobs: Arc<DashSet<String>>,
    job_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.jobs.remove(&self.job_id);
    }
}

impl InFlightJobs {
    pub fn try_acquire(&self, job_id: impl AsRef<str>) -> Option<InFlightGuard> {
        let job_id = job_id.as_ref().to_string();
        if self.0.insert(job_id.clone()) {
            Some(InFlightGuard {
                jobs: Arc::clone(&self.0),
                job_id,
            })
        } else {
            None
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.0.len()
    }
}
