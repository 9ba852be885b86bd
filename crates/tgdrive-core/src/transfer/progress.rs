/// Snapshot handed to progress observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub bytes_confirmed: u64,
    pub total_size: u64,
    pub percent: u8,
}

impl Progress {
    pub fn new(bytes_confirmed: u64, total_size: u64) -> Self {
        let percent = if total_size == 0 {
            100
        } else {
            ((bytes_confirmed.min(total_size) as u128 * 100) / total_size as u128) as u8
        };
        Self {
            bytes_confirmed,
            total_size,
            percent,
        }
    }
}

/// Emits a progress event only when the confirmed share crosses a new
/// `step_percent` boundary, so a chat is not flooded with per-chunk messages.
#[derive(Debug)]
pub struct ProgressThrottle {
    total_size: u64,
    step_percent: u8,
    last_bucket: u8,
}

impl ProgressThrottle {
    pub fn new(total_size: u64, step_percent: u8) -> Self {
        Self::starting_at(total_size, step_percent, 0)
    }

    /// Start silently at an already-confirmed offset (resumed sessions).
    pub fn starting_at(total_size: u64, step_percent: u8, confirmed: u64) -> Self {
        let step_percent = step_percent.clamp(1, 100);
        let last_bucket = Progress::new(confirmed, total_size).percent / step_percent;
        Self {
            total_size,
            step_percent,
            last_bucket,
        }
    }

    pub fn observe(&mut self, bytes_confirmed: u64) -> Option<Progress> {
        let p = Progress::new(bytes_confirmed, self.total_size);
        let bucket = p.percent / self.step_percent;
        if bucket > self.last_bucket {
            self.last_bucket = bucket;
            Some(p)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_each_boundary_once() {
        let mut t = ProgressThrottle::new(1000, 20);
        assert_eq!(t.observe(100), None);
        assert_eq!(t.observe(199), None);
        assert_eq!(t.observe(200).map(|p| p.percent), Some(20));
        assert_eq!(t.observe(250), None);
        // Jumping several boundaries at once yields one event.
        assert_eq!(t.observe(810).map(|p| p.percent), Some(81));
        assert_eq!(t.observe(820), None);
        assert_eq!(t.observe(1000).map(|p| p.percent), Some(100));
    }

    #[test]
    fn resumed_sessions_start_quiet() {
        let mut t = ProgressThrottle::starting_at(1000, 20, 450);
        assert_eq!(t.observe(500), None);
        assert_eq!(t.observe(600).map(|p| p.percent), Some(60));
    }

    #[test]
    fn percent_is_floored_and_bounded() {
        assert_eq!(Progress::new(1, 3).percent, 33);
        assert_eq!(Progress::new(5, 3).percent, 100);
        assert_eq!(Progress::new(0, 0).percent, 100);
    }
}
