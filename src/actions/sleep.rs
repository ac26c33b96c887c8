use std::time::Duration;

use crate::actions::TestAction;
use crate::error::Result;
use crate::runtime::TestContext;

/// Blocks the executing thread for a fixed duration.
#[derive(Debug, Clone)]
pub struct SleepAction {
    duration: Duration,
}

impl SleepAction {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn millis(milliseconds: u64) -> Self {
        Self::new(Duration::from_millis(milliseconds))
    }
}

impl TestAction for SleepAction {
    fn name(&self) -> &str {
        "sleep"
    }

    fn do_execute(&self, _context: &mut TestContext) -> Result<()> {
        tracing::info!("Sleeping for {:?}", self.duration);
        std::thread::sleep(self.duration);
        Ok(())
    }
}
