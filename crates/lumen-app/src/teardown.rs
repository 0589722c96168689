//! Best-effort teardown that keeps going after a failed step.

use std::fmt::Display;

use tracing::error;

/// Runs destruction steps in order, logging each failure.
///
/// A failed step never stops the later ones: skipping them would leave
/// child objects alive when the device goes away. The first error is kept
/// and reported by [`Teardown::finish`].
#[derive(Debug, Default)]
pub struct Teardown {
    first_error: Option<anyhow::Error>,
    failures: usize,
}

impl Teardown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of destroying `what`.
    pub fn step<E>(&mut self, what: &str, result: Result<(), E>)
    where
        E: Display + Into<anyhow::Error>,
    {
        if let Err(e) = result {
            error!("Failed to destroy {what}: {e}");
            self.failures += 1;
            if self.first_error.is_none() {
                self.first_error = Some(e.into().context(format!("failed to destroy {what}")));
            }
        }
    }

    /// Number of failed steps so far.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// `Ok` if every step succeeded, otherwise the first error.
    pub fn finish(self) -> anyhow::Result<()> {
        self.first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_steps_run_after_a_failure() {
        let mut ran = Vec::new();
        let mut teardown = Teardown::new();
        for (name, result) in [
            ("uniforms", Err(anyhow::anyhow!("allocator poisoned"))),
            ("mesh", Ok(())),
            ("swapchain", Err(anyhow::anyhow!("lost device"))),
            ("surface", Ok(())),
        ] {
            ran.push(name);
            teardown.step(name, result);
        }

        assert_eq!(ran, ["uniforms", "mesh", "swapchain", "surface"]);
        assert_eq!(teardown.failures(), 2);
        let err = teardown.finish().unwrap_err();
        assert_eq!(err.to_string(), "failed to destroy uniforms");
        assert_eq!(err.root_cause().to_string(), "allocator poisoned");
    }

    #[test]
    fn clean_teardown_is_ok() {
        let mut teardown = Teardown::new();
        teardown.step::<anyhow::Error>("pipeline", Ok(()));
        assert_eq!(teardown.failures(), 0);
        assert!(teardown.finish().is_ok());
    }
}
