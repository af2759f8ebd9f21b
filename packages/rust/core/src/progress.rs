//! Progress reporting seam shared by all enrichment passes.

/// Progress callback for reporting pass status.
pub trait PassProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each processed item.
    fn item(&self, current: usize, total: usize, detail: &str);
    /// One-off status lines (rate-limit waits, operator prompts).
    fn note(&self, message: &str);
}

/// No-op reporter for headless/test usage.
pub struct SilentProgress;

impl PassProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item(&self, _current: usize, _total: usize, _detail: &str) {}
    fn note(&self, _message: &str) {}
}
