//! Progress adaptation across resumptions.

/// Callback observing `(bytes_done, bytes_total)` over the encrypted length.
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Unsized progress-callback type used at trait boundaries.
pub type ProgressFn<'a> = dyn Fn(u64, u64) + Send + Sync + 'a;

/// Rebases a single transfer call's progress onto the whole upload.
///
/// Each transfer call reports its own completed count starting at zero; the
/// adapter adds the server-acknowledged resume offset and clamps at the
/// total, so the caller sees a `done` that never runs backwards across
/// resumptions and never exceeds `total`. Rebuilt fresh for every
/// sub-attempt; the resume offset is its only state.
pub struct ProgressAdapter<'a> {
    resume_offset: u64,
    total: u64,
    callback: &'a ProgressFn<'a>,
}

impl<'a> ProgressAdapter<'a> {
    pub fn new(resume_offset: u64, total: u64, callback: &'a ProgressFn<'a>) -> Self {
        Self {
            resume_offset,
            total,
            callback,
        }
    }

    /// Reports `completed_this_call` bytes rebased onto the whole upload.
    pub fn report(&self, completed_this_call: u64) {
        (self.callback)(
            adapt(self.resume_offset, completed_this_call, self.total),
            self.total,
        );
    }
}

/// `(bytes_already_accepted, this_call_completed, total) -> done`, clamped
/// to `[0, total]`.
pub fn adapt(resume_offset: u64, completed: u64, total: u64) -> u64 {
    resume_offset.saturating_add(completed).min(total)
}
