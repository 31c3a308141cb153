/// Progress events emitted by the sweep engine.
///
/// A sweep reports one phase per outer value; inside a phase, one task spans the whole
/// grid and advances once per *completed* sweep unit, whatever its outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: String },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    pub fn phase_start(&self, name: impl Into<String>) {
        self.report(Progress::PhaseStart { name: name.into() });
    }

    pub fn phase_finish(&self) {
        self.report(Progress::PhaseFinish);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.report(Progress::Message(text.into()));
    }
}
