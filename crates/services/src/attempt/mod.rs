mod driver;
mod progress;
mod session;
mod workflow;

// Public API of the attempt subsystem.
pub use crate::error::SessionError;
pub use driver::{AttemptHandle, AttemptOutcome};
pub use progress::{AttemptProgress, QuestionView};
pub use session::{AttemptSession, AttemptState, SubmitRequest, SubmitTrigger};
pub use workflow::{AttemptLoopService, SubmitOutcome};
