mod cache;
mod clock;
mod locks;
mod vars;

pub use cache::MemCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use locks::{InProgress, InProgressGuard};
pub use vars::Vars;
