// Terminal front end: the interactive shell, text formatting and the
// background clock that drives the session countdown.

pub mod driver;
pub mod format;
pub mod shell;
pub mod utils;
