//! Client for the VTOP student portal.

pub mod captcha;
pub mod cookies;
pub mod errors;
pub mod extract;
pub mod json;
pub mod login;
pub mod portal;
pub mod session;
pub mod timetable;

pub use captcha::{CaptchaSolver, CommandSolver, PromptSolver};
pub use cookies::CookieMap;
pub use errors::{AuthFailure, VtopError};
pub use extract::TableRow;
pub use login::{LoginChallenge, LoginSession, LoginSubmission, PendingLogin};
pub use portal::Portal;
pub use timetable::Semester;
