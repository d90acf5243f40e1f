//! Authorization for remote stores that need user consent.
//!
//! - [`token`]: persisted token format and [`TokenStore`] implementations
//! - [`session`]: the shared [`AuthSession`] state machine
//! - [`google`]: Google's installed-app OAuth flow

pub mod google;
pub mod session;
pub mod token;

pub use google::{ClientSecrets, GoogleOAuth, UrlOpener, DRIVE_FILE_SCOPE};
pub use session::{AuthFlow, AuthSession, SessionState};
pub use token::{FileTokenStore, MemoryTokenStore, OAuthToken, TokenStore};
