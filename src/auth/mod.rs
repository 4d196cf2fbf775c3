pub mod interceptor;
pub mod session;

pub use interceptor::{AuthInterceptor, SessionExpiredHook};
pub use session::{Session, SessionStore};
