//! Business logic services for storefront.
//!
//! # Services
//!
//! - `session` - Session context over the identity provider
//! - `authorization` - Admin resolution and grants
//! - `gate` - Admin route guard

pub mod authorization;
pub mod gate;
pub mod session;

pub use authorization::{AdminDirectory, AuthorizationResolver, GrantError, VerificationError};
pub use gate::{AdminGate, GateState, Navigation};
pub use session::{SessionProvider, SessionSnapshot};
