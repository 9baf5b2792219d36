//! Credential identifiers, redacted secrets, token material, and parsed claims.

pub mod claims;
pub mod id;
pub mod material;
pub mod secret;

pub use claims::*;
pub use id::*;
pub use material::*;
pub use secret::*;
