//! Authentication
//!
//! SCRAM-SHA-256 is the primary mechanism; cleartext password is also
//! supported. The exchange itself is driven by the connection startup
//! logic in [`crate::connection`].

mod scram;

pub use scram::{ScramClient, ScramError, ScramState};
