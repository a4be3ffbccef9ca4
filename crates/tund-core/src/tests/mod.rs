//! Lifecycle test suite.
//!
//! | Module | Covers |
//! |--------|--------|
//! | `lifecycle` | Mode selection and ordered resource acquisition |
//! | `dispatch` | Accept loop fan-out and failure reporting |
//! | `termination` | Three-way termination race and ordered shutdown |

pub mod mocks;

pub use mocks::{LogEntry, MockBackend, MockConn, MockDevice, MockListener, MockLog};
