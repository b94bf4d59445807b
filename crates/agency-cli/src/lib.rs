//! Library half of the agency CLI, shared by the binary and its tests.

pub mod smoke;
