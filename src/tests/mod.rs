//! Fixtures shared by the unit tests of every module.

pub mod synthetic;
