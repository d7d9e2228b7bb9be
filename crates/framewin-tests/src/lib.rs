//! Integration test crate for FrameWin.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It drives framewin-media readers over framewin-core types through the
//! public API only.


#[cfg(test)]
mod reader;

#[cfg(test)]
mod generator;
