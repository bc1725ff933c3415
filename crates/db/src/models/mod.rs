//! Typed rows of the tables the control plane touches.

pub mod account;
pub mod upload;
