//! Installation bodies, one module per dependency.
//!
//! Steps are plain functions over a [`Context`](crate::context::Context);
//! version gating and ordering live in [`crate::pipeline`].

pub mod android;
pub mod boost;
pub mod cmake;
pub mod cuda;
pub mod ldflags;
pub mod llvm;
pub mod msdk;
pub mod rootfs;
pub mod webrtc;
