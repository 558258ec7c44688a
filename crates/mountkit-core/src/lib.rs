//! # mountkit-core
//!
//! Mounts a data source (an archive, a disk image) through an external
//! FUSE helper running in the foreground, and tears it down again.
//!
//! - **Resolver**: finds the mount and unmount helpers on `PATH`.
//! - **Provisioner**: validates a caller's mount point or creates a
//!   temporary one.
//! - **Worker**: blocks on the helper process and cleans up when it exits.
//! - **Manager**: the public `mount` / `umount` / `is_mounted` contract,
//!   plus scoped acquisition through [`guard::MountGuard`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod command;
pub mod guard;
pub mod manager;
pub mod probe;
pub mod provision;
pub mod request;
pub mod resolver;
pub mod worker;

pub use guard::MountGuard;
pub use manager::MountManager;
pub use request::MountRequest;
