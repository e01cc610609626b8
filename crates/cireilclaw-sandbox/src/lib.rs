//! Filesystem and command sandboxing for agent tool calls.
//!
//! Two independent layers:
//! - [`resolver`]: maps virtual paths (`/workspace/...`, `/memories/...`, ...)
//!   to real paths, rejecting any attempt to escape the agent's root.
//! - [`jail`]: runs a single allowlisted command in a fresh set of Linux
//!   namespaces, with [`safety`] as a defense-in-depth precheck in front of it.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use cireilclaw_sandbox::jail::{self, ExecRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let request = ExecRequest {
//!         command: "echo".into(),
//!         args: vec!["hello".into()],
//!         allowed_binaries: vec!["echo".into()],
//!         timeout_ms: 5_000,
//!         agent_slug: "demo".into(),
//!         agent_root: "/home/demo/.cireilclaw/agents/demo".into(),
//!     };
//!     let output = jail::run(request).await.unwrap();
//!     println!("{}", output.stdout);
//! }
//! ```

pub mod error;
pub mod jail;
#[cfg(target_os = "linux")]
mod mounts;
pub mod resolver;
pub mod safety;

pub use error::{AccessDenied, Result, SandboxError};
pub use jail::{ExecOutput, ExecRequest};
