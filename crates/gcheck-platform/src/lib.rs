//! # GoodCheck Platform
//!
//! Operating-system facing parts of GoodCheck: probe backends, target
//! resolvers, executable discovery and control of the fooling program's
//! processes and services.
//!
//! Everything here implements a capability defined in `gcheck-core`:
//!
//! | Capability | Implementations |
//! |------------|-----------------|
//! | [`ProbeBackend`](gcheck_core::ProbeBackend) | [`NativeBackend`], [`CurlBackend`] |
//! | [`TargetResolver`](gcheck_core::TargetResolver) | [`DohResolver`], [`SystemResolver`] |
//! | [`LifecycleController`](gcheck_core::LifecycleController) | [`ProcessController`] |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod discover;
pub mod dns_wire;
pub mod error;
pub mod net;
pub mod probe;
pub mod process;
pub mod resolver;

pub use error::{PlatformError, Result};
pub use probe::{CurlBackend, NativeBackend, ProbeOptions};
pub use process::{ProcessController, RunningProgram};
pub use resolver::{select_doh_resolver, DohResolver, SystemResolver};
