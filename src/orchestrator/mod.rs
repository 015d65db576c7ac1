//! Orchestrator for per-version sandbox containers.
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                    Harness                       │
//! │   one task per version, joined before exit       │
//! │                                                  │
//! │   LifecycleController (per version)              │
//! │     pull image        ── ContainerRuntime        │
//! │     assign port       ── PortAllocator           │
//! │     create + start    ── ContainerRuntime        │
//! │     poll /_node/stats ── JsonFetcher             │
//! │     fetch + write     ── JsonFetcher, Writer     │
//! │     stop + remove     ── ContainerRuntime        │
//! │                                                  │
//! │   Cancellation                                   │
//! │     per-version deadline + run-wide shutdown     │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod cancel;
pub mod harness;
pub mod lifecycle;
pub mod ports;
pub mod runtime;

pub use cancel::{Cancellation, ShutdownSignal};
pub use harness::{Harness, summarize};
pub use lifecycle::{
    HarvestedFiles, LifecycleController, LifecycleReport, LifecycleState, SandboxInstance,
    TeardownOutcome, poll_until_ready,
};
pub use ports::PortAllocator;
pub use runtime::{ContainerRuntime, DockerRuntime, InstanceSpec, connect_docker};
