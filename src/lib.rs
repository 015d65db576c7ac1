//! Harvest node API telemetry from one Logstash container per version.
//!
//! For every version in the versions file the harvester pulls the image,
//! starts a container on a free host port, waits for the node API, writes
//! `node-stats.json` and `node-info.json` under `<output>/<version>/`, and
//! removes the container again.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod telemetry;
