//! Crumbtrail Core - Domain types, configuration and ports
//!
//! This crate contains the pure half of the telemetry engine:
//! - **Domain entities** - `Breadcrumb`, `ErrorInfo`, `Payload`, `DomEvent`, `ThrownValue`
//! - **Configuration** - `TelemetryConfig` with defaults, validation and a builder
//! - **Port definitions** - Traits the host implements: `Clock`, `ReportTransport`,
//!   `ErrorSource`, `PerformanceSource`, `FrameSource`
//!
//! # Architecture
//!
//! The domain module has no knowledge of any particular host. Ports describe
//! the capabilities the engine needs from its environment (time, network,
//! error signals, performance signals, render frames) so that browser glue,
//! native shells and tests can all drive the same engine.

pub mod config;
pub mod domain;
pub mod ports;
