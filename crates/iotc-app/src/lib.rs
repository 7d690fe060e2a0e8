//! # ML audio demo application
//!
//! Device-side glue around the transfer engine: cloud commands start OTA
//! downloads and adjust detection tunables, classifier results become
//! telemetry reports, and labelled samples are uploaded for retraining.
//!
//! Platform pieces come in through traits: [`iotc_transfer::Transport`] for
//! the TLS socket, [`iotc_transfer::OtaSink`] for the image slot, and
//! [`domain::ports`] for the key-value store and the MQTT agent.

#![no_std]

pub mod certs;
pub mod config;
pub mod controllers;
pub mod domain;
pub mod infrastructure;
