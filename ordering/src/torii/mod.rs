// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

//! Client-facing surface: the transaction status bus, the command
//! service behind the Torii endpoints, and the processor translating
//! pipeline progress into status publications.

pub mod command_service;
pub mod status_bus;
pub mod status_processor;

pub use command_service::CommandService;
pub use status_bus::StatusBus;
pub use status_processor::{run_status_processor, StatusStreams};
