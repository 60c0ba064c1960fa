// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Regguard lookup pipeline.
//!
//! [`Pipeline::process`] takes an untrusted target and either returns a
//! redacted, compliance-annotated [`FinalRecord`] or a
//! [`ClassifiedFailure`](regguard_core::ClassifiedFailure) with a stable code.
//! Build a pipeline with [`PipelineBuilder`].

pub mod admission;
pub mod builder;
pub mod compose;
pub mod endpoint;
pub mod fetch;
pub mod pipeline;
pub mod state;

pub use admission::Admission;
pub use builder::PipelineBuilder;
pub use compose::{ComplianceComposer, ComplianceMetadata, FinalRecord, RedactionLevel};
pub use endpoint::{RegistryDirectory, SelectedEndpoint};
pub use fetch::HttpsFetcher;
pub use pipeline::{Pipeline, PipelineReport, ProcessOptions};
pub use state::{PipelineState, StateMachine};
