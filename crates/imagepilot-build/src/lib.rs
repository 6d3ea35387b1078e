//! ImagePilot image build functionality
//!
//! This crate generates a Dockerfile from a base image and extra instructions,
//! packs the build context, builds the image through a container engine and
//! pushes it to a registry using locally stored or explicit credentials.

pub mod auth;
pub mod context;
pub mod docker;
pub mod dockerfile;
pub mod engine;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod progress;
pub mod reference;

pub use auth::{RegistryAuth, RegistryCredentials, decode_auth_header, encode_auth};
pub use context::ContextBuilder;
pub use docker::DockerEngine;
pub use dockerfile::{DOCKERFILE_NAME, DockerfileSpec, Instruction};
pub use engine::{BuildRequest, ImageEngine, PushRequest};
pub use error::{BuildError, BuildResult};
pub use events::{EngineError, EngineEvent, EventStream, decode_events, decode_slice};
pub use pipeline::{ImagePipeline, Phase, PipelineConfig};
pub use progress::{BuildProgress, PROGRESS_MAX};
pub use reference::{ImageRef, Registry};
