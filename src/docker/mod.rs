mod client;
mod compose;
mod containers;
mod context;
mod images;
mod target;

pub use client::{ConnectError, DockerClient};
pub use compose::{CommandOutput, ComposeService};
pub use containers::{ContainerService, ContainerSpec};
pub use images::ImageService;
pub use target::{ConnectionTarget, DockerEnv};
