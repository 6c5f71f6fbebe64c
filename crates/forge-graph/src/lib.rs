pub mod store;
pub mod types;

pub use store::{ArtifactGraph, DependencyTreeNode};
pub use types::{
    static_dependencies, ArtifactLink, ArtifactNode, LinkType, StalenessReport, UpstreamChange,
};
