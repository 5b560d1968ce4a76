//! Collaborator contracts consumed by the orchestrators, with the default
//! host-local implementation of each.
//!
//! Orchestrators only see the traits. The default implementations are thin
//! and keep their state under the configured state directory.

pub mod acl;
pub mod credentials;
pub mod database;
pub mod docroot;
pub mod fetch;
pub mod lifecycle;
pub mod metadata;
pub mod notify;
pub mod process;
pub mod scheduler;

pub use acl::{AclEnforcer, FsAclEnforcer};
pub use credentials::{CredentialGenerator, RandomCredentialGenerator};
pub use database::{DatabaseProvisioner, MysqlProvisioner};
pub use docroot::{DocrootResolver, MappedDocrootResolver};
pub use fetch::{ArtifactFetcher, HttpArtifactFetcher};
pub use lifecycle::{ApplicationLifecycle, GenericLifecycle};
pub use metadata::{FileMetadataStore, MetadataStore};
pub use notify::{Notifier, OutboxNotifier};
pub use process::{ProcessOutput, ProcessRequest, ProcessRunner, ShellProcessRunner};
pub use scheduler::{FileScheduler, Scheduler};
