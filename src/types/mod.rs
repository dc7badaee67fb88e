mod artifact;
mod file;
mod manifest;
mod quarantine;
mod registry;
mod tag;
mod version;

pub use self::artifact::Artifact;
pub use self::file::FileNode;
pub use self::manifest::ManifestRow;
pub use self::quarantine::{QuarantineInfo, QuarantineKey};
pub use self::registry::{PackageType, Registry, RegistryKind};
pub use self::tag::TagRow;
pub use self::version::VersionRecord;
