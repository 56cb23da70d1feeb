pub mod backing;
pub mod digest;
pub mod dist_info;
pub mod filetree;
pub mod layout;
pub mod localize;
pub mod manifest;
pub mod path;
pub mod path_safety;
pub mod progress;
pub mod record;
pub mod tree;
pub mod verify;

pub use backing::{BackingError, DirBacking, FileProvider, MappedZip, ZipBacking};
pub use dist_info::{BackedDistInfo, DistInfoDir, DistInfoProvider, InspectError, UnpackedWheel, WheelFile};
pub use manifest::Manifest;
pub use path::{PathError, PathType, PurePath};
pub use record::{FileRecord, RecordError};
pub use verify::{verify_file, verify_record, Discrepancy, VerifyOptions, VerifyReport};
