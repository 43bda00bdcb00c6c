pub mod fnv;
pub mod fs_ops;
pub mod hash_map;
pub mod linked_list;
pub mod log;
pub mod serializer;
pub mod tree;

pub use fnv::{hash_bytes, hash_str};
pub use fs_ops::{ensure_working_dir, log_path, snapshot_path, RepoLock, DEFAULT_WORKING_DIR};
pub use hash_map::CheckpointMap;
pub use linked_list::CheckpointList;
pub use log::{CheckpointLog, FileListing};
pub use serializer::{read_log, write_log};
pub use tree::{CheckpointTreeNode, NodeRef};
