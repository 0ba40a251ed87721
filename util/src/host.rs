//! Host platform utility functions

use std::path::PathBuf;

/// Get the root directory of the software tree.
///
/// The root is read from the `KESTREL_SW_ROOT` environment variable, which
/// must point at the checkout containing the `params` and `sessions`
/// directories.
pub fn get_kestrel_sw_root() -> Result<PathBuf, std::env::VarError> {
    std::env::var("KESTREL_SW_ROOT").map(PathBuf::from)
}
