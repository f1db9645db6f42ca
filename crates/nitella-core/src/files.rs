//! Small filesystem helpers with explicit Unix modes.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Create `dir` (and parents) and restrict it to `mode` on Unix.
pub(crate) fn create_dir_with_mode(dir: &Path, mode: u32) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    set_mode(dir, mode)
}

/// Write `data` to `path` through `<name>.tmp` and rename, then apply
/// `mode`. The temp file is removed if any step fails.
pub(crate) fn write_with_mode(path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
    let temp_path = temp_path_for(path);
    let result = write_temp(&temp_path, data, mode).and_then(|()| fs::rename(&temp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_temp(temp_path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
    let mut file = fs::File::create(temp_path)?;
    set_mode(temp_path, mode)?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(mode);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
