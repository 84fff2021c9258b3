//! Small helpers for sysfs attribute files.
//!
//! Attribute files are read and written at offset 0 with `pread`/`pwrite`,
//! so a file can stay open for the lifetime of a handle without seeking.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use embr_common::error::{HalError, HalResult};

/// Open an attribute for reading and writing.
pub(crate) fn open_rw(path: &Path) -> HalResult<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| HalError::sysfs(path, e))
}

/// Open an attribute read-only.
pub(crate) fn open_ro(path: &Path) -> HalResult<File> {
    File::open(path).map_err(|e| HalError::sysfs(path, e))
}

/// Read the whole attribute from offset 0.
pub(crate) fn read_all(file: &File, path: &Path) -> HalResult<String> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        let n = file
            .read_at(&mut chunk, out.len() as u64)
            .map_err(|e| HalError::sysfs(path, e))?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Read the whole attribute and trim surrounding whitespace.
pub(crate) fn read_trimmed(file: &File, path: &Path) -> HalResult<String> {
    Ok(read_all(file, path)?.trim().to_string())
}

/// Overwrite an open attribute.
pub(crate) fn write_at_start(file: &File, path: &Path, value: &str) -> HalResult<()> {
    file.write_all_at(value.as_bytes(), 0)
        .map_err(|e| HalError::sysfs(path, e))
}

/// One-shot write to an attribute (`export`, `direction`, ...).
pub(crate) fn write_attr(path: &Path, value: &str) -> HalResult<()> {
    fs::write(path, value).map_err(|e| HalError::sysfs(path, e))
}

/// Parse a trimmed attribute as a number.
pub(crate) fn parse_attr<T: std::str::FromStr>(text: &str, path: &Path) -> HalResult<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    text.parse()
        .map_err(|e| HalError::sysfs(path, io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Find `<root>/<a*>/<b*>/.../<leaf>`, taking the first match in name order
/// at every level.
pub(crate) fn find_first_matching(root: &Path, prefixes: &[&str], leaf: &str) -> HalResult<PathBuf> {
    let mut dirs = vec![root.to_path_buf()];
    for prefix in prefixes {
        let mut next = Vec::new();
        for dir in &dirs {
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            let mut matched: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
                .map(|e| e.path())
                .collect();
            matched.sort();
            next.extend(matched);
        }
        dirs = next;
    }

    dirs.into_iter()
        .map(|dir| dir.join(leaf))
        .find(|path| path.exists())
        .ok_or_else(|| {
            let pattern = prefixes
                .iter()
                .fold(root.to_path_buf(), |p, prefix| p.join(format!("{prefix}*")))
                .join(leaf);
            HalError::sysfs(pattern, io::Error::from(io::ErrorKind::NotFound))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_write_at_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("value");
        fs::write(&path, "0\n").unwrap();
        let file = open_rw(&path).unwrap();
        write_at_start(&file, &path, "1").unwrap();
        assert_eq!(read_trimmed(&file, &path).unwrap(), "1");
    }

    #[test]
    fn test_find_first_matching_orders_by_name() {
        let dir = TempDir::new().unwrap();
        for sub in ["ocp.3/helper.15", "ocp.2/helper.14", "ocp.2/other.1"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        fs::write(dir.path().join("ocp.3/helper.15/AIN0"), "1").unwrap();
        fs::write(dir.path().join("ocp.2/helper.14/AIN0"), "2").unwrap();

        let found = find_first_matching(dir.path(), &["ocp.", "helper."], "AIN0").unwrap();
        assert_eq!(found, dir.path().join("ocp.2/helper.14/AIN0"));
        assert!(find_first_matching(dir.path(), &["ocp.", "helper."], "AIN7").is_err());
    }

    #[test]
    fn test_parse_attr_reports_path() {
        let err = parse_attr::<u32>("abc", Path::new("/sys/x")).unwrap_err();
        assert!(err.to_string().contains("/sys/x"));
    }
}
