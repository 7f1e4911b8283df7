use std::path::Path;

/// Write `bytes` to `path` atomically (write to a sibling temp file, then
/// rename) with owner-only permissions (§4.8, §4.9: trust store and rate
/// limit snapshots both hold identity data and must not be world-readable).
pub fn write_private_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let tmp_path = tmp_sibling(path);
    std::fs::write(&tmp_path, bytes)?;
    set_owner_only(&tmp_path)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> std::path::PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> anyhow::Result<()> {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_enforces_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        write_private_file(&path, b"{}").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
