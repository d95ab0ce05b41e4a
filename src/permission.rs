use anyhow::{Context, Result};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Whether the current user may open `device` for capture.
pub fn camera_access_granted(device: &Path) -> Result<bool> {
    let c_path = CString::new(device.as_os_str().as_bytes())
        .with_context(|| format!("invalid device path {}", device.display()))?;
    let ret = unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) };
    Ok(ret == 0)
}

/// Fail unless the camera can be opened; capture must not start otherwise.
pub fn ensure_camera_access(device: &Path) -> Result<()> {
    if camera_access_granted(device)? {
        return Ok(());
    }
    let reason = std::io::Error::last_os_error();
    anyhow::bail!(
        "no access to camera {} ({}). Add your user to the 'video' group or check the device path.",
        device.display(),
        reason
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_not_granted() -> Result<()> {
        assert!(!camera_access_granted(Path::new("/dev/emolens-no-such-camera"))?);
        assert!(ensure_camera_access(Path::new("/dev/emolens-no-such-camera")).is_err());
        Ok(())
    }

    #[test]
    fn test_own_file_is_granted() -> Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        assert!(camera_access_granted(file.path())?);
        Ok(())
    }

    #[test]
    fn test_interior_nul_is_rejected() {
        assert!(camera_access_granted(Path::new("/dev/vid\0eo0")).is_err());
    }
}
