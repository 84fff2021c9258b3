//! Host detection.
//!
//! Classification works on two inputs: the kernel release string and the
//! contents of `/proc/cpuinfo`. Both are parsed by pure functions so the
//! rules can be tested without the hardware; [`detect_host`] only gathers
//! the inputs from the running system.

use std::path::Path;

use tracing::debug;

use crate::consts::{CPUINFO_PATH, MIN_KERNEL_VERSION};
use crate::error::{HalError, HalResult};
use crate::host::Host;

// ─── Kernel version ─────────────────────────────────────────────────

/// Parsed kernel release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KernelVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch level (0 when absent)
    pub patch: u32,
}

impl KernelVersion {
    /// Whether this kernel meets [`MIN_KERNEL_VERSION`].
    pub fn is_supported(&self) -> bool {
        (self.major, self.minor) >= MIN_KERNEL_VERSION
    }
}

/// Parse a release string such as `3.8.13-bone30` or `4.1.7+`.
///
/// Anything after the first `-` is ignored, the patch level is optional and
/// may carry a trailing `+`.
pub fn parse_kernel_version(release: &str) -> HalResult<KernelVersion> {
    let err = || HalError::KernelVersionParse {
        input: release.to_string(),
    };

    let number = release.trim().split('-').next().unwrap_or_default();
    let mut parts = number.split('.');

    let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
    let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
    let patch = match parts.next() {
        Some(p) => p.trim_end_matches('+').parse().map_err(|_| err())?,
        None => 0,
    };

    Ok(KernelVersion {
        major,
        minor,
        patch,
    })
}

// ─── /proc/cpuinfo ──────────────────────────────────────────────────

/// Fields of `/proc/cpuinfo` used for classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuInfo {
    /// `model name`
    pub model: String,
    /// `Hardware`
    pub hardware: String,
    /// `Revision`, parsed as hexadecimal (0 when absent or malformed)
    pub revision: u32,
}

impl CpuInfo {
    /// Parse the text of `/proc/cpuinfo`.
    ///
    /// Keys are matched by prefix and values are trimmed. The last occurrence
    /// of a key wins, which matters on multi-core boards that repeat
    /// `model name` per processor.
    pub fn parse(text: &str) -> Self {
        let mut info = Self::default();

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            if key.starts_with("Revision") {
                if let Ok(rev) = u32::from_str_radix(value, 16) {
                    info.revision = rev;
                }
            } else if key.starts_with("Hardware") {
                info.hardware = value.to_string();
            } else if key.starts_with("model name") {
                info.model = value.to_string();
            }
        }

        info
    }
}

// ─── Classification ─────────────────────────────────────────────────

/// Classify a board from its kernel version and cpuinfo.
///
/// Returns the host together with its board revision.
pub fn classify(kernel: KernelVersion, cpu: &CpuInfo) -> HalResult<(Host, u32)> {
    if !kernel.is_supported() {
        return Err(HalError::UnsupportedKernel {
            major: kernel.major,
            minor: kernel.minor,
            patch: kernel.patch,
        });
    }

    let hw = cpu.hardware.as_str();
    let host = if cpu.model.contains("ARMv7") && (hw.contains("AM33XX") || hw.contains("AM335X")) {
        Host::BeagleBoneBlack
    } else if ["BCM2708", "BCM2709", "BCM2835", "BCM2836"]
        .iter()
        .any(|soc| hw.contains(soc))
    {
        Host::RaspberryPi
    } else {
        return Err(HalError::UnsupportedHardware {
            model: cpu.model.clone(),
            hardware: cpu.hardware.clone(),
        });
    };

    Ok((host, cpu.revision))
}

// ─── OS shim ────────────────────────────────────────────────────────

/// Running kernel release string.
pub fn kernel_release() -> HalResult<String> {
    let uts = nix::sys::utsname::uname()?;
    Ok(uts.release().to_string_lossy().into_owned())
}

/// Read and parse a cpuinfo file.
pub fn read_cpuinfo(path: &Path) -> HalResult<CpuInfo> {
    let text = std::fs::read_to_string(path).map_err(|e| HalError::sysfs(path, e))?;
    Ok(CpuInfo::parse(&text))
}

/// Detect the running host and its revision.
pub fn detect_host() -> HalResult<(Host, u32)> {
    let release = kernel_release()?;
    let kernel = parse_kernel_version(&release)?;
    if !kernel.is_supported() {
        return classify(kernel, &CpuInfo::default());
    }

    let cpu = read_cpuinfo(Path::new(CPUINFO_PATH))?;
    debug!(
        "Detecting host: kernel={}, model={:?}, hardware={:?}, revision={:#x}",
        release, cpu.model, cpu.hardware, cpu.revision
    );
    classify(kernel, &cpu)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BBB_CPUINFO: &str = "processor\t: 0\n\
        model name\t: ARMv7 Processor rev 2 (v7l)\n\
        BogoMIPS\t: 995.32\n\
        Hardware\t: Generic AM33XX (Flattened Device Tree)\n\
        Revision\t: 0000\n";

    const RPI_CPUINFO: &str = "processor\t: 0\n\
        model name\t: ARMv6-compatible processor rev 7 (v6l)\n\
        Hardware\t: BCM2708\n\
        Revision\t: 000e\n\
        Serial\t\t: 00000000deadbeef\n";

    #[test]
    fn test_kernel_version_parse() {
        let cases = [
            ("3.8.2", (3, 8, 2)),
            ("3.8.10+", (3, 8, 10)),
            ("3.8.13-bone30", (3, 8, 13)),
            ("4.1", (4, 1, 0)),
            ("5.10.103-v7l+", (5, 10, 103)),
        ];
        for (input, (major, minor, patch)) in cases {
            let v = parse_kernel_version(input).unwrap();
            assert_eq!((v.major, v.minor, v.patch), (major, minor, patch), "{input}");
        }
    }

    #[test]
    fn test_kernel_version_parse_rejects_garbage() {
        for input in ["", "linux", "3", "3.x.1", "3.8.y"] {
            assert!(
                matches!(parse_kernel_version(input), Err(HalError::KernelVersionParse { .. })),
                "{input:?} should not parse"
            );
        }
    }

    #[test]
    fn test_kernel_support_threshold() {
        let v = |major, minor| KernelVersion { major, minor, patch: 0 };
        assert!(!v(2, 6).is_supported());
        assert!(!v(3, 7).is_supported());
        assert!(v(3, 8).is_supported());
        assert!(v(4, 0).is_supported());
    }

    #[test]
    fn test_cpuinfo_parse() {
        let cpu = CpuInfo::parse(RPI_CPUINFO);
        assert_eq!(cpu.hardware, "BCM2708");
        assert_eq!(cpu.revision, 0xe);
        assert!(cpu.model.starts_with("ARMv6"));
    }

    #[test]
    fn test_classify_boards() {
        let kernel = parse_kernel_version("3.8.13").unwrap();

        let (host, rev) = classify(kernel, &CpuInfo::parse(BBB_CPUINFO)).unwrap();
        assert_eq!(host, Host::BeagleBoneBlack);
        assert_eq!(rev, 0);

        let (host, rev) = classify(kernel, &CpuInfo::parse(RPI_CPUINFO)).unwrap();
        assert_eq!(host, Host::RaspberryPi);
        assert_eq!(rev, 0xe);
    }

    #[test]
    fn test_classify_unsupported_kernel() {
        let kernel = parse_kernel_version("3.2.0").unwrap();
        let result = classify(kernel, &CpuInfo::parse(RPI_CPUINFO));
        assert!(matches!(
            result,
            Err(HalError::UnsupportedKernel { major: 3, minor: 2, .. })
        ));
    }

    #[test]
    fn test_classify_unknown_hardware() {
        let kernel = parse_kernel_version("5.15.0").unwrap();
        let cpu = CpuInfo {
            model: "Intel(R) Core(TM) i7".to_string(),
            hardware: String::new(),
            revision: 0,
        };
        let err = classify(kernel, &cpu).unwrap_err();
        assert!(matches!(err, HalError::UnsupportedHardware { .. }));
        assert!(err.to_string().contains("i7"));
    }

    #[test]
    fn test_read_cpuinfo_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BBB_CPUINFO.as_bytes()).unwrap();
        file.flush().unwrap();

        let cpu = read_cpuinfo(file.path()).unwrap();
        assert!(cpu.hardware.contains("AM33XX"));
    }
}
