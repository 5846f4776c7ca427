//! Core types for the persistent program cache.

use thiserror::Error;

/// Identity of the target device a binary was compiled for.
///
/// Binaries are only valid for the exact device and driver that produced
/// them, so all four components participate in cache key derivation and
/// in the on-disk verification record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    /// Platform name (e.g. "Intel(R) OpenCL")
    pub platform_name: String,
    /// Device name (e.g. "Intel(R) Arc(TM) A770")
    pub device_name: String,
    /// Device version string
    pub device_version: String,
    /// Driver version string
    pub driver_version: String,
}

impl DeviceIdentity {
    /// Create a new device identity.
    pub fn new(
        platform_name: impl Into<String>,
        device_name: impl Into<String>,
        device_version: impl Into<String>,
        driver_version: impl Into<String>,
    ) -> Self {
        Self {
            platform_name: platform_name.into(),
            device_name: device_name.into(),
            device_version: device_version.into(),
            driver_version: driver_version.into(),
        }
    }

    /// Render the '/'-joined identity string used for hashing and for the
    /// source record.
    ///
    /// # Example
    ///
    /// ```
    /// use progcache::DeviceIdentity;
    ///
    /// let device = DeviceIdentity::new("ocl", "gpu0", "3.0", "24.1");
    /// assert_eq!(device.id_string(), "ocl/gpu0/3.0/24.1");
    /// ```
    pub fn id_string(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.platform_name, self.device_name, self.device_version, self.driver_version
        )
    }
}

/// Storage format of a device image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Format could not be determined.
    Unknown,
    /// Portable intermediate representation consumed by a JIT backend.
    SpirV,
    /// Device-specific binary produced by an offline compiler.
    Native,
    /// LLVM IR bitcode.
    LlvmIr,
}

impl ImageFormat {
    /// Whether binaries built from images of this format may be cached.
    ///
    /// Only portable IR and native binaries are supported; other formats
    /// go through lowering stages whose output is not reproducible from
    /// the image bytes alone.
    pub fn is_cacheable(self) -> bool {
        matches!(self, ImageFormat::SpirV | ImageFormat::Native)
    }
}

/// A device image: the compilation *input* consumed by the JIT or offline
/// compiler, not the compiled output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceImage {
    /// Storage format of the image bytes
    pub format: ImageFormat,
    /// Raw image bytes
    pub bytes: Vec<u8>,
}

impl DeviceImage {
    /// Create a new device image.
    pub fn new(format: ImageFormat, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            format,
            bytes: bytes.into(),
        }
    }

    /// Size of the image in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Cache key uniquely identifying a compiled program binary.
///
/// Two requests with byte-identical values for all four fields are the
/// same cache entry; any difference in any field is a different entry.
/// There is no normalization and no partial matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Target device and driver
    pub device: DeviceIdentity,
    /// Compilation input image
    pub image: DeviceImage,
    /// Serialized specialization constant values
    pub spec_constants: Vec<u8>,
    /// Build options passed to the compiler
    pub build_options: String,
}

impl CacheKey {
    /// Create a new cache key.
    pub fn new(
        device: DeviceIdentity,
        image: DeviceImage,
        spec_constants: impl Into<Vec<u8>>,
        build_options: impl Into<String>,
    ) -> Self {
        Self {
            device,
            image,
            spec_constants: spec_constants.into(),
            build_options: build_options.into(),
        }
    }
}

/// Cache-related errors.
///
/// These never escape the controller's public API: a failed store degrades
/// to a no-op and a failed fetch to a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored item failed to deserialize or its lengths are inconsistent
    #[error("corrupt cache entry: {0}")]
    CorruptEntry(String),
}
