// Physical device selection
//
// Responsibilities:
// - Enumerate the GPUs visible to the instance
// - Snapshot the properties/features we care about into `DeviceInfo`
// - Pick the first device that satisfies `DeviceRequirements`
//
// The decision itself works on plain snapshots so it never needs a GPU.

use ash::vk;
use std::ffi::CStr;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("failed to enumerate physical devices: {0}")]
    Enumerate(#[from] vk::Result),
    #[error("failed to find GPUs with Vulkan support")]
    NoDevices,
    #[error("failed to find a suitable GPU (candidates: {})", .candidates.join(", "))]
    NoSuitableDevice { candidates: Vec<String> },
}

/// Physical device categories, mirroring `VkPhysicalDeviceType`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Integrated,
    Discrete,
    Virtual,
    Cpu,
    Other,
}

impl From<vk::PhysicalDeviceType> for DeviceKind {
    fn from(ty: vk::PhysicalDeviceType) -> Self {
        match ty {
            vk::PhysicalDeviceType::INTEGRATED_GPU => DeviceKind::Integrated,
            vk::PhysicalDeviceType::DISCRETE_GPU => DeviceKind::Discrete,
            vk::PhysicalDeviceType::VIRTUAL_GPU => DeviceKind::Virtual,
            vk::PhysicalDeviceType::CPU => DeviceKind::Cpu,
            _ => DeviceKind::Other,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceKind::Integrated => "Integrated GPU",
            DeviceKind::Discrete => "Discrete GPU",
            DeviceKind::Virtual => "Virtual GPU",
            DeviceKind::Cpu => "CPU",
            DeviceKind::Other => "Other",
        };
        f.write_str(name)
    }
}

/// Which device types are acceptable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFilter {
    Any,
    Only(DeviceKind),
}

impl DeviceFilter {
    /// Parse a config value. Returns `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        let filter = match name.trim().to_lowercase().as_str() {
            "any" => DeviceFilter::Any,
            "integrated" => DeviceFilter::Only(DeviceKind::Integrated),
            "discrete" => DeviceFilter::Only(DeviceKind::Discrete),
            "virtual" => DeviceFilter::Only(DeviceKind::Virtual),
            "cpu" => DeviceFilter::Only(DeviceKind::Cpu),
            "other" => DeviceFilter::Only(DeviceKind::Other),
            _ => return None,
        };
        Some(filter)
    }

    fn accepts(&self, kind: DeviceKind) -> bool {
        match self {
            DeviceFilter::Any => true,
            DeviceFilter::Only(wanted) => *wanted == kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRequirements {
    pub device_type: DeviceFilter,
    pub geometry_shader: bool,
}

impl Default for DeviceRequirements {
    /// Integrated GPU with geometry shader support
    fn default() -> Self {
        Self {
            device_type: DeviceFilter::Only(DeviceKind::Integrated),
            geometry_shader: true,
        }
    }
}

/// The parts of a physical device's properties and features that
/// selection looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub kind: DeviceKind,
    pub api_version: u32,
    pub vendor_id: u32,
    pub geometry_shader: bool,
}

impl DeviceInfo {
    pub fn new(
        properties: &vk::PhysicalDeviceProperties,
        features: &vk::PhysicalDeviceFeatures,
    ) -> Self {
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        Self {
            name,
            kind: properties.device_type.into(),
            api_version: properties.api_version,
            vendor_id: properties.vendor_id,
            geometry_shader: features.geometry_shader != vk::FALSE,
        }
    }

    fn query(instance: &ash::Instance, device: vk::PhysicalDevice) -> Self {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        Self::new(&properties, &features)
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, Vulkan {}.{}.{})",
            self.name,
            self.kind,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
        )
    }
}

pub fn is_device_suitable(info: &DeviceInfo, requirements: &DeviceRequirements) -> bool {
    requirements.device_type.accepts(info.kind)
        && (info.geometry_shader || !requirements.geometry_shader)
}

/// Index of the first suitable device in enumeration order
pub fn select_device(candidates: &[DeviceInfo], requirements: &DeviceRequirements) -> Option<usize> {
    candidates
        .iter()
        .position(|info| is_device_suitable(info, requirements))
}

/// The physical device chosen for this run
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub handle: vk::PhysicalDevice,
    pub info: DeviceInfo,
}

pub fn pick_physical_device(
    instance: &ash::Instance,
    requirements: &DeviceRequirements,
) -> Result<SelectedDevice, SelectionError> {
    let devices = unsafe { instance.enumerate_physical_devices() }?;
    log::info!("Found {} devices", devices.len());

    if devices.is_empty() {
        return Err(SelectionError::NoDevices);
    }

    let candidates: Vec<DeviceInfo> = devices
        .iter()
        .map(|&device| DeviceInfo::query(instance, device))
        .collect();

    for info in &candidates {
        log::debug!("  {}", info);
    }

    match select_device(&candidates, requirements) {
        Some(index) => {
            let info = candidates[index].clone();
            log::info!("Using device: {}", info);
            Ok(SelectedDevice {
                handle: devices[index],
                info,
            })
        }
        None => {
            log::error!(
                "No device matches {:?}; candidates were {:?}",
                requirements,
                candidates
            );
            Err(SelectionError::NoSuitableDevice {
                candidates: candidates.iter().map(ToString::to_string).collect(),
            })
        }
    }
}
