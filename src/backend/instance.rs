// Vulkan Instance - entry point into the driver
//
// Responsibilities:
// - Load the Vulkan library
// - Work out which instance extensions the window system needs
// - Check extensions and validation layers against what the loader offers
// - Create the instance (+ debug messenger when validation is enabled)
// - Destroy both in the right order on drop

use ash::extensions::{ext, khr};
use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString, NulError};
use thiserror::Error;

use super::debug;

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),
    #[error("no Vulkan surface extension for display handle {0}")]
    UnsupportedDisplay(String),
    #[error("missing required instance extensions: {0:?}")]
    MissingExtensions(Vec<String>),
    #[error("application or engine name contains a NUL byte")]
    InvalidName(#[from] NulError),
    #[error("failed to create Vulkan instance: {0}")]
    Vulkan(#[from] vk::Result),
}

/// Everything needed to describe the instance we want
#[derive(Debug, Clone)]
pub struct InstanceSettings {
    pub application_name: String,
    pub engine_name: String,
    pub api_version: u32,
    pub validation: bool,
    pub verbose_validation: bool,
}

/// Surface extensions the window system needs to present
pub fn surface_extensions(display: RawDisplayHandle) -> Result<Vec<&'static CStr>, InstanceError> {
    let platform = match display {
        RawDisplayHandle::Windows(_) => khr::Win32Surface::name(),
        RawDisplayHandle::Xlib(_) => khr::XlibSurface::name(),
        RawDisplayHandle::Xcb(_) => khr::XcbSurface::name(),
        RawDisplayHandle::Wayland(_) => khr::WaylandSurface::name(),
        RawDisplayHandle::AppKit(_) | RawDisplayHandle::UiKit(_) => ext::MetalSurface::name(),
        RawDisplayHandle::Android(_) => khr::AndroidSurface::name(),
        other => return Err(InstanceError::UnsupportedDisplay(format!("{:?}", other))),
    };
    Ok(vec![khr::Surface::name(), platform])
}

/// Names in `required` that `available` does not contain
pub fn missing_names(available: &[CString], required: &[&CStr]) -> Vec<String> {
    required
        .iter()
        .filter(|name| !available.iter().any(|have| have.as_c_str() == **name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

fn available_extensions(entry: &Entry) -> Result<Vec<CString>, InstanceError> {
    let properties = entry.enumerate_instance_extension_properties(None)?;
    Ok(properties
        .iter()
        .map(|p| unsafe { CStr::from_ptr(p.extension_name.as_ptr()) }.to_owned())
        .collect())
}

fn available_layers(entry: &Entry) -> Result<Vec<CString>, InstanceError> {
    let properties = entry.enumerate_instance_layer_properties()?;
    Ok(properties
        .iter()
        .map(|p| unsafe { CStr::from_ptr(p.layer_name.as_ptr()) }.to_owned())
        .collect())
}

/// Final extension/layer lists after checking what the loader offers
#[derive(Debug, PartialEq, Eq)]
pub struct InstanceLayout {
    pub extensions: Vec<&'static CStr>,
    pub layers: Vec<&'static CStr>,
    pub flags: vk::InstanceCreateFlags,
    pub validation: bool,
}

impl InstanceLayout {
    /// Validation silently degrades to "off" when the layer or the
    /// debug-utils extension is missing. Surface extensions are mandatory.
    pub fn resolve(
        surface: &[&'static CStr],
        available_extensions: &[CString],
        available_layers: &[CString],
        validation: bool,
    ) -> Result<Self, InstanceError> {
        let missing = missing_names(available_extensions, surface);
        if !missing.is_empty() {
            log::error!("Missing required instance extensions: {:?}", missing);
            return Err(InstanceError::MissingExtensions(missing));
        }

        let mut extensions = surface.to_vec();
        let mut layers = Vec::new();
        let mut flags = vk::InstanceCreateFlags::empty();

        let validation = validation && {
            let has_layer = missing_names(available_layers, &[debug::VALIDATION_LAYER]).is_empty();
            let has_debug_utils =
                missing_names(available_extensions, &[ext::DebugUtils::name()]).is_empty();
            if !has_layer {
                log::warn!("Validation requested but {:?} is not installed", debug::VALIDATION_LAYER);
            } else if !has_debug_utils {
                log::warn!("Validation requested but {:?} is unavailable", ext::DebugUtils::name());
            }
            has_layer && has_debug_utils
        };

        if validation {
            extensions.push(ext::DebugUtils::name());
            layers.push(debug::VALIDATION_LAYER);
        }

        // MoltenVK only shows up when portability enumeration is requested
        let portability = vk::KhrPortabilityEnumerationFn::name();
        if missing_names(available_extensions, &[portability]).is_empty() {
            extensions.push(portability);
            flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        }

        Ok(Self {
            extensions,
            layers,
            flags,
            validation,
        })
    }
}

/// Vulkan instance wrapper with automatic cleanup
pub struct VulkanInstance {
    // Destroyed before the instance
    debug_utils: Option<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
    pub instance: ash::Instance,
    _entry: Entry,
}

impl VulkanInstance {
    /// Create the instance for a window living on `display`
    pub fn new(display: RawDisplayHandle, settings: &InstanceSettings) -> anyhow::Result<Self> {
        let entry = unsafe { Entry::load() }.map_err(InstanceError::from)?;
        Self::with_entry(entry, display, settings)
    }

    pub fn with_entry(
        entry: Entry,
        display: RawDisplayHandle,
        settings: &InstanceSettings,
    ) -> anyhow::Result<Self> {
        let instance_version = match entry.try_enumerate_instance_version()? {
            Some(version) => version,
            None => vk::API_VERSION_1_0,
        };
        log::info!(
            "Loader supports Vulkan {}.{}.{}",
            vk::api_version_major(instance_version),
            vk::api_version_minor(instance_version),
            vk::api_version_patch(instance_version)
        );

        let layout = InstanceLayout::resolve(
            &surface_extensions(display)?,
            &available_extensions(&entry)?,
            &available_layers(&entry)?,
            settings.validation,
        )?;
        log::debug!("Instance layout: {:?}", layout);

        let instance = Self::create_instance(&entry, settings, &layout)?;
        log::info!("Instance created");

        let debug_utils = if layout.validation {
            match debug::setup_debug_messenger(&entry, &instance, settings.verbose_validation) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            debug_utils,
            instance,
            _entry: entry,
        })
    }

    fn create_instance(
        entry: &Entry,
        settings: &InstanceSettings,
        layout: &InstanceLayout,
    ) -> Result<ash::Instance, InstanceError> {
        let app_name = CString::new(settings.application_name.as_str())?;
        let engine_name = CString::new(settings.engine_name.as_str())?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(settings.api_version);

        let extensions: Vec<_> = layout.extensions.iter().map(|name| name.as_ptr()).collect();
        let layers: Vec<_> = layout.layers.iter().map(|name| name.as_ptr()).collect();

        // Covers messages emitted during vkCreateInstance/vkDestroyInstance
        let mut debug_info = debug::messenger_create_info(settings.verbose_validation);

        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers)
            .flags(layout.flags);
        if layout.validation {
            create_info = create_info.push_next(&mut debug_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }?;
        Ok(instance)
    }

    pub fn validation_enabled(&self) -> bool {
        self.debug_utils.is_some()
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan instance...");

        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}
