// Validation layer output -> `log`

use anyhow::{Context, Result};
use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use std::ffi::CStr;

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Map a Vulkan message severity onto a log level
pub fn log_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::Level::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::Level::Info
    } else {
        log::Level::Trace
    }
}

/// Most specific type bit wins
fn type_tag(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL) {
        "General"
    } else {
        "Unknown"
    }
}

/// Severities we subscribe to. WARNING and ERROR always, INFO and
/// VERBOSE only when asked for.
pub fn message_severity(verbose: bool) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    let mut severity =
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    if verbose {
        severity |= vk::DebugUtilsMessageSeverityFlagsEXT::INFO
            | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE;
    }
    severity
}

/// Create info shared by the persistent messenger and the one chained
/// into instance creation
pub fn messenger_create_info(verbose: bool) -> vk::DebugUtilsMessengerCreateInfoEXTBuilder<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(message_severity(verbose))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

pub fn setup_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
    verbose: bool,
) -> Result<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = DebugUtils::new(entry, instance);
    let create_info = messenger_create_info(verbose);

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
        .context("Failed to set up debug messenger")?;

    log::debug!("Debug messenger created");
    Ok((debug_utils, messenger))
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message);

    log::log!(
        target: "vulkan",
        log_level(message_severity),
        "[{}] {}",
        type_tag(message_type),
        message.to_string_lossy()
    );

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_mapping() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Sev;

        assert_eq!(log_level(Sev::ERROR), log::Level::Error);
        assert_eq!(log_level(Sev::WARNING), log::Level::Warn);
        assert_eq!(log_level(Sev::INFO), log::Level::Info);
        assert_eq!(log_level(Sev::VERBOSE), log::Level::Trace);
        assert_eq!(log_level(Sev::WARNING | Sev::ERROR), log::Level::Error);
    }

    #[test]
    fn type_tag_handles_combined_bits() {
        use vk::DebugUtilsMessageTypeFlagsEXT as Ty;

        assert_eq!(type_tag(Ty::GENERAL), "General");
        assert_eq!(type_tag(Ty::PERFORMANCE), "Performance");
        assert_eq!(type_tag(Ty::GENERAL | Ty::VALIDATION), "Validation");
        assert_eq!(type_tag(Ty::GENERAL | Ty::PERFORMANCE), "Performance");
        assert_eq!(type_tag(Ty::empty()), "Unknown");
    }

    #[test]
    fn verbose_widens_subscription() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Sev;

        let quiet = message_severity(false);
        assert!(quiet.contains(Sev::WARNING | Sev::ERROR));
        assert!(!quiet.intersects(Sev::INFO | Sev::VERBOSE));

        assert!(message_severity(true).contains(Sev::INFO | Sev::VERBOSE | Sev::WARNING | Sev::ERROR));
    }

    #[test]
    fn create_info_has_callback() {
        let info = messenger_create_info(false).build();
        assert!(info.pfn_user_callback.is_some());
        assert_eq!(info.message_severity, message_severity(false));
    }

    #[test]
    fn callback_forwards_and_returns_false() {
        let text = b"hello from the loader\0";
        let data = vk::DebugUtilsMessengerCallbackDataEXT {
            p_message: text.as_ptr() as *const std::os::raw::c_char,
            ..Default::default()
        };
        let ret = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
                vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
                &data,
                std::ptr::null_mut(),
            )
        };
        assert_eq!(ret, vk::FALSE);

        let ret = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
                std::ptr::null(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(ret, vk::FALSE);
    }
}
