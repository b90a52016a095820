//! Vulkan instance and validation layer wiring.
//!
//! [`Instance`] owns the `VkInstance` plus the optional debug messenger that
//! forwards validation-layer output into `tracing`. Surface extensions are
//! supplied by the windowing layer rather than hardcoded per platform, so the
//! same constructor serves windowed and headless use.
//!
//! # Example
//!
//! ```no_run
//! use aurora_rhi::instance::Instance;
//!
//! // An empty extension list produces a headless instance.
//! let instance = Instance::new(cfg!(debug_assertions), &[])?;
//! # Ok::<(), aurora_rhi::RhiError>(())
//! ```

use std::ffi::CStr;

use ash::{Entry, vk};
use tracing::{error, info, warn};

use crate::error::RhiError;

const KHRONOS_VALIDATION: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Owns the Vulkan entry point, the instance, and the debug messenger.
///
/// Dropping the instance destroys the messenger first, then the instance
/// itself.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug: Option<DebugMessenger>,
}

/// Loader/handle pair for the `VK_EXT_debug_utils` messenger.
struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl Instance {
    /// Creates the Vulkan instance.
    ///
    /// `surface_extensions` is the list returned by
    /// `ash_window::enumerate_required_extensions` (or empty for headless
    /// use). When `enable_validation` is set and the Khronos validation
    /// layer is installed, the layer is enabled and a debug messenger routes
    /// its output to the log; when the layer is missing, creation proceeds
    /// without it and a warning is emitted.
    ///
    /// # Errors
    ///
    /// Fails when the Vulkan loader cannot be found, when layer enumeration
    /// fails, or when instance or messenger creation is refused by the
    /// driver.
    pub fn new(
        enable_validation: bool,
        surface_extensions: &[*const i8],
    ) -> Result<Self, RhiError> {
        let entry = unsafe { Entry::load()? };

        let use_validation = enable_validation && validation_layer_present(&entry)?;
        if enable_validation && !use_validation {
            warn!("Khronos validation layer not installed; running without validation");
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"Aurora")
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Aurora")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_1);

        let mut extensions = surface_extensions.to_vec();
        let mut layers = Vec::new();
        if use_validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
            layers.push(KHRONOS_VALIDATION.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };
        info!(
            validation = use_validation,
            "Vulkan 1.1 instance created"
        );

        let debug = if use_validation {
            Some(DebugMessenger::install(&entry, &instance)?)
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug,
        })
    }

    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// True when the validation layer was actually enabled.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug.is_some()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some(debug) = self.debug.take() {
                debug
                    .loader
                    .destroy_debug_utils_messenger(debug.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

impl DebugMessenger {
    /// Registers [`forward_to_tracing`] for warning and error messages of
    /// every message type.
    fn install(entry: &Entry, instance: &ash::Instance) -> Result<Self, RhiError> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(forward_to_tracing));

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
        Ok(Self { loader, messenger })
    }
}

/// Checks whether the Khronos validation layer can be enabled.
fn validation_layer_present(entry: &Entry) -> Result<bool, RhiError> {
    let layers = unsafe { entry.enumerate_instance_layer_properties()? };
    let wanted = KHRONOS_VALIDATION.to_bytes();

    Ok(layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name.to_bytes() == wanted
    }))
}

/// Validation-layer callback; maps severities onto `tracing` levels.
///
/// # Safety
///
/// Invoked by the driver with the pointer contract described in the Vulkan
/// spec for `PFN_vkDebugUtilsMessengerCallbackEXT`.
unsafe extern "system" fn forward_to_tracing(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }

    let data = unsafe { &*data };
    let message = if data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(data.p_message).to_string_lossy() }
    };

    let kind = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    };

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(kind, "{message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(kind, "{message}");
    } else {
        info!(kind, "{message}");
    }

    // VK_FALSE tells the layer not to abort the offending call.
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Creating an instance needs a Vulkan loader and driver on the
    /// machine; return `None` instead of failing when there is none.
    fn try_create(validation: bool) -> Option<Instance> {
        match Instance::new(validation, &[]) {
            Ok(instance) => Some(instance),
            Err(e) => {
                eprintln!("no usable Vulkan ({e}); skipping");
                None
            }
        }
    }

    #[test]
    fn test_headless_instance_has_no_validation() {
        if let Some(instance) = try_create(false) {
            assert!(!instance.has_validation());
        }
    }

    #[test]
    fn test_validation_request_is_best_effort() {
        // The layer may or may not be installed; either way creation must
        // succeed and has_validation must reflect what happened.
        if let Some(instance) = try_create(true) {
            assert_eq!(instance.has_validation(), instance.debug.is_some());
        }
    }
}
