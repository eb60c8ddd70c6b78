//! Loader configuration constants

/// Banner shown at startup and by the `info` command.
pub const BANNER: &str = concat!("oxboot ", env!("CARGO_PKG_VERSION"), " \u{2022} UEFI x86_64");

/// Default UAPI Type #1 entry booted by the `linux` command when no
/// path is given.
pub const DEFAULT_LINUX_ENTRY: &str = "\\loader\\entries\\default.conf";

/// Default target of the `windows` command.
pub const WINDOWS_BOOT_MANAGER: &str = "\\EFI\\Microsoft\\Boot\\bootmgfw.efi";

/// Artifact categories as defined by the transparency engine's
/// handlers.
pub const CATEGORY_LINUX_KERNEL: u32 = 1;
pub const CATEGORY_INITRD: u32 = 2;

/// Tab replacement width on the EFI text console.
pub const CONSOLE_TABS: usize = 8;

/// UTF-16 units read from the firmware vendor string.
pub const MAX_VENDOR_SIZE: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_are_firmware_form() {
        // firmware only speaks backslash
        assert!(DEFAULT_LINUX_ENTRY.starts_with('\\'));
        assert!(!DEFAULT_LINUX_ENTRY.contains('/'));
        assert!(WINDOWS_BOOT_MANAGER.starts_with("\\EFI\\"));
    }

    #[test]
    fn test_artifact_categories_are_distinct() {
        assert_ne!(CATEGORY_LINUX_KERNEL, CATEGORY_INITRD);
    }
}
