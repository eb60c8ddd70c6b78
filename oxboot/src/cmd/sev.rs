//! AMD SEV-SNP commands

use alloc::string::String;
use core::fmt::Write;

use crate::cmd::{CmdError, CmdResult};
use crate::platform::Platform;

/// `sev` — AMD SEV-SNP configuration published by firmware.
pub fn sev(p: &Platform) -> CmdResult {
    let snp = p.services.snp_configuration()?;
    let mut buf = String::new();

    let _ = writeln!(buf, "Revision ...........: {}", snp.version);
    let _ = writeln!(
        buf,
        "Secrets Page .......: {:#x} ({} bytes)",
        snp.secrets_page_physical_address, snp.secrets_page_size
    );
    let _ = writeln!(
        buf,
        "CPUID Page .........: {:#x} ({} bytes)",
        snp.cpuid_page_physical_address, snp.cpuid_page_size
    );

    Ok(buf)
}

/// `sev-report` — attestation report over the GHCB.
///
/// The GHCB exchange lives in a guest driver outside the loader; the
/// command is served only when the integrator wires one in.
pub fn sev_report(_p: &Platform) -> CmdResult {
    Err(CmdError::Unsupported(
        "no AMD SEV-SNP guest driver is wired in",
    ))
}
