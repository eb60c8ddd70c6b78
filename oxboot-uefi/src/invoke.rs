//! Service Invocation Trampoline
//!
//! All EFI entry points share one trampoline: the caller passes the
//! address of a table slot holding the service function pointer and a
//! flat vector of 64-bit argument words (scalars or pointers). The
//! trampoline loads the pointer and dispatches with the `efiapi` calling
//! convention, which carries the Microsoft x64 ABI — including the
//! 32-byte shadow space — on x86-64.
//!
//! Service invocation serializes on a single token: one logical CPU
//! interacts with firmware and a call is never preempted. Pointer
//! arguments must address values that stay live across the call; callers
//! keep them on the current frame.

use spin::{Mutex, MutexGuard};

static TOKEN: Mutex<()> = Mutex::new(());

/// Guard for a held invocation token.
pub(crate) type Token = MutexGuard<'static, ()>;

/// Acquire the invocation token for a multi-call critical section
/// (memory map acquisition followed by `ExitBootServices`).
pub(crate) fn lock() -> Token {
    TOKEN.lock()
}

/// Invoke the service whose function pointer lives at `slot`.
///
/// Returns the raw 64-bit status word; the invoker does not interpret it.
///
/// # Safety
///
/// `slot` must point at a function pointer inside a live firmware service
/// table (or a decoded copy of one), and `args` must match the service
/// prototype in count and kind.
pub(crate) unsafe fn call(slot: u64, args: &[u64]) -> u64 {
    let _token = lock();
    // SAFETY: forwarded caller contract.
    unsafe { call_locked(&_token, slot, args) }
}

/// Like [`call`], for callers already holding the token.
///
/// # Safety
///
/// Same contract as [`call`].
pub(crate) unsafe fn call_locked(_token: &Token, slot: u64, args: &[u64]) -> u64 {
    // SAFETY: slot addresses a service table entry per the caller contract.
    let fptr = unsafe { core::ptr::read_volatile(slot as *const u64) };

    if fptr == 0 {
        return crate::status::EFI_UNSUPPORTED | (1 << 63);
    }

    // SAFETY: the transmuted pointer is a firmware entry point and the
    // argument words match its prototype per the caller contract.
    unsafe {
        use core::mem::transmute as fn_at;

        let a = args;
        match a.len() {
            0 => fn_at::<u64, extern "efiapi" fn() -> u64>(fptr)(),
            1 => fn_at::<u64, extern "efiapi" fn(u64) -> u64>(fptr)(a[0]),
            2 => fn_at::<u64, extern "efiapi" fn(u64, u64) -> u64>(fptr)(a[0], a[1]),
            3 => fn_at::<u64, extern "efiapi" fn(u64, u64, u64) -> u64>(fptr)(a[0], a[1], a[2]),
            4 => fn_at::<u64, extern "efiapi" fn(u64, u64, u64, u64) -> u64>(fptr)(
                a[0], a[1], a[2], a[3],
            ),
            5 => fn_at::<u64, extern "efiapi" fn(u64, u64, u64, u64, u64) -> u64>(fptr)(
                a[0], a[1], a[2], a[3], a[4],
            ),
            6 => fn_at::<u64, extern "efiapi" fn(u64, u64, u64, u64, u64, u64) -> u64>(fptr)(
                a[0], a[1], a[2], a[3], a[4], a[5],
            ),
            7 => fn_at::<u64, extern "efiapi" fn(u64, u64, u64, u64, u64, u64, u64) -> u64>(fptr)(
                a[0], a[1], a[2], a[3], a[4], a[5], a[6],
            ),
            8 => {
                fn_at::<u64, extern "efiapi" fn(u64, u64, u64, u64, u64, u64, u64, u64) -> u64>(
                    fptr,
                )(a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7])
            }
            9 => fn_at::<
                u64,
                extern "efiapi" fn(u64, u64, u64, u64, u64, u64, u64, u64, u64) -> u64,
            >(fptr)(a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7], a[8]),
            10 => fn_at::<
                u64,
                extern "efiapi" fn(u64, u64, u64, u64, u64, u64, u64, u64, u64, u64) -> u64,
            >(fptr)(
                a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7], a[8], a[9],
            ),
            _ => unreachable!("no EFI service takes more than 10 arguments"),
        }
    }
}

/// Address of a value kept live on the caller's frame, as an argument
/// word.
pub(crate) fn ptrval<T>(v: &T) -> u64 {
    v as *const T as u64
}

/// Mutable variant of [`ptrval`] for output parameters.
pub(crate) fn ptrval_mut<T>(v: &mut T) -> u64 {
    v as *mut T as u64
}
