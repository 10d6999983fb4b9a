//! Raw native memory for hosted code.

use rtsffi_core::FfiError;

/// Allocate `size` bytes with the C allocator.
///
/// Zero bytes may legitimately come back as a null address.
pub fn allocate(size: usize) -> Result<usize, FfiError> {
    // SAFETY: malloc has no preconditions.
    let address = unsafe { libc::malloc(size) } as usize;
    if address == 0 && size != 0 {
        return Err(FfiError::System {
            message: "Insufficient memory".into(),
            code: libc::ENOMEM,
        });
    }
    Ok(address)
}

/// Return memory obtained from [`allocate`]. Null is ignored.
pub fn release(address: usize) {
    // SAFETY: the address came from `allocate` and has not been released;
    // hosted code owns that contract.
    unsafe { libc::free(address as *mut libc::c_void) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_write_release() {
        let address = allocate(64).unwrap();
        assert_ne!(address, 0);
        unsafe {
            std::ptr::write_bytes(address as *mut u8, 0xAB, 64);
            assert_eq!(*(address as *const u8).add(63), 0xAB);
        }
        release(address);
    }

    #[test]
    fn huge_request_is_a_system_error() {
        let err = allocate(usize::MAX).unwrap_err();
        assert!(matches!(err, FfiError::System { code, .. } if code == libc::ENOMEM));
    }

    #[test]
    fn release_null_is_harmless() {
        release(0);
    }
}
