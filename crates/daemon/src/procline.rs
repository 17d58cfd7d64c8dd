// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process title, best effort.
//!
//! Linux gets the kernel comm name (15 bytes, truncated); other platforms
//! are a no-op. The full detail always goes to the logs, the title is only
//! a convenience for `ps`.

pub fn set(title: &str) {
    imp::set(title);
}

#[cfg(target_os = "linux")]
mod imp {
    use std::ffi::CString;

    pub fn set(title: &str) {
        let bytes: Vec<u8> = title.bytes().filter(|&b| b != 0).take(15).collect();
        let Ok(name) = CString::new(bytes) else {
            return;
        };
        // SAFETY: PR_SET_NAME copies a NUL-terminated string of at most 16
        // bytes out of `name`, which outlives the call.
        unsafe {
            libc::prctl(
                libc::PR_SET_NAME,
                name.as_ptr(),
                0 as libc::c_ulong,
                0 as libc::c_ulong,
                0 as libc::c_ulong,
            );
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    pub fn set(_title: &str) {}
}
