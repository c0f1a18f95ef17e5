//! FFI safety wrappers: conversions between C strings, buffers, and Rust types.

use std::ffi::{CStr, c_char};

/// Safely converts a C string pointer to a Rust `String`.
///
/// Returns `None` if the pointer is null or not valid UTF-8.
///
/// # Safety
/// A non-null `ptr` must point to a NUL-terminated string.
pub unsafe fn c_str_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string()) }
}

/// Writes `message` into a caller-supplied C buffer, truncated to fit and
/// always NUL-terminated. Does nothing for a null or empty buffer.
///
/// # Safety
/// `buf` must be valid for writes of `len` bytes.
pub unsafe fn write_c_message(buf: *mut c_char, len: usize, message: &str) {
    if buf.is_null() || len == 0 {
        return;
    }
    let bytes = truncate_on_char_boundary(message, len - 1).as_bytes();
    // SAFETY: `bytes.len() + 1 <= len` and the caller guarantees `len` writable bytes.
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), bytes.len());
        *buf.add(bytes.len()) = 0;
    }
}

/// Reads a message written by [`write_c_message`] out of a byte buffer.
pub fn message_from_buffer(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_pointer_is_none() {
        assert_eq!(unsafe { c_str_to_string(std::ptr::null()) }, None);
    }

    #[test]
    fn test_c_str_round_trip() {
        let raw = c"plugin_hello::HelloJob";
        assert_eq!(
            unsafe { c_str_to_string(raw.as_ptr()) }.as_deref(),
            Some("plugin_hello::HelloJob")
        );
    }

    #[test]
    fn test_write_message_truncates_and_terminates() {
        let mut buf = [0xffu8; 6];
        unsafe { write_c_message(buf.as_mut_ptr().cast(), buf.len(), "disk full") };
        assert_eq!(&buf, b"disk \0");
        assert_eq!(message_from_buffer(&buf), "disk ");
    }

    #[test]
    fn test_write_message_keeps_utf8_valid() {
        let mut buf = [0u8; 4];
        unsafe { write_c_message(buf.as_mut_ptr().cast(), buf.len(), "añb") };
        // 'ñ' is two bytes; three payload bytes fit "añ" exactly.
        assert_eq!(message_from_buffer(&buf), "añ");

        let mut tiny = [0u8; 3];
        unsafe { write_c_message(tiny.as_mut_ptr().cast(), tiny.len(), "ñña") };
        assert_eq!(message_from_buffer(&tiny), "ñ");
    }

    #[test]
    fn test_zero_length_buffer_is_untouched() {
        let mut buf = [7u8; 1];
        unsafe { write_c_message(buf.as_mut_ptr().cast(), 0, "x") };
        assert_eq!(buf, [7]);
    }
}
