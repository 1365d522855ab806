//! Copying share links to the system clipboard.
//!
//! On Windows this publishes `CF_UNICODETEXT`. Other platforms report
//! [`ClipboardError::Unsupported`] so callers can show the link instead.

use thiserror::Error;

/// Clipboard failures surfaced to the share flow.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("Clipboard text copy is only implemented on Windows in this build")]
    Unsupported,
    #[error("Clipboard error: {0}")]
    System(String),
}

/// Destination for copied text.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// The operating system clipboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        platform::copy_text(text)
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::ClipboardError;

    pub fn copy_text(_text: &str) -> Result<(), ClipboardError> {
        Err(ClipboardError::Unsupported)
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use super::ClipboardError;
    use std::ptr::copy_nonoverlapping;
    use windows::Win32::Foundation::{HANDLE, HGLOBAL};
    use windows::Win32::System::DataExchange::{
        CloseClipboard, EmptyClipboard, OpenClipboard, SetClipboardData,
    };
    use windows::Win32::System::Memory::{
        GMEM_MOVEABLE, GMEM_ZEROINIT, GlobalAlloc, GlobalFree, GlobalLock, GlobalUnlock,
    };
    use windows::Win32::System::Ole::CF_UNICODETEXT;

    struct OpenedClipboard;

    impl OpenedClipboard {
        fn open() -> Result<Self, ClipboardError> {
            unsafe { OpenClipboard(None) }
                .map_err(|err| ClipboardError::System(format!("OpenClipboard failed: {err}")))?;
            let guard = Self;
            unsafe { EmptyClipboard() }
                .map_err(|err| ClipboardError::System(format!("EmptyClipboard failed: {err}")))?;
            Ok(guard)
        }
    }

    impl Drop for OpenedClipboard {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseClipboard();
            }
        }
    }

    pub fn copy_text(text: &str) -> Result<(), ClipboardError> {
        let _clipboard = OpenedClipboard::open()?;
        let hglobal = utf16_global(text)?;
        // SAFETY: clipboard is open; the system owns the memory once the call succeeds.
        match unsafe { SetClipboardData(u32::from(CF_UNICODETEXT.0), Some(HANDLE(hglobal.0))) } {
            Ok(_) => Ok(()),
            Err(err) => {
                unsafe {
                    let _ = GlobalFree(Some(hglobal));
                }
                Err(ClipboardError::System(format!("SetClipboardData failed: {err}")))
            }
        }
    }

    fn utf16_global(text: &str) -> Result<HGLOBAL, ClipboardError> {
        let wide: Vec<u16> = text.encode_utf16().chain(std::iter::once(0)).collect();
        let bytes = wide.len() * std::mem::size_of::<u16>();
        // SAFETY: movable global memory as required by the clipboard.
        let handle = unsafe { GlobalAlloc(GMEM_MOVEABLE | GMEM_ZEROINIT, bytes) }
            .map_err(|err| ClipboardError::System(format!("GlobalAlloc failed: {err}")))?;
        let ptr = unsafe { GlobalLock(handle) };
        if ptr.is_null() {
            unsafe {
                let _ = GlobalFree(Some(handle));
            }
            return Err(ClipboardError::System("GlobalLock failed".into()));
        }
        unsafe {
            copy_nonoverlapping(wide.as_ptr() as *const u8, ptr as *mut u8, bytes);
            let _ = GlobalUnlock(handle);
        }
        Ok(handle)
    }
}
