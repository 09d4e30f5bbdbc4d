//! Process DPI awareness.
//!
//! With Per-Monitor V2 awareness the cursor APIs and `SendInput` all work in
//! physical pixels, so positions read back match positions written.

use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Set Per-Monitor V2 DPI awareness once per process.
pub(crate) fn set_dpi_aware() {
    INIT.call_once(|| {
        const DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2: isize = -4;

        #[link(name = "user32")]
        extern "system" {
            fn SetProcessDpiAwarenessContext(value: isize) -> i32;
        }

        let result =
            unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) };
        if result != 0 {
            info!("Set Per-Monitor V2 DPI awareness");
        } else {
            // Already set by the host (manifest or an earlier call).
            warn!("Per-Monitor V2 DPI awareness not applied, coordinates may be scaled");
        }
    });
}
