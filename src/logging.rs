//! Logger bootstrap.
//!
//! Library code only talks to the `log` facade. Applications (and the
//! GPU-backed tests) call [`init`] once to route records to stderr natively
//! or to the browser console on wasm. Calling it again is harmless.

pub fn init() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        // Fails only when a logger is already installed.
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::debug!("console logger not installed: {e}");
        }
    }
}
