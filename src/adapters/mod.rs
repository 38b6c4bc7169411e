use crate::core::Reboot;

#[cfg(target_os = "linux")]
mod linux;
mod simulated;
mod terminal;

pub use simulated::{LogOnlyReboot, NoopScreen, RecordingReboot};
pub use terminal::TerminalScreen;

/// Pick the reboot action: the real one, or a stand-in that only logs.
pub fn get_reboot(simulation: bool) -> Box<dyn Reboot> {
    if simulation {
        return Box::new(LogOnlyReboot);
    }

    #[cfg(target_os = "linux")]
    {
        Box::new(linux::LinuxReboot)
    }

    #[cfg(not(target_os = "linux"))]
    {
        Box::new(simulated::UnsupportedReboot)
    }
}
