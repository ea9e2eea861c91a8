use std::io;
use std::process::{Command, Stdio};

use tracing::info;

/// Opens a URL in a new browsing context.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str) -> io::Result<()>;
}

/// Uses `$BROWSER` when set, otherwise the platform opener.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl LinkOpener for SystemOpener {
    fn open(&self, url: &str) -> io::Result<()> {
        let mut cmd = match std::env::var("BROWSER").ok().filter(|b| !b.is_empty()) {
            Some(browser) => {
                let mut c = Command::new(browser);
                c.arg(url);
                c
            }
            None => platform_command(url),
        };
        info!("opening {url}");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
    }
}

#[cfg(target_os = "macos")]
fn platform_command(url: &str) -> Command {
    let mut c = Command::new("open");
    c.arg(url);
    c
}

#[cfg(target_os = "windows")]
fn platform_command(url: &str) -> Command {
    let (program, args) = windows_launcher(url);
    let mut c = Command::new(program);
    c.args(args);
    c
}

/// Hands the URL to the protocol handler directly. `cmd /C start` would
/// parse `&`, `|` and `^` inside the URL.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn windows_launcher(url: &str) -> (&'static str, [&str; 2]) {
    ("rundll32", ["url.dll,FileProtocolHandler", url])
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_command(url: &str) -> Command {
    let mut c = Command::new("xdg-open");
    c.arg(url);
    c
}
