use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Fire-and-forget status sink, called once per cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, subtitle: &str, body: &str);
}

/// Writes the status to the log only.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, subtitle: &str, body: &str) {
        info!(title, subtitle, "{}", body);
    }
}

/// Shows an OS notification through `notify-send` (Linux) or `osascript` (macOS).
#[derive(Debug, Default, Clone)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn command(title: &str, subtitle: &str, body: &str) -> Command {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification \"{}\" with title \"{}\" subtitle \"{}\"",
                escape_applescript(body),
                escape_applescript(title),
                escape_applescript(subtitle)
            );
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(script);
            cmd
        } else {
            let mut cmd = Command::new("notify-send");
            cmd.arg("--app-name")
                .arg(subtitle)
                .arg(title)
                .arg(body);
            cmd
        }
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, title: &str, subtitle: &str, body: &str) {
        let status = Self::command(title, subtitle, body)
            .kill_on_drop(true)
            .status()
            .await;
        match status {
            Ok(s) if s.success() => debug!(body, "desktop notification shown"),
            Ok(s) => warn!(%s, "notification command exited unsuccessfully"),
            Err(err) => warn!(?err, "notification command unavailable"),
        }
    }
}

fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
