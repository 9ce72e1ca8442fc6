//! Command line / environment configuration

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::bridge::BridgeConfig;

/// Live feedback display for the 5DT data glove
#[derive(Parser, Debug, Clone)]
#[command(name = "glove-feedback", version, about)]
pub struct Config {
    /// Glove bridge executable
    #[arg(long = "bridge", env = "GLOVE_BRIDGE_EXE", default_value = "./TestGlove64.exe")]
    pub bridge_exe: PathBuf,

    /// Port the glove is connected to (passed to the bridge)
    #[arg(long, env = "GLOVE_PORT", default_value = "USB0")]
    pub port: String,

    /// Folder with one image per gesture id
    #[arg(long, env = "GLOVE_IMAGES", default_value = "gesture_images")]
    pub images: PathBuf,

    /// How often the display drains the bridge queue, in milliseconds
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_ms: u64,

    /// How long to wait for the bridge to exit on shutdown, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub shutdown_timeout_ms: u64,

    /// Extra argument passed to the bridge after the port (repeatable)
    #[arg(long = "bridge-arg", allow_hyphen_values = true)]
    pub bridge_args: Vec<OsString>,
}

impl Config {
    pub fn bridge(&self) -> BridgeConfig {
        BridgeConfig::new(&self.bridge_exe, &self.port).with_args(self.bridge_args.iter().cloned())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = Config::try_parse_from(["glove-feedback"]).unwrap();
        // Environment may override these on a developer machine
        if std::env::var_os("GLOVE_PORT").is_none() {
            assert_eq!(config.port, "USB0");
        }
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(2));
        assert!(config.bridge_args.is_empty());
    }

    #[test]
    fn builds_bridge_invocation() {
        let config = Config::try_parse_from([
            "glove-feedback",
            "--bridge",
            "/opt/glove/bridge",
            "--port",
            "COM3",
            "--bridge-arg",
            "--count",
            "--bridge-arg",
            "10",
        ])
        .unwrap();

        let bridge = config.bridge();
        assert_eq!(bridge.executable, PathBuf::from("/opt/glove/bridge"));
        assert_eq!(bridge.connection, "COM3");
        assert_eq!(bridge.extra_args, vec![OsString::from("--count"), OsString::from("10")]);
    }

    #[test]
    fn rejects_zero_poll_interval() {
        assert!(Config::try_parse_from(["glove-feedback", "--poll-ms", "0"]).is_err());
    }
}
