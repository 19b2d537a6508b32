//! CLI validation tests for rslan.

use std::time::Duration;

use clap::Parser;
use rslan::cli::{Cli, ConnectPolicyArg, RestartMode};
use rslan_core::session::ConnectPolicy;

#[test]
fn test_feed_interval_must_be_shorter_than_timeout() {
    let cli = Cli::try_parse_from([
        "rslan",
        "--watchdog-timeout-ms",
        "500",
        "--watchdog-feed-ms",
        "500",
    ])
    .unwrap();

    let result = cli.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("must be shorter than"));
}

#[test]
fn test_zero_response_timeout_fails() {
    let cli = Cli::try_parse_from(["rslan", "--response-timeout-ms", "0"]).unwrap();
    assert!(cli.validate().unwrap_err().contains("--response-timeout-ms"));
}

#[test]
fn test_empty_prefix_fails() {
    let cli = Cli::try_parse_from(["rslan", "--prefix", ""]).unwrap();
    assert!(cli.validate().unwrap_err().contains("--prefix"));
}

#[test]
fn test_reset_policy_ignores_reconnect_delay() {
    let cli = Cli::try_parse_from(["rslan", "--reconnect-delay-ms", "5000"]).unwrap();
    assert_eq!(cli.connect_policy, ConnectPolicyArg::Reset);
    assert_eq!(cli.connect_policy(), ConnectPolicy::Reset);
}

#[test]
fn test_bridge_config_from_flags() {
    let cli = Cli::try_parse_from([
        "rslan",
        "--response-timeout-ms",
        "250",
        "--reset-grace-ms",
        "0",
        "--connect-policy",
        "retry",
    ])
    .unwrap();
    assert!(cli.validate().is_ok());

    let config = cli.bridge_config();
    assert_eq!(config.response_timeout, Duration::from_millis(250));
    assert_eq!(config.reset_grace, Duration::ZERO);
    assert_eq!(
        config.session.connect_policy,
        ConnectPolicy::Retry {
            delay: Duration::from_millis(100)
        }
    );
    assert!(config.expects_reply(b"MEAS?\n"));
}

#[test]
fn test_exit_restart_mode() {
    let cli = Cli::try_parse_from(["rslan", "--restart", "exit", "--no-console", "--simulate"])
        .unwrap();
    assert_eq!(cli.restart, RestartMode::Exit);
    assert!(!cli.console_enabled());
    assert!(cli.simulate);
}
