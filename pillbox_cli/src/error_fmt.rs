//! Human-readable error descriptions and structured JSON error formatting.

use pillbox_core::error::{BuildError, CoreError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingClock => {
                "What happened: No real-time clock was provided to the controller.\nLikely causes: The clock driver failed to initialize or was not wired into the builder.\nHow to fix: Ensure the clock is created and passed via with_rtc(...).".to_string()
            }
            BuildError::MissingKeypad => {
                "What happened: No keypad was provided to the controller.\nLikely causes: The key source failed to initialize or was not wired into the builder.\nHow to fix: Pass a keypad via with_keypad(...), or give --keys FILE.".to_string()
            }
            BuildError::MissingServos => {
                "What happened: No door servos were provided to the controller.\nLikely causes: Servo drivers failed to initialize or were not wired into the builder.\nHow to fix: Ensure five servos are created and passed via with_servos(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `pillbox self-check`."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CoreError>() {
        return match ce {
            CoreError::ClockUnavailable(detail) => format!(
                "What happened: The real-time clock did not respond ({detail}).\nLikely causes: Clock module not connected, no I2C power, or a flat backup battery.\nHow to fix: Check the clock wiring and power, then restart the dispenser."
            ),
            CoreError::Config(msg) => {
                if msg.to_ascii_lowercase().contains("must have headers") {
                    return "Invalid headers in schedule CSV. Expected 'container,hour,minute,max_temp'.".to_string();
                }
                format!(
                    "What happened: Configuration is invalid ({msg}).\nLikely causes: Missing or out-of-range values in the TOML or schedule CSV.\nHow to fix: Edit the file and run `pillbox self-check` until it passes."
                )
            }
            CoreError::Timeout => {
                "What happened: A sensor read timed out.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DT/SCK pins and power, and consider increasing hardware.sensor_read_timeout_ms in the config.".to_string()
            }
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from hardware init
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open load cell") || lower.contains("open servo pin") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix [[containers]] load_cell and [pins] servos in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("failed to read") {
        let cause = err
            .source()
            .map(|s| format!(" Cause: {s}"))
            .unwrap_or_default();
        return format!(
            "What happened: {msg}.{cause}\nHow to fix: Check the path and file permissions."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 for a missing real-time clock, 4 for configuration errors, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(ce) = err.downcast_ref::<CoreError>() {
        return match ce {
            CoreError::ClockUnavailable(_) => 3,
            CoreError::Config(_) => 4,
            _ => 1,
        };
    }
    if let Some(BuildError::InvalidConfig(_)) = err.downcast_ref::<BuildError>() {
        return 4;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::ClockUnavailable(_)) => "ClockUnavailable",
        Some(CoreError::Config(_)) => "Config",
        Some(_) => "Core",
        None if err.downcast_ref::<BuildError>().is_some() => "Build",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
