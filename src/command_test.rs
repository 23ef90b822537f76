#![allow(clippy::float_cmp)]

use super::*;

// =============================================================
// Encoding
// =============================================================

#[test]
fn toggle_encodes_with_type_tag() {
    let json = encode_command(&Command::Toggle { enabled: true }).expect("encode");
    assert_eq!(json, r#"{"type":"toggle","enabled":true}"#);
}

#[test]
fn toggle_off_encodes_false() {
    let json = encode_command(&Command::Toggle { enabled: false }).expect("encode");
    assert_eq!(json, r#"{"type":"toggle","enabled":false}"#);
}

#[test]
fn update_settings_encodes_full_object() {
    let command = Command::UpdateSettings {
        settings: Settings { brightness: 1.2, contrast: 0.8, grayscale: 0.0 },
    };
    let json = encode_command(&command).expect("encode");
    assert_eq!(
        json,
        r#"{"type":"update_settings","settings":{"brightness":1.2,"contrast":0.8,"grayscale":0.0}}"#
    );
}

// =============================================================
// Decoding
// =============================================================

#[test]
fn decode_toggle() {
    let command = decode_command(r#"{"type":"toggle","enabled":true}"#).expect("decode");
    assert_eq!(command, Command::Toggle { enabled: true });
}

#[test]
fn decode_update_settings() {
    let command = decode_command(
        r#"{"type":"update_settings","settings":{"brightness":2.0,"contrast":0.5,"grayscale":1.0}}"#,
    )
    .expect("decode");
    let Command::UpdateSettings { settings } = command else {
        panic!("expected update_settings, got {command:?}");
    };
    assert_eq!(settings.brightness, 2.0);
    assert_eq!(settings.contrast, 0.5);
    assert_eq!(settings.grayscale, 1.0);
}

#[test]
fn decode_settings_with_missing_fields_uses_defaults() {
    let command =
        decode_command(r#"{"type":"update_settings","settings":{"brightness":1.5}}"#).expect("decode");
    assert_eq!(
        command,
        Command::UpdateSettings {
            settings: Settings { brightness: 1.5, contrast: 1.0, grayscale: 0.0 }
        }
    );
}

#[test]
fn decode_tolerates_extra_fields() {
    let command = decode_command(r#"{"type":"toggle","enabled":true,"seq":7}"#).expect("decode");
    assert_eq!(command, Command::Toggle { enabled: true });
}

#[test]
fn roundtrip_both_variants() {
    let commands = [
        Command::Toggle { enabled: true },
        Command::UpdateSettings { settings: Settings::default() },
    ];
    for command in commands {
        let json = encode_command(&command).expect("encode");
        let back = decode_command(&json).expect("decode");
        assert_eq!(back, command);
    }
}

// =============================================================
// Rejection
// =============================================================

#[test]
fn unknown_tag_is_rejected() {
    let result = decode_command(r#"{"type":"brightness_contrast","brightness":1.0,"contrast":1.0}"#);
    assert!(matches!(result, Err(CommandError::Json(_))));
}

#[test]
fn missing_tag_is_rejected() {
    assert!(decode_command(r#"{"enabled":true}"#).is_err());
}

#[test]
fn missing_variant_fields_are_rejected() {
    assert!(decode_command(r#"{"type":"toggle"}"#).is_err());
    assert!(decode_command(r#"{"type":"update_settings"}"#).is_err());
}

#[test]
fn malformed_json_is_rejected() {
    assert!(decode_command("not json").is_err());
    assert!(decode_command("").is_err());
    assert!(decode_command(r#"{"type":"toggle","enabled":"#).is_err());
}

#[test]
fn error_message_names_the_failure() {
    let err = decode_command(r#"{"type":"sepia"}"#).expect_err("should reject unknown tag");
    let text = err.to_string();
    assert!(text.contains("bad command payload"), "unexpected message: {text}");
}
