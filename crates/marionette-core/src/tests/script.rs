use crate::{Command, CommandKind, CoreError, HotkeyDefinition, KeyCode, Modifiers, Script, TriggerMode};

use std::time::Duration;

fn move_command(x: i32, y: i32, delay_ms: u64) -> Command {
    Command::new(
        CommandKind::MoveAbsolute { x, y },
        Duration::from_millis(delay_ms),
    )
}

/// WHAT: Blank script names are rejected
/// WHY: Stored scripts are addressed by name in the library UI
#[test]
fn given_blank_name_when_creating_script_then_validation_error() {
    assert!(matches!(
        Script::new("   "),
        Err(CoreError::Validation { .. })
    ));
}

/// WHAT: Names are trimmed on creation and rename
/// WHY: Trailing whitespace makes two visually identical names distinct
#[test]
fn given_padded_name_when_creating_script_then_name_is_trimmed() {
    let mut script = Script::new("  demo  ").unwrap();
    assert_eq!(script.name(), "demo");

    script.rename(" renamed ").unwrap();
    assert_eq!(script.name(), "renamed");
}

/// WHAT: Estimated duration sums every delay plus sleep durations
/// WHY: The safety interlock gates session starts on this estimate
#[test]
fn given_delays_and_sleeps_when_estimating_duration_then_sum_of_time_costs() {
    // Given: 10ms + 20ms delays and a 30ms delay + 100ms sleep
    let mut script = Script::new("timing").unwrap();
    script.push(move_command(0, 0, 10));
    script.push(move_command(5, 5, 20));
    script.push(Command::new(
        CommandKind::Sleep {
            duration: Duration::from_millis(100),
        },
        Duration::from_millis(30),
    ));

    // Then: 10 + 20 + 30 + 100
    assert_eq!(script.estimated_duration(), Duration::from_millis(160));
}

/// WHAT: modified_at advances strictly on every mutation
/// WHY: Change observers rely on the stamp moving even within one clock tick
#[test]
fn given_rapid_mutations_when_touching_script_then_modified_at_strictly_increases() {
    let mut script = Script::new("stamps").unwrap();
    let mut previous = script.modified_at;

    // When: Mutating faster than the wall clock resolution
    for i in 0..10 {
        script.push(move_command(i, i, 0));
        assert!(
            script.modified_at > previous,
            "stamp must advance on mutation {i}"
        );
        previous = script.modified_at;
    }
}

/// WHAT: Out-of-range edits are rejected without mutating
/// WHY: Index errors must not corrupt the sequence
#[test]
fn given_out_of_range_index_when_editing_then_validation_error_and_unchanged() {
    let mut script = Script::new("edits").unwrap();
    script.push(move_command(1, 1, 0));

    assert!(matches!(
        script.remove(5),
        Err(CoreError::Validation { .. })
    ));
    assert!(matches!(
        script.insert(3, move_command(2, 2, 0)),
        Err(CoreError::Validation { .. })
    ));
    assert!(matches!(
        script.move_command(0, 4),
        Err(CoreError::Validation { .. })
    ));
    assert_eq!(script.len(), 1);
}

/// WHAT: Reordering preserves every command
/// WHY: move_command is remove+insert; off-by-one would drop a step
#[test]
fn given_three_commands_when_moving_first_to_last_then_order_rotated() {
    let mut script = Script::new("order").unwrap();
    script.push(move_command(1, 0, 0));
    script.push(move_command(2, 0, 0));
    script.push(move_command(3, 0, 0));

    script.move_command(0, 2).unwrap();

    let xs: Vec<i32> = script
        .commands()
        .iter()
        .map(|c| match c.kind {
            CommandKind::MoveAbsolute { x, .. } => x,
            _ => unreachable!("only moves were pushed"),
        })
        .collect();
    assert_eq!(xs, vec![2, 3, 1]);
}

/// WHAT: Snapshots are isolated from later edits
/// WHY: A running session must not observe concurrent script changes
#[test]
fn given_snapshot_when_editing_script_then_snapshot_unchanged() {
    let mut script = Script::new("snapshot").unwrap();
    script.push(move_command(1, 1, 0));

    let snapshot = script.snapshot();
    script.push(move_command(2, 2, 0));
    script.clear();

    assert_eq!(snapshot.len(), 1);
    assert!(script.is_empty());
}

/// WHAT: Aggregate validation covers the attached hotkey
/// WHY: A script with a broken trigger must not reach the hotkey registry
#[test]
fn given_invalid_hotkey_when_validating_script_then_validation_error() {
    let mut script = Script::new("triggered").unwrap();
    // Bare non-function key: constructed literally to bypass the checked
    // constructor, as a hand-edited storage file could.
    script.set_hotkey(Some(HotkeyDefinition {
        modifiers: Modifiers::NONE,
        key: KeyCode(0x41),
        mode: TriggerMode::FireOncePerPress,
        swallow: false,
    }));

    assert!(matches!(
        script.validate(),
        Err(CoreError::Validation { .. })
    ));
}

/// WHAT: Scripts round-trip through JSON with raw_source preserved
/// WHY: The opaque alternate representation must survive storage untouched
#[test]
fn given_script_with_raw_source_when_round_tripping_then_all_fields_survive() {
    let mut script = Script::new("persisted").unwrap();
    script.push(move_command(7, 8, 15));
    script.raw_source = Some("external-dsl: move 7 8".to_string());

    let json = serde_json::to_string(&script).unwrap();
    let restored: Script = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.id, script.id);
    assert_eq!(restored.name(), "persisted");
    assert_eq!(restored.len(), 1);
    assert_eq!(restored.raw_source.as_deref(), Some("external-dsl: move 7 8"));
}
