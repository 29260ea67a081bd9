//! Rotation journeys
//!
//! What the data and backup directories look like after a run of saves
//! under each cleanup mode.

use autosave_core::{CleanupMode, RecordKind, RotationSettings};
use autosave_e2e_tests::harness::TestHost;
use autosave_e2e_tests::mocks::TestRequestFactory as Req;
use serde_json::{json, Value};

fn read_json(path: &std::path::Path) -> Vec<Value> {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_duplicate_prompt_is_rejected_and_file_untouched() {
    let mut host = TestHost::new_temp();
    let replies = host.session(&[
        Req::save_prompt("a red fox in the snow"),
        Req::save_prompt("a red fox in the snow"),
        Req::stats(),
    ]);

    assert_eq!(replies[0]["success"], true);
    assert_eq!(replies[0]["message"], "Prompt saved");
    assert_eq!(replies[1], json!({"success": false, "message": "Prompt already exists"}));
    assert_eq!(replies[2]["data"]["total_prompts"], 1);

    assert_eq!(host.on_disk(RecordKind::Prompt).len(), 1);
    // First write had nothing to rotate; the duplicate never wrote
    assert!(host.backups(RecordKind::Prompt).is_empty());
}

#[test]
fn test_backup_mode_keeps_newest_copies_only() {
    let mut host = TestHost::with_settings(RotationSettings::new(CleanupMode::Backup, 2).unwrap());
    for i in 0..5 {
        let reply = host.send(Req::save_image(&format!("https://cdn.example.com/{i}.png")));
        assert_eq!(reply["success"], true);
    }

    assert_eq!(host.on_disk(RecordKind::Image).len(), 5);
    let backups = host.backups(RecordKind::Image);
    assert_eq!(backups.len(), 2);
    // Newest backup is the file as it was before the fifth write
    assert_eq!(read_json(&backups[0].path).len(), 4);
    assert_eq!(read_json(&backups[1].path).len(), 3);
    for backup in &backups {
        assert!(backup.file_name().starts_with("saved_images_"));
        assert!(backup.file_name().ends_with(".json"));
    }
}

#[test]
fn test_delete_mode_leaves_no_backups() {
    let mut host = TestHost::new_temp();
    let reply = host.send(Req::set_cleanup_mode("delete", None));
    assert_eq!(reply["message"], "Cleanup mode set to delete");

    for url in ["https://a.example/1", "https://a.example/2", "https://a.example/3"] {
        host.send(Req::save_page(url));
    }

    assert_eq!(host.on_disk(RecordKind::Page).len(), 3);
    assert!(host.backup_files().is_empty());
    assert_eq!(host.data_files(), vec!["monitored_pages.json", "stats.json"]);
}

#[test]
fn test_keep_mode_overwrites_in_place() {
    let mut host = TestHost::with_settings(RotationSettings::new(CleanupMode::Keep, 5).unwrap());
    host.session(&[Req::save_prompt("one"), Req::save_prompt("two")]);

    assert_eq!(host.on_disk(RecordKind::Prompt).len(), 2);
    assert!(host.backup_files().is_empty());
    assert_eq!(host.data_files(), vec!["saved_prompts.json", "stats.json"]);
}

#[test]
fn test_rename_mode_sets_previous_file_aside() {
    let mut host = TestHost::with_settings(RotationSettings::new(CleanupMode::Rename, 5).unwrap());
    host.session(&[
        Req::save_page("https://b.example/1"),
        Req::save_page("https://b.example/2"),
        Req::save_page("https://b.example/3"),
    ]);

    let asides: Vec<String> = host
        .data_files()
        .into_iter()
        .filter(|n| n.starts_with("monitored_pages.old_"))
        .collect();
    assert_eq!(asides.len(), 2);
    assert!(host.backup_files().is_empty());
    assert_eq!(host.on_disk(RecordKind::Page).len(), 3);
}

#[test]
fn test_per_request_mode_applies_once() {
    let mut host = TestHost::new_temp();
    let replies = host.session(&[
        Req::save_image("https://c.example/1"),
        Req::with_mode(Req::save_image("https://c.example/2"), "delete"),
        Req::save_image("https://c.example/3"),
        Req::cleanup_info(),
    ]);

    assert_eq!(replies[1]["data"]["cleanup_mode"], "delete");
    assert_eq!(replies[2]["data"]["cleanup_mode"], "backup");
    assert_eq!(replies[3]["data"]["cleanup_mode"], "backup");
    // Only the third write archived anything
    assert_eq!(host.backups(RecordKind::Image).len(), 1);
}

#[test]
fn test_invalid_per_request_mode_saves_nothing() {
    let mut host = TestHost::new_temp();
    let reply = host.send(Req::with_mode(Req::save_image("https://d.example/1"), "shred"));

    assert_eq!(reply["success"], false);
    assert_eq!(reply["message"], "Invalid cleanup mode");
    assert!(host.on_disk(RecordKind::Image).is_empty());
}

#[test]
fn test_rejected_mode_change_keeps_previous_settings() {
    let mut host = TestHost::new_temp();
    let replies = host.session(&[
        Req::set_cleanup_mode("rename", Some(3)),
        Req::set_cleanup_mode("shred", Some(9)),
        Req::set_cleanup_mode("backup", Some(0)),
        Req::cleanup_info(),
    ]);

    assert_eq!(replies[0]["success"], true);
    assert_eq!(replies[1]["success"], false);
    assert_eq!(replies[1]["message"], "Failed to set cleanup mode");
    assert_eq!(replies[2]["success"], false);
    assert_eq!(replies[2]["message"], "Failed to set cleanup mode");
    assert_eq!(replies[3]["data"]["cleanup_mode"], "rename");
    assert_eq!(replies[3]["data"]["max_backup_files"], 3);
}

#[test]
fn test_record_without_key_is_refused() {
    let mut host = TestHost::new_temp();
    let replies = host.session(&[
        json!({"action": "save_image", "data": {"prompt": "no url here"}}),
        json!({"action": "save_prompt", "data": {"content": null}}),
    ]);

    assert_eq!(replies[0]["success"], false);
    assert_eq!(replies[1]["success"], false);
    assert!(host.data_files().is_empty());
}

#[test]
fn test_dedup_survives_restart() {
    let mut host = TestHost::new_temp();
    host.send(Req::save_image("https://e.example/1"));
    host.restart();

    let replies = host.session(&[Req::save_image("https://e.example/1"), Req::stats()]);
    assert_eq!(replies[0]["message"], "Image already exists");
    assert_eq!(replies[1]["data"]["total_images"], 1);
}

#[test]
fn test_corrupt_collection_is_rotated_on_next_write() {
    let mut host = TestHost::new_temp();
    std::fs::write(host.collection_path(RecordKind::Prompt), b"{ not json").unwrap();
    host.restart();

    let reply = host.send(Req::save_prompt("fresh start"));
    assert_eq!(reply["success"], true);
    assert_eq!(host.on_disk(RecordKind::Prompt).len(), 1);

    let backups = host.backups(RecordKind::Prompt);
    assert_eq!(backups.len(), 1);
    assert_eq!(std::fs::read(&backups[0].path).unwrap(), b"{ not json");
}

#[test]
fn test_failed_write_keeps_record_and_reports_error() {
    let mut host = TestHost::with_settings(RotationSettings::new(CleanupMode::Keep, 5).unwrap());
    let path = host.collection_path(RecordKind::Prompt);
    std::fs::create_dir(&path).unwrap();

    let replies = host.session(&[Req::save_prompt("a"), Req::stats()]);
    assert_eq!(replies[0]["success"], false);
    assert_eq!(replies[0]["message"], "Prompt kept in memory but not written to disk");
    assert!(replies[0]["error"].is_string());
    assert_eq!(replies[1]["data"]["total_prompts"], 1);
    assert!(path.is_dir());
}

#[test]
fn test_resending_after_failed_write_flushes_collection() {
    let mut host = TestHost::with_settings(RotationSettings::new(CleanupMode::Keep, 5).unwrap());
    let path = host.collection_path(RecordKind::Prompt);
    std::fs::create_dir(&path).unwrap();
    assert_eq!(host.send(Req::save_prompt("a"))["success"], false);

    std::fs::remove_dir(&path).unwrap();
    let reply = host.send(Req::save_prompt("a"));
    assert_eq!(reply["message"], "Prompt already exists");
    assert_eq!(host.on_disk(RecordKind::Prompt).len(), 1);
}
