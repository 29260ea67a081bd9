//! Maintenance journeys
//!
//! Stats, export, clear and the snapshot organizer.

use std::fs;
use std::path::Path;

use autosave_core::{Organizer, OrganizerConfig, RecordKind, RotationOutcome};
use autosave_e2e_tests::harness::TestHost;
use autosave_e2e_tests::mocks::TestRequestFactory as Req;
use serde_json::{json, Value};
use tempfile::TempDir;

fn seed(host: &mut TestHost) {
    let replies = host.session(&[
        Req::save_image("https://f.example/1.png"),
        Req::save_image("https://f.example/2.png"),
        Req::save_prompt("an owl reading"),
        Req::save_page("https://f.example/library"),
    ]);
    assert!(replies.iter().all(|r| r["success"] == true));
}

#[test]
fn test_export_contains_every_collection() {
    let mut host = TestHost::new_temp();
    seed(&mut host);

    let reply = host.send(Req::action("export_data"));
    assert_eq!(reply["success"], true);
    assert_eq!(reply["message"], "Data exported");

    let path = reply["data"]["export_path"].as_str().unwrap().to_string();
    assert!(Path::new(&path).starts_with(&host.layout().data_dir));
    let name = Path::new(&path).file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("export_") && name.ends_with(".json"));

    let export: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(export["export_info"]["total_images"], 2);
    assert_eq!(export["export_info"]["total_prompts"], 1);
    assert_eq!(export["export_info"]["total_pages"], 1);
    assert_eq!(export["images"].as_array().unwrap().len(), 2);
    assert_eq!(export["prompts"][0]["content"], "an owl reading");
}

#[test]
fn test_two_exports_never_overwrite_each_other() {
    let mut host = TestHost::new_temp();
    seed(&mut host);

    let replies = host.session(&[Req::action("export_data"), Req::action("export_data")]);
    let first = replies[0]["data"]["export_path"].as_str().unwrap();
    let second = replies[1]["data"]["export_path"].as_str().unwrap();
    assert_ne!(first, second);
    assert!(Path::new(first).is_file());
    assert!(Path::new(second).is_file());
}

#[test]
fn test_clear_then_stats_reports_empty() {
    let mut host = TestHost::new_temp();
    seed(&mut host);
    host.send(Req::save_image("https://f.example/3.png"));
    assert!(!host.backup_files().is_empty());
    host.send(Req::action("export_data"));
    fs::write(host.layout().backup_dir.join("stats_20250101000000.json"), b"{}").unwrap();

    let replies = host.session(&[Req::action("clear_data"), Req::stats(), Req::cleanup_info()]);
    assert_eq!(replies[0]["message"], "Data cleared");
    assert!(replies[0]["data"]["files_removed"].as_u64().unwrap() >= 4);
    assert_eq!(replies[1]["data"]["total_images"], 0);
    assert_eq!(replies[1]["data"]["total_prompts"], 0);
    assert_eq!(replies[1]["data"]["total_pages"], 0);
    assert_eq!(replies[2]["data"]["current_backup_count"], 0);

    for kind in RecordKind::ALL {
        assert!(!host.collection_path(kind).exists());
    }
    assert!(host.backup_files().is_empty());
    // Exports are user files and stay
    let remaining = host.data_files();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].starts_with("export_"));
}

#[test]
fn test_saving_after_clear_starts_over() {
    let mut host = TestHost::new_temp();
    seed(&mut host);
    host.send(Req::action("clear_data"));

    let reply = host.send(Req::save_image("https://f.example/1.png"));
    assert_eq!(reply["success"], true);
    assert_eq!(reply["data"]["total"], 1);
    assert!(host.backups(RecordKind::Image).is_empty());
}

#[test]
fn test_cleanup_info_counts_backups() {
    let mut host = TestHost::new_temp();
    host.session(&[
        Req::save_image("https://g.example/1"),
        Req::save_image("https://g.example/2"),
        Req::save_prompt("p1"),
        Req::save_prompt("p2"),
    ]);

    let info = host.send(Req::cleanup_info());
    assert_eq!(info["data"]["current_backup_count"], 2);
    assert_eq!(info["data"]["max_backup_files"], 5);
    assert_eq!(
        info["data"]["backup_directory"],
        host.layout().backup_dir.display().to_string()
    );
}

#[test]
fn test_stats_file_tracks_collection_sizes() {
    let mut host = TestHost::new_temp();
    seed(&mut host);

    let stats: Value =
        serde_json::from_str(&fs::read_to_string(host.layout().stats_path()).unwrap()).unwrap();
    assert_eq!(stats["total_images"], 2);
    assert_eq!(stats["total_prompts"], 1);
    assert_eq!(stats["total_pages"], 1);
}

fn organizer_in(root: &Path) -> Organizer {
    Organizer::new(OrganizerConfig {
        download_folder: root.join("Downloads"),
        target_folder: root.join("organized"),
        backup_folder: root.join("backup"),
        max_backup_files: 2,
        ..OrganizerConfig::default()
    })
}

fn drop_dump(dir: &Path, name: &str, images: usize) {
    fs::create_dir_all(dir).unwrap();
    let body = json!({
        "metadata": {"version": 1},
        "images": vec![json!({"url": "u"}); images],
        "prompts": [],
    });
    fs::write(dir.join(name), serde_json::to_vec(&body).unwrap()).unwrap();
}

#[test]
fn test_organizer_places_dump_and_archives_sources() {
    let root = TempDir::new().unwrap();
    let organizer = organizer_in(root.path());
    drop_dump(&root.path().join("Downloads"), "sora_auto_save_1.json", 3);

    let report = organizer.organize().unwrap();
    assert_eq!(report.summary.images, 3);
    assert_eq!(report.rotation, RotationOutcome::Untouched);
    assert_eq!(report.target, root.path().join("organized").join("sora_latest_data.json"));
    assert!(report.target.is_file());
    assert_eq!(report.archived_sources.len(), 1);
    assert!(!root.path().join("Downloads").join("sora_auto_save_1.json").exists());

    drop_dump(&root.path().join("Downloads"), "sora_auto_save_2.json", 5);
    let report = organizer.organize().unwrap();
    assert_eq!(report.summary.images, 5);
    assert!(matches!(report.rotation, RotationOutcome::Archived { .. }));
}

#[test]
fn test_organizer_rejects_dump_missing_keys() {
    let root = TempDir::new().unwrap();
    let organizer = organizer_in(root.path());
    let downloads = root.path().join("Downloads");
    fs::create_dir_all(&downloads).unwrap();
    fs::write(downloads.join("sora_auto_save_x.json"), br#"{"images": []}"#).unwrap();

    assert!(organizer.organize().is_err());
    assert!(!root.path().join("organized").join("sora_latest_data.json").exists());
    assert!(downloads.join("sora_auto_save_x.json").exists());
}
