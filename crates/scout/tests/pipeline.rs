//! End-to-end: capture, vault, ingest, classify.

use std::time::Duration;

use scout::agent;
use scout::ingest::{archive_ingested, archive_source, ingest_file};
use scout::scan::{ReplayAccessPoint, ReplayPass, ReplayScanSource};
use scout::{
    classify, CounterStore, FileMedium, IngestionScope, RecordFile, Reference, RuleSet, ScanMerger,
    Storage, VendorTable,
};

const RULES: &str = r#"{
    "security_standards": {
        "0": {"label": "Open"},
        "3": {"label": "WPA2"}
    },
    "analysis_rules": {
        "default_label": "Stationary AP",
        "threat_tags": {
            "honeypot": {"source": "ssid", "keywords": ["free_wifi"], "label": "Honeypot?"},
            "stealth": {"source": "flag", "field": "hidden", "value": 1, "label": "Stealth AP"},
            "iot": {"source": "vendor", "keywords": ["espressif"], "label": "IoT Device"}
        }
    }
}"#;

fn ap(ssid: &str, bssid: &str, rssi: i32, hidden: bool) -> ReplayAccessPoint {
    ReplayAccessPoint {
        ssid: ssid.to_string(),
        bssid: bssid.to_string(),
        channel: 6,
        rssi,
        security: if ssid.starts_with("Free") { 0 } else { 3 },
        hidden,
    }
}

fn recording() -> Vec<ReplayPass> {
    vec![
        ReplayPass::Seen(vec![
            ap("Free_WiFi_Zone", "AA:BB:CC:11:22:33", -70, false),
            ap("HomeNetwork", "00:11:22:33:44:55", -60, false),
        ]),
        ReplayPass::Failed {
            error: "radio busy".to_string(),
        },
        ReplayPass::Seen(vec![
            ap("Free_WiFi_Zone", "aa:bb:cc:11:22:33", -45, true),
            ap("sensor", "24:0a:c4:00:00:01", -80, false),
        ]),
    ]
}

#[test]
fn capture_ingest_and_classify() {
    let dir = tempfile::tempdir().unwrap();
    let vault = RecordFile::new(dir.path().join("agent").join("scout_vault.csv"));
    let mut counter = CounterStore::new(FileMedium::new(dir.path().join("agent").join("counter.json")));
    let merger = ScanMerger::new(3, Duration::ZERO);

    let mut source = ReplayScanSource::new(recording());
    let outcome = agent::capture(&merger, &mut source, &mut counter, &vault).unwrap();
    assert_eq!(outcome.locality_id, 1);
    assert_eq!(outcome.written, 3);
    assert_eq!(outcome.passes_failed, 1);

    // A second run past the end of the recording still gets its own id.
    let empty = agent::capture(&merger, &mut source, &mut counter, &vault).unwrap();
    assert_eq!(empty.locality_id, 2);
    assert_eq!(empty.written, 0);

    let mut storage = Storage::open(dir.path().join("hq").join("scout.db")).unwrap();
    let report = ingest_file(&mut storage, &vault).unwrap();
    assert_eq!(report.accepted, 3);
    assert_eq!(report.malformed, 0);
    assert_eq!(report.rejected, 0);
    assert_eq!(storage.localities().unwrap(), vec![1]);

    let rules_path = dir.path().join("ui_content.json");
    let vendors_path = dir.path().join("vendors.json");
    std::fs::write(&rules_path, RULES).unwrap();
    std::fs::write(&vendors_path, r#"{"240AC4": "Espressif Inc."}"#).unwrap();
    let reference = Reference::load(&vendors_path, &rules_path);

    let rows = storage.by_locality(1, None).unwrap();
    let tags: Vec<(String, String)> = rows
        .iter()
        .map(|r| (r.ssid.clone(), reference.annotate(r).tags))
        .collect();
    assert!(tags.contains(&("Free_WiFi_Zone".to_string(), "Honeypot? | Stealth AP".to_string())));
    assert!(tags.contains(&("HomeNetwork".to_string(), "Stationary AP".to_string())));
    assert!(tags.contains(&("sensor".to_string(), "IoT Device".to_string())));

    let free = rows.iter().find(|r| r.ssid == "Free_WiFi_Zone").unwrap();
    assert_eq!(free.mac, "aa:bb:cc:11:22:33");
    assert_eq!(free.rssi, -45);
    assert_eq!(reference.annotate(free).security_label, "Open");

    let archived = archive_source(vault.path(), &dir.path().join("archive")).unwrap();
    assert!(archived.exists());
    assert!(!vault.path().exists());
}

#[test]
fn cleanup_restarts_ids_without_touching_store() {
    let dir = tempfile::tempdir().unwrap();
    let vault = RecordFile::new(dir.path().join("vault.csv"));
    let mut counter = CounterStore::new(FileMedium::new(dir.path().join("counter.json")));
    let merger = ScanMerger::new(1, Duration::ZERO);

    let mut source = ReplayScanSource::new(recording());
    agent::capture(&merger, &mut source, &mut counter, &vault).unwrap();

    let mut storage = Storage::open_in_memory().unwrap();
    ingest_file(&mut storage, &vault).unwrap();
    let before = storage.count().unwrap();

    agent::cleanup(&mut counter, &vault).unwrap();
    assert_eq!(storage.count().unwrap(), before);

    let mut source = ReplayScanSource::new(recording());
    let next = agent::capture(&merger, &mut source, &mut counter, &vault).unwrap();
    assert_eq!(next.locality_id, 1);
}

#[test]
fn report_separates_visits_that_share_a_locality_id() {
    let dir = tempfile::tempdir().unwrap();
    let vault = RecordFile::new(dir.path().join("vault.csv"));
    let mut counter = CounterStore::new(FileMedium::new(dir.path().join("counter.json")));
    let merger = ScanMerger::new(1, Duration::ZERO);
    let mut storage = Storage::open_in_memory().unwrap();

    let mut first = ReplayScanSource::new(vec![ReplayPass::Seen(vec![ap(
        "VisitOne",
        "00:11:22:33:44:01",
        -50,
        false,
    )])]);
    agent::capture(&merger, &mut first, &mut counter, &vault).unwrap();
    ingest_file(&mut storage, &vault).unwrap();
    archive_source(vault.path(), &dir.path().join("archive")).unwrap();

    agent::cleanup(&mut counter, &vault).unwrap();
    std::thread::sleep(Duration::from_millis(5));

    let mut second = ReplayScanSource::new(vec![ReplayPass::Seen(vec![ap(
        "VisitTwo",
        "00:11:22:33:44:02",
        -60,
        false,
    )])]);
    let outcome = agent::capture(&merger, &mut second, &mut counter, &vault).unwrap();
    assert_eq!(outcome.locality_id, 1);
    ingest_file(&mut storage, &vault).unwrap();

    let times = storage.ingest_times(1).unwrap();
    assert_eq!(times.len(), 2);

    let latest = storage.locality_view(1, IngestionScope::Latest).unwrap();
    assert_eq!(latest.ingested_at, Some(times[0]));
    let names: Vec<&str> = latest.rows.iter().map(|r| r.ssid.as_str()).collect();
    assert_eq!(names, vec!["VisitTwo"]);

    let earlier = storage.locality_view(1, IngestionScope::At(times[1])).unwrap();
    let names: Vec<&str> = earlier.rows.iter().map(|r| r.ssid.as_str()).collect();
    assert_eq!(names, vec!["VisitOne"]);

    assert_eq!(storage.locality_view(1, IngestionScope::All).unwrap().rows.len(), 2);
}

#[test]
fn all_malformed_vault_stays_in_inbox() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("bad.csv");
    std::fs::write(&source, "junk\n").unwrap();

    let mut storage = Storage::open_in_memory().unwrap();
    let report = ingest_file(&mut storage, &RecordFile::new(&source)).unwrap();
    let archived = archive_ingested(&report, &source, &dir.path().join("archive")).unwrap();

    assert!(archived.is_none());
    assert!(source.exists());
    assert_eq!(storage.count().unwrap(), 0);
}

#[test]
fn corrupt_reference_files_fall_back_to_default_label() {
    let dir = tempfile::tempdir().unwrap();
    let vault = RecordFile::new(dir.path().join("vault.csv"));
    let mut counter = CounterStore::new(FileMedium::new(dir.path().join("counter.json")));
    let mut source = ReplayScanSource::new(recording());
    agent::capture(&ScanMerger::new(3, Duration::ZERO), &mut source, &mut counter, &vault)
        .unwrap();

    let mut storage = Storage::open_in_memory().unwrap();
    ingest_file(&mut storage, &vault).unwrap();

    let rules_path = dir.path().join("rules.json");
    std::fs::write(&rules_path, "{ truncated").unwrap();
    let rules = RuleSet::load(&rules_path);
    let vendors = VendorTable::load(&dir.path().join("missing.json"));

    for row in storage.by_locality(1, None).unwrap() {
        assert_eq!(classify(&row, &rules, &vendors), "Stationary AP");
    }
}
