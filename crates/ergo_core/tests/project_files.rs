use ergo_core::{
    Collaborators, Edit, EditorSession, PersistenceAdapter, SessionConfig, SqliteSnapshotStore,
    StoreBackend,
};
use std::path::Path;

fn open_project(root: &Path, config: &SessionConfig) -> EditorSession {
    let collaborators = Collaborators::for_project(root, config).unwrap();
    let mut session = EditorSession::new(root, collaborators, config);
    session.open();
    session
}

fn populate(session: &mut EditorSession) {
    let outcome = session.apply_batch(vec![
        Edit::SetTitle {
            value: "Sleep and Memory".to_string(),
        },
        Edit::AddAffiliation,
        Edit::SetAffiliationName {
            index: 0,
            name: "Dept. of Psychology".to_string(),
        },
        Edit::AddAuthor,
        Edit::SetAuthorName {
            index: 0,
            name: "Ada Lovelace".to_string(),
        },
        Edit::SetAuthorAffiliation {
            author_index: 0,
            affiliation_id: 1,
            present: true,
        },
        Edit::SetKeywords {
            value: "sleep, memory".to_string(),
        },
        Edit::SetImplicitIntroduction { enabled: true },
        Edit::AddSection,
        Edit::SetSectionTitle {
            index: 1,
            title: "Method".to_string(),
        },
        Edit::AddSubsection { parent_index: 1 },
        Edit::SetSectionTitle {
            index: 2,
            title: "Participants".to_string(),
        },
        Edit::SetTextBlock {
            section_index: 2,
            block_index: 0,
            content: "Forty adults took part.".to_string(),
        },
    ]);
    assert_eq!(outcome.skipped, 0);
}

#[test]
fn json_project_generates_typst_and_reloads_form_data() {
    let project = tempfile::tempdir().unwrap();
    let config = SessionConfig::default();

    let mut session = open_project(project.path(), &config);
    populate(&mut session);
    assert_eq!(session.settle(), 1);
    session.close();
    assert!(session.take_notifications().is_empty());

    let main = std::fs::read_to_string(project.path().join("main.typ")).unwrap();
    assert!(main.contains("#let doc-title = [Sleep and Memory]"));
    assert!(main.contains("      affiliations: (\"AF-1\"),"));
    assert!(main.contains("  keywords: (\"sleep\", \"memory\"),"));

    let sections = session.document().sections().sections();
    let intro_id = &sections[0].id;
    let method_id = &sections[1].id;
    let intro = std::fs::read_to_string(
        project.path().join("sections").join(format!("{intro_id}.typ")),
    )
    .unwrap();
    assert!(intro.contains("= Sleep and Memory"));
    let method = std::fs::read_to_string(
        project.path().join("sections").join(format!("{method_id}.typ")),
    )
    .unwrap();
    assert!(method.contains("= Method"));
    assert!(method.contains("== Participants\n\nForty adults took part."));

    let raw = std::fs::read_to_string(project.path().join("form_data.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["abstract"], "");
    assert_eq!(json["implicit_intro"], true);
    assert_eq!(json["authors"][0]["affiliationIds"][0], 1);
    assert_eq!(json["sections"][0]["isImplicit"], true);
    assert_eq!(json["sections"][2]["blocks"][0]["type"], "text");

    let reopened = open_project(project.path(), &config);
    assert_eq!(reopened.document(), session.document());
}

#[test]
fn legacy_form_data_is_loaded_and_migrated_on_first_block_edit() {
    let project = tempfile::tempdir().unwrap();
    std::fs::write(
        project.path().join("form_data.json"),
        r#"{
            "title": "Old Project",
            "sections": [{"id": "s1", "title": "Intro", "level": 1, "content": "Legacy text"}]
        }"#,
    )
    .unwrap();
    let config = SessionConfig::default();

    let mut session = open_project(project.path(), &config);
    assert!(session.document().sections().sections()[0].body.is_legacy());
    assert_eq!(session.settle(), 1);

    session.apply(Edit::AddTextBlock { section_index: 0 }).unwrap();
    session.close();

    let raw = std::fs::read_to_string(project.path().join("form_data.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let section = &json["sections"][0];
    assert!(section.get("content").is_none());
    assert_eq!(section["blocks"][0]["content"], "Legacy text");
    assert_eq!(section["blocks"].as_array().unwrap().len(), 2);
}

#[test]
fn sqlite_project_keeps_revision_history() {
    let project = tempfile::tempdir().unwrap();
    let config = SessionConfig {
        store: StoreBackend::Sqlite,
        ..SessionConfig::default()
    };

    let mut session = open_project(project.path(), &config);
    populate(&mut session);
    session.settle();
    session
        .apply(Edit::SetCourse {
            value: "PSY 101".to_string(),
        })
        .unwrap();
    session.close();
    drop(session);

    let db_path = config.snapshot_db_path(project.path());
    let mut store = SqliteSnapshotStore::open(&db_path).unwrap();
    let revisions = store.list_revisions().unwrap();
    assert!(revisions.len() >= 2);
    assert_eq!(revisions[0].title, "Sleep and Memory");
    assert_eq!(store.load().unwrap().unwrap().course, "PSY 101");
    assert!(!project.path().join("form_data.json").exists());
}

#[test]
fn opening_a_scaffolded_project_leaves_its_files_untouched() {
    let project = tempfile::tempdir().unwrap();
    let scaffold = "// scaffolded template main.typ\nHello template\n";
    std::fs::write(project.path().join("main.typ"), scaffold).unwrap();
    let config = SessionConfig::default();

    let mut session = open_project(project.path(), &config);
    assert_eq!(session.settle(), 0);
    session.close();

    assert!(!session.is_touched());
    assert!(session.take_notifications().is_empty());
    assert_eq!(
        std::fs::read_to_string(project.path().join("main.typ")).unwrap(),
        scaffold
    );
    assert!(!project.path().join("form_data.json").exists());
    assert!(!project.path().join("sections").exists());
}

#[test]
fn traversal_section_id_in_form_data_never_escapes_sections_dir() {
    let parent = tempfile::tempdir().unwrap();
    let root = parent.path().join("project");
    std::fs::create_dir(&root).unwrap();
    std::fs::write(
        root.join("form_data.json"),
        r#"{
            "title": "Escape",
            "sections": [{"id": "../../escaped", "title": "Intro", "level": 1, "content": "x"}]
        }"#,
    )
    .unwrap();
    let config = SessionConfig::default();

    let mut session = open_project(&root, &config);
    assert_eq!(session.settle(), 1);
    session.close();

    assert!(!parent.path().join("escaped.typ").exists());
    assert!(!root.join("escaped.typ").exists());
    let section_id = session.document().sections().sections()[0].id.clone();
    assert!(root.join("sections").join(format!("{section_id}.typ")).is_file());
}
