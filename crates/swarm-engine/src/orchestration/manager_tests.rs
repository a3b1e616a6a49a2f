use chrono::Days;
use tempfile::TempDir;

use super::*;
use crate::storage::META_FILE;

fn config(base: &Path) -> SwarmConfig {
    SwarmConfig {
        agents_dir: Some(base.to_path_buf()),
        stop_grace_ms: 50,
        ..SwarmConfig::default()
    }
}

/// A time yesterday, well inside the retention window.
fn at(minute: u32) -> DateTime<Utc> {
    let yesterday = Utc::now().date_naive() - Days::new(1);
    yesterday.and_hms_opt(12, minute, 0).unwrap().and_utc()
}

struct Stored<'a> {
    id: &'a str,
    status: AgentStatus,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Stored<'_> {
    fn meta(&self) -> AgentMeta {
        AgentMeta {
            agent_id: self.id.to_string(),
            task_name: "default".to_string(),
            agent_type: AgentType::Gemini,
            prompt: "p".to_string(),
            cwd: None,
            mode: AgentMode::Plan,
            pid: None,
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            parent_session_id: None,
        }
    }
}

fn write_meta(base: &Path, meta: &AgentMeta) {
    let dir = base.join(&meta.agent_id);
    std::fs::create_dir_all(&dir).unwrap();
    meta.write(&dir).unwrap();
}

fn finished(id: &str, completed_at: Option<DateTime<Utc>>) -> AgentMeta {
    Stored {
        id,
        status: AgentStatus::Completed,
        started_at: at(0),
        completed_at,
    }
    .meta()
}

fn ids(agents: &[&AgentProcess]) -> Vec<String> {
    agents.iter().map(|a| a.agent_id().to_string()).collect()
}

#[test]
fn scan_prunes_expired_and_reconciles_stale_running() {
    let base = TempDir::new().unwrap();
    let long_ago = Utc::now() - TimeDelta::days(30);
    write_meta(base.path(), &finished("expired1", Some(long_ago)));
    write_meta(base.path(), &finished("recent01", Some(Utc::now())));
    write_meta(
        base.path(),
        &Stored {
            id: "stale001",
            status: AgentStatus::Running,
            started_at: at(5),
            completed_at: None,
        }
        .meta(),
    );
    std::fs::create_dir_all(base.path().join("no-meta")).unwrap();

    let mut manager = AgentManager::new(&config(base.path()));
    manager.initialize().unwrap();

    assert!(!base.path().join("expired1").exists());
    assert!(!manager.agents.contains_key("expired1"));
    assert!(manager.agents.contains_key("recent01"));

    let stale = &manager.agents["stale001"];
    assert_eq!(stale.status(), AgentStatus::Completed);
    assert_eq!(stale.completed_at(), Some(at(5)));
    let on_disk = AgentMeta::read(&base.path().join("stale001")).unwrap();
    assert_eq!(on_disk.status, AgentStatus::Completed);
}

#[test]
fn scan_skips_other_workspaces_without_deleting() {
    let base = TempDir::new().unwrap();
    let mine = AgentMeta {
        cwd: Some(PathBuf::from("/work/mine")),
        ..finished("mine0001", Some(Utc::now()))
    };
    let theirs = AgentMeta {
        cwd: Some(PathBuf::from("/work/theirs")),
        ..finished("theirs01", Some(Utc::now()))
    };
    write_meta(base.path(), &mine);
    write_meta(base.path(), &theirs);

    let mut manager = AgentManager::new(&SwarmConfig {
        filter_by_cwd: Some(PathBuf::from("/work/mine")),
        ..config(base.path())
    });
    manager.initialize().unwrap();

    assert!(manager.agents.contains_key("mine0001"));
    assert!(!manager.agents.contains_key("theirs01"));
    assert!(base.path().join("theirs01").join(META_FILE).is_file());
}

#[test]
fn initialize_scans_once_and_get_adopts_later_agents() {
    let base = TempDir::new().unwrap();
    let mut manager = AgentManager::new(&config(base.path()));
    manager.initialize().unwrap();
    assert!(manager.initialized);

    write_meta(base.path(), &finished("late0001", Some(Utc::now())));
    manager.initialize().unwrap();
    assert!(manager.list_all().unwrap().is_empty());

    let adopted = manager.get("late0001").unwrap().unwrap();
    assert_eq!(adopted.status(), AgentStatus::Completed);
    assert_eq!(manager.list_all().unwrap().len(), 1);
}

#[test]
fn get_rejects_unknown_and_path_like_ids() {
    let base = TempDir::new().unwrap();
    let mut manager = AgentManager::new(&config(base.path()));
    assert!(manager.get("missing1").unwrap().is_none());
    assert!(manager.get("../etc").unwrap().is_none());
    assert!(manager.get("").unwrap().is_none());
}

#[test]
fn retention_evicts_exactly_the_oldest() {
    let base = TempDir::new().unwrap();
    write_meta(base.path(), &finished("first001", Some(at(1))));
    write_meta(base.path(), &finished("second01", Some(at(2))));
    write_meta(base.path(), &finished("third001", Some(at(3))));

    let mut manager = AgentManager::new(&SwarmConfig {
        max_retained: 2,
        ..config(base.path())
    });
    manager.initialize().unwrap();
    assert_eq!(manager.agents.len(), 3);

    manager.cleanup_old_agents();
    assert_eq!(manager.agents.len(), 2);
    assert!(!manager.agents.contains_key("first001"));
    assert!(!base.path().join("first001").exists());
    assert!(base.path().join("second01").exists());
}

#[test]
fn retention_treats_missing_completion_as_oldest() {
    let base = TempDir::new().unwrap();
    let mut manager = AgentManager::new(&SwarmConfig {
        max_retained: 1,
        ..config(base.path())
    });
    manager.initialize().unwrap();
    for meta in [finished("dated001", Some(at(1))), finished("undated1", None)] {
        write_meta(base.path(), &meta);
        manager
            .agents
            .insert(meta.agent_id.clone(), AgentProcess::new(meta, base.path()));
    }

    manager.cleanup_old_agents();
    assert!(manager.agents.contains_key("dated001"));
    assert!(!manager.agents.contains_key("undated1"));
}

#[test]
fn running_agents_are_never_evicted() {
    let base = TempDir::new().unwrap();
    let mut manager = AgentManager::new(&SwarmConfig {
        max_retained: 0,
        ..config(base.path())
    });
    manager.initialize().unwrap();
    let running = Stored {
        id: "running1",
        status: AgentStatus::Running,
        started_at: at(0),
        completed_at: None,
    }
    .meta();
    manager
        .agents
        .insert("running1".to_string(), AgentProcess::new(running, base.path()));

    manager.cleanup_old_agents();
    assert!(manager.agents.contains_key("running1"));
}

#[test]
fn list_filters_and_order() {
    let base = TempDir::new().unwrap();
    write_meta(
        base.path(),
        &AgentMeta {
            task_name: "auth".to_string(),
            parent_session_id: Some("sess-a".to_string()),
            started_at: at(3),
            ..finished("bbbbbbbb", Some(at(4)))
        },
    );
    write_meta(
        base.path(),
        &AgentMeta {
            task_name: "auth".to_string(),
            status: AgentStatus::Failed,
            started_at: at(1),
            ..finished("aaaaaaaa", Some(at(2)))
        },
    );
    write_meta(
        base.path(),
        &AgentMeta {
            status: AgentStatus::Stopped,
            parent_session_id: Some("sess-a".to_string()),
            started_at: at(0),
            ..finished("cccccccc", Some(at(9)))
        },
    );

    let mut manager = AgentManager::new(&config(base.path()));
    assert_eq!(
        ids(&manager.list_all().unwrap()),
        ["cccccccc", "aaaaaaaa", "bbbbbbbb"]
    );
    assert_eq!(manager.list_completed().unwrap().len(), 3);
    assert!(manager.list_running().unwrap().is_empty());
    assert_eq!(
        ids(&manager.list_by_task("auth").unwrap()),
        ["aaaaaaaa", "bbbbbbbb"]
    );
    assert_eq!(
        ids(&manager.list_by_parent_session("sess-a").unwrap()),
        ["cccccccc", "bbbbbbbb"]
    );
}

#[tokio::test]
async fn stop_ignores_unknown_and_finished_agents() {
    let base = TempDir::new().unwrap();
    write_meta(base.path(), &finished("done0001", Some(at(1))));
    let before = std::fs::read(base.path().join("done0001").join(META_FILE)).unwrap();

    let mut manager = AgentManager::new(&config(base.path()));
    assert!(!manager.stop("nobody01").await.unwrap());
    assert!(!manager.stop("done0001").await.unwrap());

    let after = std::fs::read(base.path().join("done0001").join(META_FILE)).unwrap();
    assert_eq!(before, after);
    assert_eq!(manager.agents["done0001"].status(), AgentStatus::Completed);
}

#[tokio::test]
async fn stop_marks_pidless_running_agent_stopped() {
    let base = TempDir::new().unwrap();
    let mut manager = AgentManager::new(&config(base.path()));
    manager.initialize().unwrap();
    let meta = Stored {
        id: "nopid001",
        status: AgentStatus::Running,
        started_at: at(0),
        completed_at: None,
    }
    .meta();
    write_meta(base.path(), &meta);
    manager
        .agents
        .insert("nopid001".to_string(), AgentProcess::new(meta, base.path()));

    assert!(manager.stop("nopid001").await.unwrap());
    let agent = &manager.agents["nopid001"];
    assert_eq!(agent.status(), AgentStatus::Stopped);
    assert!(agent.completed_at().is_some());
    let on_disk = AgentMeta::read(&base.path().join("nopid001")).unwrap();
    assert_eq!(on_disk.status, AgentStatus::Stopped);
}

#[tokio::test]
async fn stop_adopts_agent_written_by_another_manager() {
    let base = TempDir::new().unwrap();
    let mut manager = AgentManager::new(&config(base.path()));
    manager.initialize().unwrap();
    let meta = Stored {
        id: "foreign1",
        status: AgentStatus::Running,
        started_at: at(0),
        completed_at: None,
    }
    .meta();
    write_meta(base.path(), &meta);
    assert!(!manager.agents.contains_key("foreign1"));

    assert!(manager.stop("foreign1").await.unwrap());
    assert_eq!(manager.agents["foreign1"].status(), AgentStatus::Stopped);
    let on_disk = AgentMeta::read(&base.path().join("foreign1")).unwrap();
    assert_eq!(on_disk.status, AgentStatus::Stopped);
    assert!(!manager.stop("../foreign1").await.unwrap());
}

#[test]
fn cwd_resolution() {
    let dir = TempDir::new().unwrap();
    assert_eq!(resolve_cwd(dir.path()).unwrap(), dir.path());

    let missing = dir.path().join("missing");
    assert!(matches!(
        resolve_cwd(&missing),
        Err(AgentError::WorkingDirMissing(p)) if p == missing
    ));

    let file = dir.path().join("file.txt");
    std::fs::write(&file, "x").unwrap();
    assert!(matches!(
        resolve_cwd(&file),
        Err(AgentError::WorkingDirNotDirectory(_))
    ));
}

#[test]
fn plain_ids() {
    assert!(is_plain_id("a1b2c3d4"));
    assert!(!is_plain_id("a/b"));
    assert!(!is_plain_id(".."));
    assert!(!is_plain_id("/abs"));
    assert!(!is_plain_id(""));
}

#[test]
fn generated_ids_are_short_and_unique() {
    let base = TempDir::new().unwrap();
    let manager = AgentManager::new(&config(base.path()));
    let a = manager.generate_agent_id(base.path());
    let b = manager.generate_agent_id(base.path());
    assert_eq!(a.len(), AGENT_ID_LEN);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(a, b);
}
