//! End-to-end runs of the `mbv` binary against a local store

use crate::common::fixtures::{seed_local, CliEnv};
use crate::mbv;
use anyhow::Result;
use chrono::{Duration, Local};
use cli_lib::locks::WorkdirLock;
use vault_core::naming::format_timestamp;

fn hours_ago(hours: i64) -> String {
    format_timestamp(Local::now().naive_local() - Duration::hours(hours))
}

#[test]
fn config_example_prints_every_section() -> Result<()> {
    let env = CliEnv::new();
    let result = mbv!(&env.config_path, "config", "example").assert_success()?;

    for section in ["[storage]", "[tool]", "[paths]", "[hooks]", "[prune]"] {
        assert!(result.contains_stdout(section), "missing {section}");
    }
    assert!(result.contains_stdout("mariabackup"));
    Ok(())
}

#[test]
fn config_path_follows_environment() -> Result<()> {
    let env = CliEnv::new();
    let result = mbv!(&env.config_path, "config", "path").assert_success()?;
    assert!(result.contains_stdout(&env.config_path.display().to_string()));

    let fresh = env.temp.path().join("fresh/config.toml");
    mbv!(&fresh, "config", "path", "--create").assert_success()?;
    assert!(fresh.exists());
    Ok(())
}

#[test]
fn config_list_shows_effective_values() -> Result<()> {
    let env = CliEnv::new();
    let result = mbv!(&env.config_path, "config", "list")
        .env("S3_REGION", "ap-south-1")
        .assert_success()?;

    assert!(result.contains_stdout("local"));
    assert!(result.contains_stdout("ap-south-1"));
    assert!(result.contains_stdout("7:days,4:weeks,12:months,5:years"));
    Ok(())
}

#[test]
fn list_shows_stored_backups() -> Result<()> {
    let env = CliEnv::new();
    seed_local(
        &env.store_root,
        &[
            "db/2024-03-01 00:00:00-full",
            "db/2024-03-02 00:00:00",
            "db/2024-03-03 00:00:00-full",
        ],
    );

    let all = mbv!(&env.config_path, "list").assert_success()?;
    assert!(all.contains_stdout("db/2024-03-01 00:00:00-full"));
    assert!(all.contains_stdout("db/2024-03-02 00:00:00"));
    assert!(all.contains_stdout("2 full, 1 incremental"));

    let fulls = mbv!(&env.config_path, "list", "--fullOnly").assert_success()?;
    assert!(!fulls.contains_stdout("2024-03-02"));
    assert!(fulls.contains_stdout("2 full, 0 incremental"));

    let after = mbv!(&env.config_path, "list", "-a", "2024-03-01 00:00:00").assert_success()?;
    assert!(after.contains_stdout("1 full, 1 incremental"));

    let other = mbv!(&env.config_path, "list", "--path", "elsewhere").assert_success()?;
    assert!(other.contains_stdout("No backups found"));
    Ok(())
}

#[test]
fn malformed_date_time_is_a_usage_error() -> Result<()> {
    let env = CliEnv::new();
    let result = mbv!(&env.config_path, "list", "--after", "2024-03-01").assert_failure()?;
    assert_eq!(result.exit_code, 2);
    assert!(result.contains_stderr("YYYY-MM-DD HH:mm:ss"));

    let result = mbv!(&env.config_path, "restore", "yesterday").assert_failure()?;
    assert_eq!(result.exit_code, 2);
    Ok(())
}

#[test]
fn prune_dry_run_then_prune() -> Result<()> {
    let env = CliEnv::new();
    let recent = format!("db/{}-full", hours_ago(1));
    seed_local(
        &env.store_root,
        &["db/2020-01-01 00:00:00-full", "db/2020-01-02 00:00:00", &recent],
    );
    let before = env.stored();

    let dry = mbv!(&env.config_path, "prune", "-r", "7:days", "--dry-run").assert_success()?;
    assert!(dry.contains_stdout("Would delete"));
    assert!(dry.contains_stdout("db/2020-01-01 00:00:00-full"));
    assert_eq!(env.stored(), before);

    let real = mbv!(&env.config_path, "prune", "--retention", "7:days").assert_success()?;
    assert!(real.contains_stdout("Deleted"));
    assert_eq!(env.stored(), vec![recent.trim_start_matches("db/").to_string()]);
    Ok(())
}

#[test]
fn unusable_retention_is_rejected() -> Result<()> {
    let env = CliEnv::new();
    seed_local(&env.store_root, &["db/2020-01-01 00:00:00-full"]);

    let result = mbv!(&env.config_path, "prune", "-r", "0:days,0:weeks").assert_failure()?;
    assert!(result.contains_stderr("retention"));
    assert_eq!(env.stored().len(), 1);
    Ok(())
}

#[test]
fn restore_without_full_backup_fails() -> Result<()> {
    let env = CliEnv::new();
    seed_local(&env.store_root, &["db/2024-03-02 00:00:00"]);

    let result = mbv!(&env.config_path, "restore", "2024-03-05 00:00:00").assert_failure()?;
    assert!(result.contains_stderr("no full backup"), "{}", result.stderr);
    assert!(!env.data_dir.join("restore").exists());
    Ok(())
}

#[test]
fn create_is_refused_while_lock_is_held() -> Result<()> {
    let env = CliEnv::new();
    let _lock = WorkdirLock::acquire(&env.data_dir)?;

    let result = mbv!(&env.config_path, "create").assert_failure()?;
    assert!(result.contains_stderr("Backup in progress"), "{}", result.stderr);
    assert!(env.stored().is_empty());
    Ok(())
}

#[cfg(unix)]
#[test]
fn create_and_restore_end_to_end() -> Result<()> {
    let env = CliEnv::new();
    env.install_fake_mariabackup();
    let success_log = env.temp.path().join("success.log");
    env.install_hook(
        "backup-success",
        &format!("echo \"$1\" >> '{}'", success_log.display()),
    );

    let first = mbv!(&env.config_path, "create").assert_success()?;
    assert!(first.contains_stdout("Full backup stored"), "{}", first.stdout);
    assert!(env.data_dir.join("backup/xtrabackup_info").exists());

    // names have second resolution
    std::thread::sleep(std::time::Duration::from_millis(1100));
    let second = mbv!(&env.config_path, "create").assert_success()?;
    assert!(second.contains_stdout("Incremental backup stored"), "{}", second.stdout);

    std::thread::sleep(std::time::Duration::from_millis(1100));
    let third = mbv!(&env.config_path, "create", "--full").assert_success()?;
    assert!(third.contains_stdout("Full backup stored"));

    let stored = env.stored();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored.iter().filter(|n| n.ends_with("-full")).count(), 2);

    let hooks = std::fs::read_to_string(&success_log)?;
    assert_eq!(hooks.lines().count(), 3);
    assert!(hooks.lines().all(|l| l == "db"));

    let target = format_timestamp(Local::now().naive_local() + Duration::minutes(1));
    let restored = mbv!(&env.config_path, "restore", &target).assert_success()?;
    assert!(restored.contains_stdout("Restore Complete"));
    let info = std::fs::read_to_string(env.data_dir.join("restore/xtrabackup_info"))?;
    assert!(info.contains("--prepare"));

    let again = mbv!(&env.config_path, "restore", &target).assert_failure()?;
    assert!(again.contains_stderr("already exists"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn failed_backup_runs_failure_hook() -> Result<()> {
    let env = CliEnv::new();
    let failed_log = env.temp.path().join("failed.log");
    env.install_hook(
        "backup-failed",
        &format!("printf '%s|%s' \"$1\" \"$2\" > '{}'", failed_log.display()),
    );

    // the configured tool binary does not exist
    let result = mbv!(&env.config_path, "create").assert_failure()?;
    assert!(result.contains_stderr("Failed to start"), "{}", result.stderr);

    let logged = std::fs::read_to_string(&failed_log)?;
    assert!(logged.starts_with("db|"), "{logged}");
    assert!(logged.contains("Failed to start"));
    assert!(env.stored().is_empty());
    Ok(())
}
